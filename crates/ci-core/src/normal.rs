//! Standard-normal utilities used by the bootstrap engines and penalty
//! calculators.
//!
//! The CDF is delegated to statrs (erf-backed, ~1e-15 accuracy). The inverse
//! CDF is Peter Acklam's rational approximation with relative error below
//! 1.15e-9 over (0, 1); its boundary behavior (±∞ outside the open interval,
//! exactly 0 at the median) is part of the contract the BCa engine relies on.

use statrs::distribution::{ContinuousCDF, Normal};

/// Φ(z) for the standard normal distribution.
pub fn standard_normal_cdf(z: f64) -> f64 {
    let normal = Normal::new(0.0, 1.0).unwrap();
    normal.cdf(z)
}

/// Φ⁻¹(p) via Acklam's rational approximation.
///
/// Returns `-∞` for `p <= 0`, `+∞` for `p >= 1`, and exactly `0.0` at
/// `p = 0.5`.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if p == 0.5 {
        return 0.0;
    }

    // Central-region coefficients
    const A1: f64 = -3.969683028665376e+01;
    const A2: f64 = 2.209460984245205e+02;
    const A3: f64 = -2.759285104469687e+02;
    const A4: f64 = 1.383577518672690e+02;
    const A5: f64 = -3.066479806614716e+01;
    const A6: f64 = 2.506628277459239e+00;

    const B1: f64 = -5.447609879822406e+01;
    const B2: f64 = 1.615858368580409e+02;
    const B3: f64 = -1.556989798598866e+02;
    const B4: f64 = 6.680131188771972e+01;
    const B5: f64 = -1.328068155288572e+01;

    // Tail-region coefficients
    const C1: f64 = -7.784894002430226e-03;
    const C2: f64 = -3.223964580411365e-01;
    const C3: f64 = -2.400758277161838e+00;
    const C4: f64 = -2.549732539343734e+00;
    const C5: f64 = 4.374664141464968e+00;
    const C6: f64 = 2.938163982698783e+00;

    const D1: f64 = 7.784695709041462e-03;
    const D2: f64 = 3.224671290700398e-01;
    const D3: f64 = 2.445134137142996e+00;
    const D4: f64 = 3.754408661907416e+00;

    const P_LOW: f64 = 0.02425;
    const P_HIGH: f64 = 1.0 - P_LOW;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C1 * q + C2) * q + C3) * q + C4) * q + C5) * q + C6)
            / ((((D1 * q + D2) * q + D3) * q + D4) * q + 1.0)
    } else if p <= P_HIGH {
        let q = p - 0.5;
        let r = q * q;
        (((((A1 * r + A2) * r + A3) * r + A4) * r + A5) * r + A6) * q
            / (((((B1 * r + B2) * r + B3) * r + B4) * r + B5) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C1 * q + C2) * q + C3) * q + C4) * q + C5) * q + C6)
            / ((((D1 * q + D2) * q + D3) * q + D4) * q + 1.0)
    }
}

/// Critical z-value for a two-sided confidence level: `Φ⁻¹(1 − (1−CL)/2)`.
///
/// Returns `+∞` when the confidence level is outside (0, 1).
pub fn critical_value(confidence_level: f64) -> f64 {
    if confidence_level <= 0.0 || confidence_level >= 1.0 {
        return f64::INFINITY;
    }
    let alpha = 1.0 - confidence_level;
    inverse_normal_cdf(1.0 - alpha / 2.0)
}

/// Empirical CDF: the fraction of samples ≤ `x`. Zero for an empty sample.
pub fn empirical_cdf(xs: &[f64], x: f64) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let count = xs.iter().filter(|&&v| v <= x).count();
    count as f64 / xs.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_matches_reference_values() {
        assert!((inverse_normal_cdf(0.975) - 1.9599639845).abs() < 1e-9);
        assert!((inverse_normal_cdf(0.025) + 1.9599639845).abs() < 1e-9);
        assert_eq!(inverse_normal_cdf(0.5), 0.0);
    }

    #[test]
    fn quantile_boundaries() {
        assert_eq!(inverse_normal_cdf(0.0), f64::NEG_INFINITY);
        assert_eq!(inverse_normal_cdf(-0.1), f64::NEG_INFINITY);
        assert_eq!(inverse_normal_cdf(1.0), f64::INFINITY);
    }

    #[test]
    fn cdf_and_quantile_are_inverses() {
        for &p in &[0.001, 0.01, 0.1, 0.25, 0.5, 0.75, 0.9, 0.99, 0.999] {
            let z = inverse_normal_cdf(p);
            assert!((standard_normal_cdf(z) - p).abs() < 1e-8, "p={}", p);
        }
    }

    #[test]
    fn critical_values() {
        assert!((critical_value(0.95) - 1.96).abs() < 1e-2);
        assert!((critical_value(0.99) - 2.576).abs() < 1e-3);
        assert_eq!(critical_value(1.0), f64::INFINITY);
        assert_eq!(critical_value(0.0), f64::INFINITY);
    }

    #[test]
    fn empirical_cdf_counts_inclusive() {
        let xs = [1.5, 2.3, 1.8, 3.1, 2.0];
        assert!((empirical_cdf(&xs, 2.0) - 0.6).abs() < 1e-12);
        assert_eq!(empirical_cdf(&[], 1.0), 0.0);
    }
}
