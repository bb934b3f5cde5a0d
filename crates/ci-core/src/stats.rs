//! Sample-moment helpers and the pluggable statistic functors the bootstrap
//! engines evaluate on each resample.

use serde::{Deserialize, Serialize};

use crate::decimal::{to_f64, Decimal};

/// Arithmetic mean. Zero for an empty slice.
pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation (n − 1 denominator). Zero when n < 2.
pub fn sample_std_dev(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 0.0;
    }
    let mu = mean(xs);
    let var = xs.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    var.sqrt()
}

/// Standardized third moment given a precomputed mean and standard deviation.
/// Zero when the scale is degenerate.
pub fn skewness(xs: &[f64], mu: f64, sd: f64) -> f64 {
    if xs.is_empty() || sd <= 0.0 {
        return 0.0;
    }
    let n = xs.len() as f64;
    xs.iter().map(|x| ((x - mu) / sd).powi(3)).sum::<f64>() / n
}

/// Sample skewness and excess kurtosis in one pass over the data.
pub fn skew_and_excess_kurtosis(xs: &[f64]) -> (f64, f64) {
    let n = xs.len();
    if n < 3 {
        return (0.0, 0.0);
    }
    let mu = mean(xs);
    let nf = n as f64;
    let m2 = xs.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / nf;
    if m2 <= 0.0 {
        return (0.0, 0.0);
    }
    let m3 = xs.iter().map(|x| (x - mu).powi(3)).sum::<f64>() / nf;
    let m4 = xs.iter().map(|x| (x - mu).powi(4)).sum::<f64>() / nf;
    let skew = m3 / m2.powf(1.5);
    let exkurt = m4 / (m2 * m2) - 3.0;
    (skew, exkurt)
}

/// Median of an ascending-sorted slice.
pub fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Type-7 (linear-interpolation) quantile of an ascending-sorted slice.
pub fn quantile_type7_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }
    let p = p.clamp(0.0, 1.0);
    let h = (n - 1) as f64 * p;
    let k = h.floor() as usize;
    let frac = h - k as f64;
    if frac == 0.0 || k + 1 == n {
        return sorted[k];
    }
    sorted[k] + frac * (sorted[k + 1] - sorted[k])
}

/// A pure scalar statistic over a sample.
///
/// Implementations must be deterministic and side-effect free: the engines
/// evaluate them on tens of thousands of resamples and on jackknife subsets,
/// and the tournament assumes the same input always maps to the same value.
///
/// The result is an `f64` so that degenerate resamples can signal NaN or
/// infinity; engines skip those replicates and report them in their skip
/// counters. Values are quantized into `Decimal` only at the result boundary.
pub trait Statistic<T>: Send + Sync {
    fn compute(&self, xs: &[T]) -> f64;
}

impl<T, F> Statistic<T> for F
where
    F: Fn(&[T]) -> f64 + Send + Sync,
{
    fn compute(&self, xs: &[T]) -> f64 {
        self(xs)
    }
}

/// A closed trade, the atomic unit for trade-level bootstrapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Per-trade return in decimal form (0.01 = 1%).
    pub return_pct: Decimal,
    /// Holding period in bars.
    pub bars_held: u32,
}

/// Arithmetic mean of per-period returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanStat;

impl Statistic<Decimal> for MeanStat {
    fn compute(&self, xs: &[Decimal]) -> f64 {
        if xs.is_empty() {
            return 0.0;
        }
        let sum: f64 = xs.iter().map(|d| to_f64(*d)).sum();
        sum / xs.len() as f64
    }
}

/// Geometric mean of per-period returns, computed on the log1p scale.
///
/// Returns r ≤ −1 are clamped just above ruin so log1p stays defined. With
/// `winsor_fraction` set, the log1p values are symmetrically winsorised at
/// that tail fraction before averaging, damping single-outlier leverage in
/// small samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoMeanStat {
    pub winsor_fraction: Option<f64>,
}

impl GeoMeanStat {
    pub fn winsorized(fraction: f64) -> Self {
        Self {
            winsor_fraction: Some(fraction),
        }
    }

    fn geo_mean_of_logs(&self, mut logs: Vec<f64>) -> f64 {
        if logs.is_empty() {
            return 0.0;
        }
        if let Some(f) = self.winsor_fraction {
            let n = logs.len();
            let k = ((f.clamp(0.0, 0.5)) * n as f64).floor() as usize;
            if k > 0 && 2 * k < n {
                let mut sorted = logs.clone();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let lo = sorted[k];
                let hi = sorted[n - 1 - k];
                for v in logs.iter_mut() {
                    *v = v.clamp(lo, hi);
                }
            }
        }
        let mean_log = logs.iter().sum::<f64>() / logs.len() as f64;
        mean_log.exp_m1()
    }
}

const RUIN_EPS: f64 = 1e-12;

impl Statistic<Decimal> for GeoMeanStat {
    fn compute(&self, xs: &[Decimal]) -> f64 {
        let logs: Vec<f64> = xs
            .iter()
            .map(|d| to_f64(*d).max(-1.0 + RUIN_EPS).ln_1p())
            .collect();
        self.geo_mean_of_logs(logs)
    }
}

impl Statistic<Trade> for GeoMeanStat {
    fn compute(&self, xs: &[Trade]) -> f64 {
        let logs: Vec<f64> = xs
            .iter()
            .map(|t| to_f64(t.return_pct).max(-1.0 + RUIN_EPS).ln_1p())
            .collect();
        self.geo_mean_of_logs(logs)
    }
}

/// Profit factor: gross profit over gross loss.
///
/// A sample with no losing periods caps at the domain constant 100 so the
/// penalty arithmetic downstream stays total.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfitFactorStat;

impl ProfitFactorStat {
    /// Cap applied when the sample has no losing periods; keeps downstream
    /// penalty arithmetic total.
    pub const NO_LOSS_CAP: f64 = 100.0;

    fn from_returns(returns: impl Iterator<Item = f64>) -> f64 {
        let mut gross_profit = 0.0;
        let mut gross_loss = 0.0;
        for r in returns {
            if r > 0.0 {
                gross_profit += r;
            } else if r < 0.0 {
                gross_loss += -r;
            }
        }
        if gross_loss > 0.0 {
            (gross_profit / gross_loss).min(Self::NO_LOSS_CAP)
        } else if gross_profit > 0.0 {
            Self::NO_LOSS_CAP
        } else {
            0.0
        }
    }
}

impl Statistic<Decimal> for ProfitFactorStat {
    fn compute(&self, xs: &[Decimal]) -> f64 {
        Self::from_returns(xs.iter().map(|d| to_f64(*d)))
    }
}

impl Statistic<Trade> for ProfitFactorStat {
    fn compute(&self, xs: &[Trade]) -> f64 {
        Self::from_returns(xs.iter().map(|t| to_f64(t.return_pct)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::dec;

    #[test]
    fn type7_quantile_interpolates() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile_type7_sorted(&xs, 0.5) - 2.5).abs() < 1e-12);
        assert_eq!(quantile_type7_sorted(&xs, 0.0), 1.0);
        assert_eq!(quantile_type7_sorted(&xs, 1.0), 4.0);
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0, 4.0]), 2.5);
    }

    #[test]
    fn skewness_of_symmetric_sample_is_zero() {
        let xs = [-2.0, -1.0, 0.0, 1.0, 2.0];
        let mu = mean(&xs);
        let sd = sample_std_dev(&xs);
        assert!(skewness(&xs, mu, sd).abs() < 1e-12);
    }

    #[test]
    fn geo_mean_matches_compounding() {
        let xs: Vec<Decimal> = [0.10, 0.10].iter().map(|&r| dec(r)).collect();
        let g = GeoMeanStat::default().compute(&xs);
        assert!((g - 0.10).abs() < 1e-10);
    }

    #[test]
    fn geo_mean_clamps_ruin() {
        let xs: Vec<Decimal> = [-1.0, 0.5].iter().map(|&r| dec(r)).collect();
        let g = GeoMeanStat::default().compute(&xs);
        assert!(g.is_finite());
        assert!(g > -1.0);
    }

    #[test]
    fn profit_factor_caps_without_losses() {
        let xs: Vec<Decimal> = [0.01, 0.02].iter().map(|&r| dec(r)).collect();
        assert_eq!(ProfitFactorStat.compute(&xs), ProfitFactorStat::NO_LOSS_CAP);

        let mixed: Vec<Decimal> = [0.02, -0.01].iter().map(|&r| dec(r)).collect();
        assert!((ProfitFactorStat.compute(&mixed) - 2.0).abs() < 1e-9);
    }
}
