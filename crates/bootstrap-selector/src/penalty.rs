//! Penalty calculators.
//!
//! All penalties are non-negative and *total*: non-finite inputs map to +∞
//! rather than failing, so the scoring pipeline never branches on errors.

use tracing::debug;

use bootstrap_engines::PercentileTResult;
use ci_core::{median_sorted, normal::inverse_normal_cdf, quantile_type7_sorted, StatisticSupport};

use crate::candidate::MethodId;
use crate::config;

/// Quadratic skewness-fidelity penalty; zero while |skew| ≤ 1.
pub fn compute_skew_penalty(skew: f64) -> f64 {
    let excess = (skew.abs() - config::SKEW_PENALTY_THRESHOLD).max(0.0);
    excess * excess
}

/// Fixed penalty when the interval's lower bound crosses the statistic's
/// support floor.
pub fn compute_domain_penalty(lower: f64, support: &StatisticSupport) -> f64 {
    if support.violates_lower_bound(lower) {
        config::DOMAIN_VIOLATION_PENALTY
    } else {
        0.0
    }
}

/// BCa stability penalty from the bias-correction and acceleration
/// parameters plus bootstrap skewness.
///
/// High skewness makes the bias correction less reliable, so it both scales
/// the z0/accel penalties up (×1.5 beyond |skew| > 2) and tightens the
/// acceleration threshold (0.08 beyond |skew| > 3). Any non-finite input is
/// a catastrophic failure and yields +∞.
pub fn compute_bca_stability_penalty(
    z0: f64,
    accel: f64,
    skew_boot: f64,
    z0_scale: f64,
    accel_scale: f64,
) -> f64 {
    if !z0.is_finite() || !accel.is_finite() || !skew_boot.is_finite() {
        debug!(z0, accel, skew_boot, "BCa non-finite stability parameters");
        return f64::INFINITY;
    }

    let mut penalty = 0.0;

    let skew_multiplier = if skew_boot.abs() > config::BCA_SKEW_THRESHOLD {
        config::BCA_HIGH_SKEW_MULTIPLIER
    } else {
        1.0
    };

    // 1. Bias (z0).
    let z0_abs = z0.abs();
    if z0_abs > config::BCA_Z0_SOFT_THRESHOLD {
        let diff = z0_abs - config::BCA_Z0_SOFT_THRESHOLD;
        let z0_penalty = diff * diff * z0_scale * skew_multiplier;
        penalty += z0_penalty;
        if z0_penalty > 0.01 {
            debug!(z0_abs, z0_penalty, "BCa z0 penalty");
        }
    }

    // 2. Acceleration.
    let accel_threshold = if skew_boot.abs() > config::BCA_STRICT_ACCEL_SKEW_TRIGGER {
        config::BCA_ACCEL_STRICT_THRESHOLD
    } else {
        config::BCA_ACCEL_SOFT_THRESHOLD
    };
    let accel_abs = accel.abs();
    if accel_abs > accel_threshold {
        let diff = accel_abs - accel_threshold;
        let accel_penalty = diff * diff * accel_scale * skew_multiplier;
        penalty += accel_penalty;
        if accel_penalty > 0.01 {
            debug!(accel_abs, accel_threshold, accel_penalty, "BCa acceleration penalty");
        }
    }

    // 3. Skewness.
    let skew_abs = skew_boot.abs();
    if skew_abs > config::BCA_SKEW_THRESHOLD {
        let excess = skew_abs - config::BCA_SKEW_THRESHOLD;
        penalty += excess * excess * config::BCA_SKEW_PENALTY_SCALE;
    }

    penalty
}

/// Percentile-t stability penalty from resample quality: outer failure rate,
/// inner SE failure rate, and effective-B deficit, each penalized
/// quadratically past its threshold. Non-finite or zero counters yield +∞.
pub fn compute_percentile_t_stability(res: &PercentileTResult) -> f64 {
    let b_outer = res.b_outer as f64;
    let b_inner = res.b_inner as f64;
    let skipped_outer = res.skipped_outer as f64;
    let skipped_inner = res.skipped_inner_total as f64;
    let effective_b = res.effective_b as f64;
    let inner_attempted = res.inner_attempted_total as f64;

    if b_outer < 1.0 || b_inner < 1.0 || inner_attempted <= 0.0 {
        return f64::INFINITY;
    }

    let mut penalty = 0.0;

    // 1. Outer resample failure rate.
    let outer_failure_rate = (skipped_outer / b_outer).clamp(0.0, 1.0);
    if outer_failure_rate > config::PERCENTILE_T_OUTER_FAIL_THRESHOLD {
        let excess = outer_failure_rate - config::PERCENTILE_T_OUTER_FAIL_THRESHOLD;
        penalty += excess * excess * config::PERCENTILE_T_OUTER_PENALTY_SCALE;
    }

    // 2. Inner SE failure rate.
    let inner_failure_rate = (skipped_inner / inner_attempted).clamp(0.0, 1.0);
    if inner_failure_rate > config::PERCENTILE_T_INNER_FAIL_THRESHOLD {
        let excess = inner_failure_rate - config::PERCENTILE_T_INNER_FAIL_THRESHOLD;
        penalty += excess * excess * config::PERCENTILE_T_INNER_PENALTY_SCALE;
    }

    // 3. Effective sample size.
    let min_effective = config::PERCENTILE_T_MIN_EFFECTIVE_FRACTION * b_outer;
    if effective_b < min_effective {
        let deficit_fraction = (min_effective - effective_b) / b_outer;
        penalty +=
            deficit_fraction * deficit_fraction * config::PERCENTILE_T_EFFECTIVE_B_PENALTY_SCALE;
    }

    penalty
}

/// Outcome of a length-penalty computation.
#[derive(Debug, Clone, Copy)]
pub struct LengthPenalty {
    pub penalty: f64,
    /// Actual width over ideal width.
    pub normalized_length: f64,
    /// Median of the distribution the ideal width was derived from.
    pub median: f64,
}

impl LengthPenalty {
    fn neutral() -> Self {
        Self {
            penalty: 0.0,
            normalized_length: 1.0,
            median: 0.0,
        }
    }
}

fn quadratic_outside_band(normalized: f64, l_max: f64) -> f64 {
    if normalized < config::LENGTH_MIN {
        let deficit = config::LENGTH_MIN - normalized;
        deficit * deficit
    } else if normalized > l_max {
        let excess = normalized - l_max;
        excess * excess
    } else {
        0.0
    }
}

/// Length penalty for percentile-family methods (Percentile, Basic, BCa,
/// MOutOfN): the ideal width is the type-7 quantile span of the bootstrap
/// distribution at the nominal level.
pub fn compute_length_penalty_percentile(
    actual_length: f64,
    boot_stats: &[f64],
    confidence_level: f64,
    method: MethodId,
) -> LengthPenalty {
    if actual_length <= 0.0 || boot_stats.len() < 2 {
        return LengthPenalty::neutral();
    }

    let mut sorted = boot_stats.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let median = median_sorted(&sorted);

    let alpha = 1.0 - confidence_level;
    let q_lo = quantile_type7_sorted(&sorted, 0.5 * alpha);
    let q_hi = quantile_type7_sorted(&sorted, 1.0 - 0.5 * alpha);
    let ideal = q_hi - q_lo;
    if ideal <= 0.0 {
        return LengthPenalty {
            penalty: 0.0,
            normalized_length: 1.0,
            median,
        };
    }

    let normalized = actual_length / ideal;
    let l_max = if method == MethodId::MOutOfN {
        config::LENGTH_MAX_M_OUT_OF_N
    } else {
        config::LENGTH_MAX_STANDARD
    };

    LengthPenalty {
        penalty: quadratic_outside_band(normalized, l_max),
        normalized_length: normalized,
        median,
    }
}

/// Length penalty for the Normal approximation: ideal width is the
/// theoretical `2·z_{α/2}·SE`.
pub fn compute_length_penalty_normal(
    actual_length: f64,
    se_boot: f64,
    confidence_level: f64,
) -> LengthPenalty {
    if actual_length <= 0.0 || se_boot <= 0.0 {
        return LengthPenalty::neutral();
    }

    let alpha = 1.0 - confidence_level;
    let z = inverse_normal_cdf(1.0 - 0.5 * alpha);
    let ideal = 2.0 * z * se_boot;
    if ideal <= 0.0 {
        return LengthPenalty::neutral();
    }

    LengthPenalty {
        penalty: quadratic_outside_band(actual_length / ideal, config::LENGTH_MAX_STANDARD),
        normalized_length: actual_length / ideal,
        median: 0.0,
    }
}

/// Length penalty for Percentile-t: ideal width is `(t_hi − t_lo)·SE_hat` on
/// the studentized pivots.
pub fn compute_length_penalty_percentile_t(
    actual_length: f64,
    t_stats: &[f64],
    se_hat: f64,
    confidence_level: f64,
) -> LengthPenalty {
    if actual_length <= 0.0 || t_stats.len() < 2 || se_hat <= 0.0 {
        return LengthPenalty::neutral();
    }

    let mut sorted = t_stats.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = median_sorted(&sorted);

    let alpha = 1.0 - confidence_level;
    let t_lo = quantile_type7_sorted(&sorted, 0.5 * alpha);
    let t_hi = quantile_type7_sorted(&sorted, 1.0 - 0.5 * alpha);
    let ideal = (t_hi - t_lo) * se_hat;
    if ideal <= 0.0 {
        return LengthPenalty {
            penalty: 0.0,
            normalized_length: 1.0,
            median,
        };
    }

    LengthPenalty {
        penalty: quadratic_outside_band(actual_length / ideal, config::LENGTH_MAX_STANDARD),
        normalized_length: actual_length / ideal,
        median,
    }
}

/// Extra BCa cost once its length penalty exceeds the overflow threshold.
pub fn compute_bca_length_overflow(length_penalty: f64) -> f64 {
    if length_penalty.is_finite() && length_penalty > config::BCA_LENGTH_PENALTY_THRESHOLD {
        let overflow = length_penalty - config::BCA_LENGTH_PENALTY_THRESHOLD;
        config::BCA_LENGTH_OVERFLOW_SCALE * overflow * overflow
    } else {
        0.0
    }
}

/// Inclusive empirical mass of `xs` inside `[lo, hi]`, over finite entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmpiricalMass {
    pub mass_inclusive: f64,
    pub effective_sample_count: usize,
}

pub fn compute_empirical_mass_inclusive(xs: &[f64], lo: f64, hi: f64) -> EmpiricalMass {
    let mut n = 0usize;
    let mut inside = 0usize;
    for &v in xs {
        if !v.is_finite() {
            continue;
        }
        n += 1;
        if v >= lo && v <= hi {
            inside += 1;
        }
    }
    EmpiricalMass {
        mass_inclusive: if n == 0 { 0.0 } else { inside as f64 / n as f64 },
        effective_sample_count: n,
    }
}

/// Under-coverage with a half-step tolerance for the granularity of a finite
/// bootstrap sample.
pub fn under_coverage_with_half_step_tolerance(width_cdf: f64, cl: f64, b_eff: usize) -> f64 {
    let step = if b_eff > 0 { 1.0 / b_eff as f64 } else { 1.0 };
    ((cl - width_cdf) - 0.5 * step).max(0.0)
}

/// Symmetric over-coverage with the same half-step tolerance.
pub fn over_coverage_with_half_step_tolerance(width_cdf: f64, cl: f64, b_eff: usize) -> f64 {
    let step = if b_eff > 0 { 1.0 / b_eff as f64 } else { 1.0 };
    ((width_cdf - cl) - 0.5 * step).max(0.0)
}

/// Standalone under-coverage penalty for a θ-space interval.
pub fn compute_empirical_under_coverage_penalty(
    boot_stats: &[f64],
    lo: f64,
    hi: f64,
    cl: f64,
) -> f64 {
    if boot_stats.len() < 2 || !lo.is_finite() || !hi.is_finite() || hi <= lo {
        return 0.0;
    }
    if !(cl > 0.0 && cl < 1.0) {
        return 0.0;
    }

    let mass = compute_empirical_mass_inclusive(boot_stats, lo, hi);
    if mass.effective_sample_count < 2 {
        return 0.0;
    }
    let width_cdf = mass.mass_inclusive.clamp(0.0, 1.0);
    let under = under_coverage_with_half_step_tolerance(width_cdf, cl, mass.effective_sample_count);
    config::UNDER_COVERAGE_MULTIPLIER * under * under
}

/// Percentile-t variant: coverage is checked in t-space, since that is the
/// space the interval was actually constructed in. The θ-space interval
/// `[lo, hi]` maps to `t ∈ [(θ̂ − hi)/SE, (θ̂ − lo)/SE]`.
pub fn compute_empirical_under_coverage_penalty_percentile_t(
    t_stats: &[f64],
    theta_hat: f64,
    se_hat: f64,
    lo: f64,
    hi: f64,
    cl: f64,
) -> f64 {
    if t_stats.len() < 2 || !theta_hat.is_finite() {
        return 0.0;
    }
    if !se_hat.is_finite() || se_hat <= 0.0 {
        return 0.0;
    }
    if !lo.is_finite() || !hi.is_finite() || hi <= lo {
        return 0.0;
    }
    if !(cl > 0.0 && cl < 1.0) {
        return 0.0;
    }

    let t_lo = (theta_hat - hi) / se_hat;
    let t_hi = (theta_hat - lo) / se_hat;
    if !t_lo.is_finite() || !t_hi.is_finite() || t_lo >= t_hi {
        return 0.0;
    }

    let mass = compute_empirical_mass_inclusive(t_stats, t_lo, t_hi);
    if mass.effective_sample_count < 2 {
        return 0.0;
    }
    let width_cdf = mass.mass_inclusive.clamp(0.0, 1.0);
    let under = under_coverage_with_half_step_tolerance(width_cdf, cl, mass.effective_sample_count);
    config::UNDER_COVERAGE_MULTIPLIER * under * under
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skew_penalty_kicks_in_past_one() {
        assert_eq!(compute_skew_penalty(0.5), 0.0);
        assert_eq!(compute_skew_penalty(-0.9), 0.0);
        assert!((compute_skew_penalty(1.5) - 0.25).abs() < 1e-12);
        assert!((compute_skew_penalty(-3.0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn domain_penalty_is_fixed_constant() {
        let support = ci_core::StatisticSupport::strict_lower_bound(0.0, 1e-9);
        assert_eq!(compute_domain_penalty(-0.1, &support), config::DOMAIN_VIOLATION_PENALTY);
        assert_eq!(compute_domain_penalty(0.5, &support), 0.0);
        assert_eq!(
            compute_domain_penalty(-1.0, &ci_core::StatisticSupport::unbounded()),
            0.0
        );
    }

    #[test]
    fn bca_stability_zero_inside_thresholds() {
        let p = compute_bca_stability_penalty(0.2, 0.05, 0.5, 20.0, 100.0);
        assert_eq!(p, 0.0);
    }

    #[test]
    fn bca_stability_quadratic_past_thresholds() {
        // |z0| = 0.4: (0.4 - 0.25)^2 * 20 = 0.45
        let p = compute_bca_stability_penalty(0.4, 0.0, 0.0, 20.0, 100.0);
        assert!((p - 0.45).abs() < 1e-12);

        // |a| = 0.2: (0.2 - 0.1)^2 * 100 = 1.0
        let p = compute_bca_stability_penalty(0.0, 0.2, 0.0, 20.0, 100.0);
        assert!((p - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bca_stability_tightens_under_high_skew() {
        // |skew| > 2 scales the z0 term by 1.5.
        let base = compute_bca_stability_penalty(0.4, 0.0, 0.0, 20.0, 100.0);
        let high_skew = compute_bca_stability_penalty(0.4, 0.0, 2.5, 20.0, 100.0);
        assert!((high_skew - (base * 1.5 + compute_skew_excess(2.5))).abs() < 1e-9);

        // |skew| > 3 drops the acceleration threshold to 0.08.
        let p = compute_bca_stability_penalty(0.0, 0.09, 3.5, 20.0, 100.0);
        assert!(p > 0.0);
        let p_mild = compute_bca_stability_penalty(0.0, 0.09, 0.0, 20.0, 100.0);
        assert_eq!(p_mild, 0.0);
    }

    fn compute_skew_excess(skew: f64) -> f64 {
        let excess = skew.abs() - config::BCA_SKEW_THRESHOLD;
        excess * excess * config::BCA_SKEW_PENALTY_SCALE
    }

    #[test]
    fn bca_stability_infinite_on_any_non_finite_input() {
        assert!(compute_bca_stability_penalty(f64::NAN, 0.0, 0.0, 20.0, 100.0).is_infinite());
        assert!(compute_bca_stability_penalty(0.0, f64::INFINITY, 0.0, 20.0, 100.0).is_infinite());
        // NaN skewness also disqualifies, not just z0/accel.
        assert!(compute_bca_stability_penalty(0.0, 0.0, f64::NAN, 20.0, 100.0).is_infinite());
    }

    #[test]
    fn length_penalty_band() {
        // Bootstrap stats on a grid: ideal width at CL = 0.95 is the type-7
        // quantile span.
        let stats: Vec<f64> = (0..1001).map(|i| i as f64 / 1000.0).collect();
        let ideal = ci_core::quantile_type7_sorted(&stats, 0.975)
            - ci_core::quantile_type7_sorted(&stats, 0.025);

        let inside = compute_length_penalty_percentile(ideal, &stats, 0.95, MethodId::Percentile);
        assert_eq!(inside.penalty, 0.0);
        assert!((inside.normalized_length - 1.0).abs() < 1e-9);

        let short = compute_length_penalty_percentile(0.5 * ideal, &stats, 0.95, MethodId::Percentile);
        assert!(short.penalty > 0.0);
        assert!((short.penalty - (config::LENGTH_MIN - 0.5) * (config::LENGTH_MIN - 0.5)).abs() < 1e-9);

        // 3x ideal fails the standard ceiling but passes the m-out-of-n one.
        let wide = compute_length_penalty_percentile(3.0 * ideal, &stats, 0.95, MethodId::Percentile);
        assert!(wide.penalty > 0.0);
        let wide_mn = compute_length_penalty_percentile(3.0 * ideal, &stats, 0.95, MethodId::MOutOfN);
        assert_eq!(wide_mn.penalty, 0.0);
    }

    #[test]
    fn normal_length_uses_theoretical_ideal() {
        let se = 0.01;
        let ideal = 2.0 * inverse_normal_cdf(0.975) * se;
        let lp = compute_length_penalty_normal(ideal, se, 0.95);
        assert_eq!(lp.penalty, 0.0);
        assert!((lp.normalized_length - 1.0).abs() < 1e-9);

        let degenerate = compute_length_penalty_normal(0.1, 0.0, 0.95);
        assert_eq!(degenerate.penalty, 0.0);
        assert_eq!(degenerate.normalized_length, 1.0);
    }

    #[test]
    fn bca_length_overflow_past_threshold() {
        assert_eq!(compute_bca_length_overflow(0.5), 0.0);
        assert_eq!(compute_bca_length_overflow(1.0), 0.0);
        assert!((compute_bca_length_overflow(2.0) - 2.0).abs() < 1e-12);
        assert_eq!(compute_bca_length_overflow(f64::INFINITY), 0.0);
    }

    #[test]
    fn coverage_tolerance_is_half_step() {
        // With B = 100 the tolerance is 0.005: a 0.945 mass at CL 0.95 passes.
        assert_eq!(under_coverage_with_half_step_tolerance(0.945, 0.95, 100), 0.0);
        assert!(under_coverage_with_half_step_tolerance(0.90, 0.95, 100) > 0.0);
        assert_eq!(over_coverage_with_half_step_tolerance(0.955, 0.95, 100), 0.0);
        assert!(over_coverage_with_half_step_tolerance(0.99, 0.95, 100) > 0.0);
    }

    #[test]
    fn empirical_mass_skips_non_finite() {
        let xs = [1.0, 2.0, f64::NAN, 3.0, f64::INFINITY];
        let mass = compute_empirical_mass_inclusive(&xs, 1.0, 2.5);
        assert_eq!(mass.effective_sample_count, 3);
        assert!((mass.mass_inclusive - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn theta_space_under_coverage_penalty() {
        let stats: Vec<f64> = (0..1001).map(|i| i as f64 / 1000.0).collect();
        // Full-range interval covers everything.
        assert_eq!(
            compute_empirical_under_coverage_penalty(&stats, 0.0, 1.0, 0.95),
            0.0
        );
        // A half-range interval badly under-covers at CL 0.95.
        let narrow = compute_empirical_under_coverage_penalty(&stats, 0.25, 0.75, 0.95);
        assert!(narrow > 0.0);
        // Degenerate inputs are neutral, never failing.
        assert_eq!(
            compute_empirical_under_coverage_penalty(&stats, 1.0, 0.0, 0.95),
            0.0
        );
        assert_eq!(compute_empirical_under_coverage_penalty(&[], 0.0, 1.0, 0.95), 0.0);
    }

    #[test]
    fn percentile_t_coverage_checks_in_t_space() {
        // Pivots uniform on [-2, 2]; interval that maps onto the middle 95%
        // of t-space incurs no penalty.
        let t_stats: Vec<f64> = (0..401).map(|i| -2.0 + i as f64 / 100.0).collect();
        let theta_hat = 0.0;
        let se = 1.0;
        let pen = compute_empirical_under_coverage_penalty_percentile_t(
            &t_stats, theta_hat, se, -1.95, 1.95, 0.95,
        );
        assert_eq!(pen, 0.0);

        let narrow = compute_empirical_under_coverage_penalty_percentile_t(
            &t_stats, theta_hat, se, -0.5, 0.5, 0.95,
        );
        assert!(narrow > 0.0);
    }
}
