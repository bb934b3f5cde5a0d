//! Central tuning table for penalties, gates, and scoring normalization.
//!
//! Everything the scorer or gatekeeper compares against lives here so the
//! selection behavior can be audited (and tuned) in one place.

/// Under-coverage is penalized harder than over-coverage.
pub const UNDER_COVERAGE_MULTIPLIER: f64 = 10.0;
pub const OVER_COVERAGE_MULTIPLIER: f64 = 1.0;

/// Length bounds, normalized to the ideal bootstrap interval width.
pub const LENGTH_MIN: f64 = 0.8;
pub const LENGTH_MAX_STANDARD: f64 = 1.8;
/// m-out-of-n subsampling widens intervals by construction; allow it more.
pub const LENGTH_MAX_M_OUT_OF_N: f64 = 6.0;

/// Domain enforcement for strictly-positive statistics.
pub const POSITIVE_LOWER_EPSILON: f64 = 1e-9;
pub const DOMAIN_VIOLATION_PENALTY: f64 = 1000.0;

/// BCa hard rejection limits (Efron 1987; acceleration relaxed to 0.25).
pub const BCA_Z0_HARD_LIMIT: f64 = 0.6;
pub const BCA_ACCEL_HARD_LIMIT: f64 = 0.25;

/// BCa soft thresholds where stability penalties start to accrue.
pub const BCA_Z0_SOFT_THRESHOLD: f64 = 0.25;
pub const BCA_ACCEL_SOFT_THRESHOLD: f64 = 0.10;
/// Tightened acceleration threshold under extreme bootstrap skewness.
pub const BCA_ACCEL_STRICT_THRESHOLD: f64 = 0.08;

/// Default BCa penalty scales (overridable via ScoringWeights).
pub const BCA_Z0_PENALTY_SCALE: f64 = 20.0;
pub const BCA_ACCEL_PENALTY_SCALE: f64 = 100.0;

/// Skewness fidelity penalty for BCa stability.
pub const BCA_SKEW_THRESHOLD: f64 = 2.0;
pub const BCA_SKEW_PENALTY_SCALE: f64 = 5.0;
/// Multiplier applied to the z0/accel penalties when |skew| exceeds the
/// threshold above.
pub const BCA_HIGH_SKEW_MULTIPLIER: f64 = 1.5;
/// |skew| beyond which the strict acceleration threshold applies.
pub const BCA_STRICT_ACCEL_SKEW_TRIGGER: f64 = 3.0;

/// BCa length overflow: extra quadratic cost once the length penalty itself
/// exceeds this threshold.
pub const BCA_LENGTH_PENALTY_THRESHOLD: f64 = 1.0;
pub const BCA_LENGTH_OVERFLOW_SCALE: f64 = 2.0;

/// General skew penalty threshold (applies to every method).
pub const SKEW_PENALTY_THRESHOLD: f64 = 1.0;

/// Percentile-t stability thresholds and scales.
pub const PERCENTILE_T_OUTER_FAIL_THRESHOLD: f64 = 0.10;
pub const PERCENTILE_T_INNER_FAIL_THRESHOLD: f64 = 0.05;
pub const PERCENTILE_T_MIN_EFFECTIVE_FRACTION: f64 = 0.70;
pub const PERCENTILE_T_OUTER_PENALTY_SCALE: f64 = 100.0;
pub const PERCENTILE_T_INNER_PENALTY_SCALE: f64 = 200.0;
pub const PERCENTILE_T_EFFECTIVE_B_PENALTY_SCALE: f64 = 50.0;

/// Effective-B hard gate: `max(MIN_EFFECTIVE_ABSOLUTE, ceil(frac * B_outer))`.
pub const MIN_EFFECTIVE_ABSOLUTE: usize = 200;
pub const DEFAULT_MIN_EFFECTIVE_FRACTION: f64 = 0.90;

/// Floating-point tie tolerance scale for the tournament. The constant is
/// tunable; the relative form `eps * (1 + max(|a|,|b|))` is the contract.
pub const RELATIVE_TIE_EPSILON_SCALE: f64 = 1e-10;

/// Normalization references dividing each raw penalty to O(1): a value of
/// 1.0 after division reads as "a noticeable but tolerable defect".
pub const REF_ORDERING_ERROR_SQ: f64 = 2.5e-3;
pub const REF_LENGTH_ERROR_SQ: f64 = 4.0e-2;
pub const REF_STABILITY: f64 = 1.0;
pub const REF_CENTER_SHIFT_SQ: f64 = 0.25;
pub const REF_SKEW_SQ: f64 = 1.0;
