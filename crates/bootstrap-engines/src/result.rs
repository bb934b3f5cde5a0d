//! Engine result records.
//!
//! Every engine reports its interval plus the standard diagnostic set the
//! selection tournament consumes: replicate counts, skip counters, and the
//! finite replicate statistics themselves.

use serde::{Deserialize, Serialize};

use ci_core::{Decimal, IntervalType};

/// Result of a Normal / Basic / Percentile bootstrap run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootResult {
    pub mean: Decimal,
    pub lower: Decimal,
    pub upper: Decimal,
    pub cl: f64,
    pub interval_type: IntervalType,
    pub n: usize,
    pub b: usize,
    /// Replicates that produced a finite statistic.
    pub effective_b: usize,
    pub skipped: usize,
    /// Finite bootstrap statistics, in generation order.
    pub boot_stats: Vec<f64>,
}

/// Result of an m-out-of-n subsampling bootstrap run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MOutOfNResult {
    pub mean: Decimal,
    pub lower: Decimal,
    pub upper: Decimal,
    pub cl: f64,
    pub interval_type: IntervalType,
    pub n: usize,
    /// Subsample size actually drawn per replicate.
    pub m_sub: usize,
    pub b: usize,
    pub effective_b: usize,
    pub skipped: usize,
    /// Resampler mean block length (1 for IID).
    pub l: usize,
    pub boot_stats: Vec<f64>,
}

/// Result of a BCa bootstrap run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BcaResult {
    pub mean: Decimal,
    pub lower: Decimal,
    pub upper: Decimal,
    pub cl: f64,
    pub interval_type: IntervalType,
    pub n: usize,
    pub b: usize,
    pub effective_b: usize,
    pub skipped: usize,
    /// Bias-correction parameter.
    pub z0: f64,
    /// Acceleration parameter.
    pub accel: f64,
    pub boot_stats: Vec<f64>,
}

/// Result of a nested Percentile-t bootstrap run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentileTResult {
    pub mean: Decimal,
    pub lower: Decimal,
    pub upper: Decimal,
    pub cl: f64,
    pub interval_type: IntervalType,
    pub n: usize,
    pub b_outer: usize,
    pub b_inner: usize,
    /// Outer replicates that produced a finite studentized pivot.
    pub effective_b: usize,
    /// Outer replicates discarded (non-finite θ*, SE* ≤ 0, or inner floor).
    pub skipped_outer: usize,
    /// Inner replicates discarded across all outer replicates.
    pub skipped_inner_total: usize,
    /// Inner replicates attempted across all outer replicates.
    pub inner_attempted_total: usize,
    pub m_outer: usize,
    pub m_inner: usize,
    pub l: usize,
    /// SD of θ* over the effective outer replicates; scales the final pivot.
    pub se_hat: f64,
    /// Finite θ* values.
    pub theta_stats: Vec<f64>,
    /// Finite studentized pivots t*.
    pub t_stats: Vec<f64>,
}

/// Efron & Tibshirani's unbiased order-statistic index for probability `p`
/// over `b` replicates: `⌊p·(B+1)⌋ − 1`, clamped to `[0, B−1]`.
pub fn unbiased_index(p: f64, b: usize) -> usize {
    let idx = (p * (b as f64 + 1.0)).floor() as i64 - 1;
    idx.clamp(0, b as i64 - 1) as usize
}

/// Order statistic at the unbiased index for `p`, via O(B) selection.
pub fn select_unbiased_quantile(stats: &[f64], p: f64) -> f64 {
    let mut work = stats.to_vec();
    let idx = unbiased_index(p, work.len());
    let (_, v, _) = work.select_nth_unstable_by(idx, |a, b| {
        a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
    });
    *v
}

/// Type-7 quantile via two selection passes (O(B), no full sort).
pub fn select_type7_quantile(stats: &[f64], p: f64) -> f64 {
    let m = stats.len();
    if m == 0 {
        return f64::NAN;
    }
    if m == 1 {
        return stats[0];
    }
    let p = p.clamp(0.0, 1.0);
    let h = (m - 1) as f64 * p;
    let k = h.floor() as usize;
    let frac = h - k as f64;

    let mut work = stats.to_vec();
    let (_, vk, rest) = work.select_nth_unstable_by(k, |a, b| {
        a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
    });
    let vk = *vk;

    if frac == 0.0 || k + 1 == m {
        return vk;
    }

    let (_, vk1, _) = rest.select_nth_unstable_by(0, |a, b| {
        a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
    });
    vk + frac * (*vk1 - vk)
}
