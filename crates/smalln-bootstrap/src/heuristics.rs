//! Cheap, deterministic dependence proxies for small samples.
//!
//! Below n ≈ 40 the sample autocorrelation function is too noisy to trust,
//! so resampler selection falls back to sign-based proxies: the positive
//! ratio (trend or imbalance) and the longest same-sign run (clustering).

use ci_core::{to_f64, Decimal};

/// Length of the longest contiguous same-sign run. Zero returns break a run
/// for continuity purposes but still count toward streak length.
pub fn longest_sign_run(x: &[Decimal]) -> usize {
    let n = x.len();
    if n == 0 {
        return 0;
    }

    let sgn = |v: f64| -> i8 {
        if v > 0.0 {
            1
        } else if v < 0.0 {
            -1
        } else {
            0
        }
    };

    let mut last = sgn(to_f64(x[0]));
    let mut cur = 1usize;
    let mut best = 1usize;
    for r in &x[1..] {
        let s = sgn(to_f64(*r));
        if s == last && s != 0 {
            cur += 1;
        } else {
            best = best.max(cur);
            cur = 1;
            last = s;
        }
    }
    best.max(cur)
}

/// Fraction of strictly positive returns.
pub fn sign_positive_ratio(x: &[Decimal]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let num_pos = x.iter().filter(|r| to_f64(**r) > 0.0).count();
    num_pos as f64 / x.len() as f64
}

/// Two-sided confidence level to z-score lookup, used for backing an
/// approximate sigma out of a CI width in diagnostics. Falls back to 1.96.
pub fn z_from_two_sided_cl(cl: f64) -> f64 {
    if (0.989..=0.991).contains(&cl) {
        2.576
    } else if (0.974..=0.976).contains(&cl) {
        2.241
    } else if (0.949..=0.951).contains(&cl) {
        1.960
    } else if (0.899..=0.901).contains(&cl) {
        1.645
    } else {
        1.960
    }
}

/// Heavy-tail detection: |skew| ≥ 0.90 or excess kurtosis ≥ 1.20.
pub fn has_heavy_tails_wide(skew: f64, exkurt: f64) -> bool {
    skew.abs() >= 0.90 || exkurt >= 1.20
}

/// Whether the conservative small-N path should run at all: always at
/// n ≤ 40, and up to n ≤ 60 when the data is heavy-tailed.
pub fn should_run_small_n(n: usize, heavy_tails: bool) -> bool {
    n <= 40 || (n <= 60 && heavy_tails)
}

/// Block-vs-IID selection for small samples: block resampling when the sign
/// ratio is imbalanced (outside [0.35, 0.65]) or the sample is streaky (the
/// run threshold grows as max(6, ⌈0.18·min(n, 40)⌉)).
pub fn choose_block_small_n(ratio_pos: f64, n: usize, longest_run: usize) -> bool {
    const HI_THRESH: f64 = 0.65;
    const LO_THRESH: f64 = 0.35;
    const N_THRESH: usize = 40;

    let sign_imbalance = ratio_pos > HI_THRESH || ratio_pos < LO_THRESH;

    let base = 6usize;
    let scaled = (0.18 * n.min(N_THRESH) as f64).ceil() as usize;
    let run_thresh = base.max(scaled);

    let streaky_small_n = n <= N_THRESH && longest_run >= run_thresh;
    sign_imbalance || streaky_small_n
}

/// Tiny block length for individual small-N runs: clamp into [2, 3].
pub fn clamp_small_l(l: usize) -> usize {
    l.clamp(2, 3)
}
