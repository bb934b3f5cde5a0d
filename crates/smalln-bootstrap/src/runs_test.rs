//! Monte-Carlo runs test for borderline dependence calls.
//!
//! When the sign heuristics are inconclusive, a small simulation answers the
//! sharper question: how long would the longest same-sign run be if the data
//! really were IID Bernoulli(p)? An observed run at or beyond the simulated
//! 95th percentile is evidence of clustering.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fixed default seed keeps the guard deterministic across runs.
pub const RUNS_TEST_SEED: u64 = 0xC0FFEE;

#[derive(Debug, Clone, Copy)]
pub struct RunsTestConfig {
    /// One-sided quantile to compare against.
    pub alpha_quantile: f64,
    /// Simulation count; small on purpose, this is a cheap guard.
    pub num_sims: usize,
}

impl Default for RunsTestConfig {
    fn default() -> Self {
        Self {
            alpha_quantile: 0.95,
            num_sims: 256,
        }
    }
}

/// Longest run in one simulated IID Bernoulli(p) sequence of length n.
fn longest_run_iid_once(n: usize, p: f64, rng: &mut StdRng) -> usize {
    if n == 0 {
        return 0;
    }
    let p = p.clamp(0.0, 1.0);

    let mut prev = rng.gen_bool(p);
    let mut longest = 1usize;
    let mut cur = 1usize;
    for _ in 1..n {
        let x = rng.gen_bool(p);
        if x == prev {
            cur += 1;
        } else {
            longest = longest.max(cur);
            cur = 1;
            prev = x;
        }
    }
    longest.max(cur)
}

/// Monte-Carlo estimate of the `alpha_quantile` of the longest-run
/// distribution under IID Bernoulli(p).
pub fn runs_longest_quantile_mc(n: usize, p: f64, cfg: RunsTestConfig, seed: u64) -> usize {
    if n == 0 {
        return 0;
    }
    let mut rng = StdRng::seed_from_u64(seed);

    let sims = cfg.num_sims.max(1);
    let mut samples = Vec::with_capacity(sims);
    for _ in 0..sims {
        samples.push(longest_run_iid_once(n, p, &mut rng));
    }
    samples.sort_unstable();

    let k = ((cfg.alpha_quantile * sims as f64).ceil() as usize)
        .saturating_sub(1)
        .min(sims - 1);
    samples[k]
}

/// True when the observed longest run reaches the simulated 95th percentile
/// under IID(p = ratio of positives), i.e. the run is suspiciously long.
pub fn borderline_run_exceeds_mc95(
    n: usize,
    ratio_pos: f64,
    observed_longest_run: usize,
    cfg: RunsTestConfig,
    seed: u64,
) -> bool {
    let q95 = runs_longest_quantile_mc(n, ratio_pos, cfg, seed);
    observed_longest_run >= q95
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_is_deterministic_for_fixed_seed() {
        let cfg = RunsTestConfig::default();
        let a = runs_longest_quantile_mc(30, 0.5, cfg, RUNS_TEST_SEED);
        let b = runs_longest_quantile_mc(30, 0.5, cfg, RUNS_TEST_SEED);
        assert_eq!(a, b);
        assert!(a >= 3, "longest run quantile for n=30 is at least a few: {}", a);
    }

    #[test]
    fn extreme_runs_flagged() {
        // A run the length of the whole sample is far beyond the IID 95th
        // percentile for a balanced coin.
        assert!(borderline_run_exceeds_mc95(
            30,
            0.5,
            30,
            RunsTestConfig::default(),
            RUNS_TEST_SEED
        ));
    }

    #[test]
    fn short_runs_pass() {
        assert!(!borderline_run_exceeds_mc95(
            30,
            0.5,
            2,
            RunsTestConfig::default(),
            RUNS_TEST_SEED
        ));
    }

    #[test]
    fn empty_sequence() {
        assert_eq!(
            runs_longest_quantile_mc(0, 0.5, RunsTestConfig::default(), RUNS_TEST_SEED),
            0
        );
    }
}
