//! Resampling policies and their jackknife counterparts.
//!
//! A resampler is a structural parameter of every engine: it decides how a
//! bootstrap replicate is drawn and which jackknife scheme feeds the BCa
//! acceleration estimate. IID resampling treats observations as exchangeable;
//! the stationary block resampler (Politis & Romano 1994) preserves serial
//! correlation by copying geometric-length blocks with circular wrap, and its
//! jackknife deletes non-overlapping blocks (Künsch 1989) instead of single
//! points.

use rand::rngs::StdRng;
use rand::Rng;

use ci_core::{CoreError, Statistic};

/// Capability set shared by all resampling policies.
pub trait Resampler<T: Clone>: Clone + Send + Sync {
    /// Fill `y` with an `m`-element resample of `x`.
    fn resample_into(&self, x: &[T], y: &mut Vec<T>, m: usize, rng: &mut StdRng);

    /// Policy-specific jackknife pseudo-values of `stat` over `x`.
    fn jackknife(&self, x: &[T], stat: &dyn Statistic<T>) -> Result<Vec<f64>, CoreError>;

    /// Mean block length; 1 for IID.
    fn block_len(&self) -> usize;
}

/// Classic i.i.d. bootstrap: draw `m` elements uniformly with replacement.
#[derive(Debug, Clone, Copy, Default)]
pub struct IidResampler;

impl<T: Clone + Send + Sync> Resampler<T> for IidResampler {
    fn resample_into(&self, x: &[T], y: &mut Vec<T>, m: usize, rng: &mut StdRng) {
        debug_assert!(!x.is_empty(), "IidResampler: empty sample");
        y.clear();
        y.reserve(m);
        for _ in 0..m {
            let idx = rng.gen_range(0..x.len());
            y.push(x[idx].clone());
        }
    }

    /// Delete-one jackknife: n leave-one-out pseudo-values.
    fn jackknife(&self, x: &[T], stat: &dyn Statistic<T>) -> Result<Vec<f64>, CoreError> {
        let n = x.len();
        if n < 2 {
            return Err(CoreError::InvalidArgument(
                "IidResampler::jackknife requires n >= 2".into(),
            ));
        }
        let mut jk = Vec::with_capacity(n);
        let mut tmp: Vec<T> = Vec::with_capacity(n - 1);
        for i in 0..n {
            tmp.clear();
            tmp.extend_from_slice(&x[..i]);
            tmp.extend_from_slice(&x[i + 1..]);
            jk.push(stat.compute(&tmp));
        }
        Ok(jk)
    }

    fn block_len(&self) -> usize {
        1
    }
}

/// Stationary block bootstrap with mean block length `L`.
#[derive(Debug, Clone, Copy)]
pub struct StationaryBlockResampler {
    l: usize,
}

impl StationaryBlockResampler {
    /// `L` is clamped to at least 2; a block length of 1 is just IID.
    pub fn new(l: usize) -> Self {
        Self { l: l.max(2) }
    }

    pub fn mean_block_len(&self) -> usize {
        self.l
    }

    /// Geometric block length with mean `L`: 1 + Geometric(1/L).
    fn draw_block_len(&self, rng: &mut StdRng) -> usize {
        let p = 1.0 / self.l as f64;
        let u: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
        let failures = (u.ln() / (1.0 - p).ln()).floor() as usize;
        1 + failures
    }
}

impl<T: Clone + Send + Sync> Resampler<T> for StationaryBlockResampler {
    fn resample_into(&self, x: &[T], y: &mut Vec<T>, m: usize, rng: &mut StdRng) {
        debug_assert!(!x.is_empty(), "StationaryBlockResampler: empty sample");
        let xn = x.len();
        y.clear();
        y.reserve(m);

        let mut idx = rng.gen_range(0..xn);
        while y.len() < m {
            let len = self.draw_block_len(rng);
            let remaining = m - y.len();
            let k = len.min(remaining).min(xn);

            let room_to_end = xn - idx;
            if k <= room_to_end {
                y.extend_from_slice(&x[idx..idx + k]);
            } else {
                y.extend_from_slice(&x[idx..]);
                y.extend_from_slice(&x[..k - room_to_end]);
            }
            idx = rng.gen_range(0..xn);
        }
    }

    /// Delete-block jackknife (Künsch 1989) stepping by `L_eff`, producing
    /// `⌊n / L_eff⌋` genuinely distinct pseudo-values. Each block deletes a
    /// contiguous slice under circular wrap and evaluates the statistic on
    /// the retained window.
    fn jackknife(&self, x: &[T], stat: &dyn Statistic<T>) -> Result<Vec<f64>, CoreError> {
        const MIN_KEEP: usize = 2;

        let n = x.len();
        if n < MIN_KEEP + 1 {
            return Err(CoreError::InvalidArgument(
                "StationaryBlockResampler::jackknife requires n >= 3".into(),
            ));
        }

        let l_eff = self.l.min(n - MIN_KEEP);
        if n < l_eff + MIN_KEEP {
            return Err(CoreError::InvalidArgument(
                "StationaryBlockResampler::jackknife: sample too small for delete-block \
                 jackknife with this block length"
                    .into(),
            ));
        }

        let keep = n - l_eff;
        let num_blocks = n / l_eff;

        let mut jk = Vec::with_capacity(num_blocks);
        let mut y: Vec<T> = Vec::with_capacity(keep);

        for b in 0..num_blocks {
            let start = b * l_eff;
            let start_keep = (start + l_eff) % n;
            let tail = keep.min(n - start_keep);

            y.clear();
            y.extend_from_slice(&x[start_keep..start_keep + tail]);
            let head = keep - tail;
            if head != 0 {
                y.extend_from_slice(&x[..head]);
            }

            jk.push(stat.compute(&y));
        }

        Ok(jk)
    }

    fn block_len(&self) -> usize {
        self.l
    }
}
