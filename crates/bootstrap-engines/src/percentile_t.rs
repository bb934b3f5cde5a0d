//! Nested (studentized) percentile-t bootstrap.
//!
//! Outer loop: resample the original series and compute θ*. Inner loop, per
//! outer replicate: bootstrap the *outer* sample to estimate SE*, then form
//! the studentized pivot t = (θ* − θ̂) / SE*. The interval inverts the pivot
//! distribution: [θ̂ − t_hi·SE_hat, θ̂ − t_lo·SE_hat] with SE_hat = SD(θ*).
//!
//! Studentization pays off for skewed and ratio statistics, at the cost of
//! B_outer × B_inner statistic evaluations. The inner loop keeps a Welford
//! accumulator and stops early once SE* stabilizes, which removes most of
//! that cost in practice. The outer loop is embarrassingly parallel; inner
//! loops are strictly sequential.

use std::marker::PhantomData;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use ci_core::{dec, CoreError, IntervalType, Statistic};

use crate::executor::Executor;
use crate::resample::Resampler;
use crate::result::{select_type7_quantile, PercentileTResult};
use crate::rng::splitmix64;

/// Robustness floor: an outer replicate needs at least this many finite
/// inner statistics before its SE* is trusted.
const MIN_INNER: usize = 100;
/// Stabilization check cadence for the inner loop.
const CHECK_EVERY: usize = 16;
/// Relative SE* tolerance at which the inner loop stops early.
const REL_EPS: f64 = 0.015;
/// Minimum usable studentized pivots for a valid interval.
const MIN_EFFECTIVE_B: usize = 16;

pub struct PercentileTBootstrap<T, R> {
    b_outer: usize,
    b_inner: usize,
    cl: f64,
    interval_type: IntervalType,
    resampler: R,
    m_ratio_outer: f64,
    m_ratio_inner: f64,
    _sample: PhantomData<fn(T)>,
}

struct OuterOutcome {
    /// θ* for this replicate; NaN when the resample statistic was non-finite.
    theta: f64,
    /// Studentized pivot; NaN when the replicate was discarded.
    t: f64,
    inner_attempted: usize,
    inner_skipped: usize,
}

impl<T, R> PercentileTBootstrap<T, R>
where
    T: Clone + Send + Sync,
    R: Resampler<T>,
{
    pub fn new(
        b_outer: usize,
        b_inner: usize,
        cl: f64,
        interval_type: IntervalType,
        resampler: R,
    ) -> Result<Self, CoreError> {
        Self::with_ratios(b_outer, b_inner, cl, interval_type, resampler, 1.0, 1.0)
    }

    /// Full constructor with outer/inner subsample ratios in (0, 1].
    pub fn with_ratios(
        b_outer: usize,
        b_inner: usize,
        cl: f64,
        interval_type: IntervalType,
        resampler: R,
        m_ratio_outer: f64,
        m_ratio_inner: f64,
    ) -> Result<Self, CoreError> {
        if b_outer < 400 {
            return Err(CoreError::InvalidArgument(
                "percentile-t B_outer must be at least 400".into(),
            ));
        }
        if b_inner < 100 {
            return Err(CoreError::InvalidArgument(
                "percentile-t B_inner must be at least 100".into(),
            ));
        }
        if !(cl > 0.5 && cl < 1.0) {
            return Err(CoreError::InvalidArgument(
                "confidence level must be in (0.5, 1)".into(),
            ));
        }
        if !(m_ratio_outer > 0.0 && m_ratio_outer <= 1.0) {
            return Err(CoreError::InvalidArgument(
                "percentile-t outer ratio must be in (0, 1]".into(),
            ));
        }
        if !(m_ratio_inner > 0.0 && m_ratio_inner <= 1.0) {
            return Err(CoreError::InvalidArgument(
                "percentile-t inner ratio must be in (0, 1]".into(),
            ));
        }
        Ok(Self {
            b_outer,
            b_inner,
            cl,
            interval_type,
            resampler,
            m_ratio_outer,
            m_ratio_inner,
            _sample: PhantomData,
        })
    }

    pub fn run<S, E>(
        &self,
        x: &[T],
        stat: &S,
        rng: &mut StdRng,
        exec: &E,
    ) -> Result<PercentileTResult, CoreError>
    where
        S: Statistic<T>,
        E: Executor,
    {
        self.run_with_sizes(x, stat, rng, exec, 0, 0)
    }

    /// As [`run`](Self::run), with explicit subsample sizes (0 = derive from
    /// the configured ratios).
    pub fn run_with_sizes<S, E>(
        &self,
        x: &[T],
        stat: &S,
        rng: &mut StdRng,
        exec: &E,
        m_outer_override: usize,
        m_inner_override: usize,
    ) -> Result<PercentileTResult, CoreError>
    where
        S: Statistic<T>,
        E: Executor,
    {
        let n = x.len();
        if n < 3 {
            return Err(CoreError::InvalidArgument(
                "percentile-t bootstrap requires at least 3 data points".into(),
            ));
        }

        let m_outer = {
            let requested = if m_outer_override > 0 {
                m_outer_override
            } else {
                (self.m_ratio_outer * n as f64).floor() as usize
            };
            requested.clamp(2, n)
        };

        let m_inner = {
            let requested = if m_inner_override > 0 {
                m_inner_override
            } else {
                (self.m_ratio_inner * m_outer as f64).floor() as usize
            };
            requested.clamp(2, m_outer)
        };

        let th = stat.compute(x);

        // Per-outer engines seeded deterministically from the caller's rng.
        let base: u64 = rng.gen();
        let seeds: Vec<u64> = (0..self.b_outer)
            .map(|b| splitmix64(base ^ splitmix64(b as u64)))
            .collect();

        let outcomes = exec.parallel_for_chunked(self.b_outer, |b| {
            self.run_outer_replicate(x, stat, th, seeds[b], m_outer, m_inner)
        });

        let mut skipped_outer = 0usize;
        let mut skipped_inner_total = 0usize;
        let mut inner_attempted_total = 0usize;
        let mut theta_all: Vec<f64> = Vec::with_capacity(self.b_outer);
        let mut t_eff: Vec<f64> = Vec::with_capacity(self.b_outer);
        let mut theta_eff: Vec<f64> = Vec::with_capacity(self.b_outer);

        for o in &outcomes {
            inner_attempted_total += o.inner_attempted;
            skipped_inner_total += o.inner_skipped;
            if o.theta.is_finite() {
                theta_all.push(o.theta);
            }
            if o.t.is_finite() && o.theta.is_finite() {
                t_eff.push(o.t);
                theta_eff.push(o.theta);
            } else {
                skipped_outer += 1;
            }
        }

        // Degenerate distribution: every finite θ* identical.
        if !theta_all.is_empty() {
            let first = theta_all[0];
            if theta_all.iter().all(|&v| v == first) {
                return Ok(PercentileTResult {
                    mean: dec(first),
                    lower: dec(first),
                    upper: dec(first),
                    cl: self.cl,
                    interval_type: self.interval_type,
                    n,
                    b_outer: self.b_outer,
                    b_inner: self.b_inner,
                    effective_b: t_eff.len(),
                    skipped_outer,
                    skipped_inner_total,
                    inner_attempted_total,
                    m_outer,
                    m_inner,
                    l: self.resampler.block_len(),
                    se_hat: 0.0,
                    theta_stats: theta_all,
                    t_stats: t_eff,
                });
            }
        }

        let effective_b = t_eff.len();
        if skipped_outer > 0 {
            debug!(
                skipped_outer,
                skipped_inner_total, effective_b, "percentile-t discarded outer replicates"
            );
        }
        if effective_b < MIN_EFFECTIVE_B {
            return Err(CoreError::Logic(
                "percentile-t: too few finite studentized pivots".into(),
            ));
        }

        // SE_hat = SD(θ*) across valid outer replicates.
        let m = theta_eff.len() as f64;
        let (sum, sum2) = theta_eff
            .iter()
            .fold((0.0, 0.0), |(s, s2), &v| (s + v, s2 + v * v));
        let var = (sum2 / m - (sum / m) * (sum / m)).max(0.0);
        let se_hat = var.sqrt();

        // Pivot quantile probabilities. The reflection lower = θ̂ − t_hi·SE
        // swaps which tail a one-sided request pins, so the extreme tail
        // lands on the opposite probability from the quantile engines.
        let alpha = self.interval_type.alpha(self.cl);
        let (p_t_lo, p_t_hi) = match self.interval_type {
            IntervalType::TwoSided => (alpha, 1.0 - alpha),
            IntervalType::OneSidedLower => {
                (IntervalType::extreme_quantile(alpha, false), 1.0 - alpha)
            }
            IntervalType::OneSidedUpper => {
                (alpha, IntervalType::extreme_quantile(alpha, true))
            }
        };

        let t_lo = select_type7_quantile(&t_eff, p_t_lo);
        let t_hi = select_type7_quantile(&t_eff, p_t_hi);

        let lower = th - t_hi * se_hat;
        let upper = th - t_lo * se_hat;

        Ok(PercentileTResult {
            mean: dec(th),
            lower: dec(lower),
            upper: dec(upper),
            cl: self.cl,
            interval_type: self.interval_type,
            n,
            b_outer: self.b_outer,
            b_inner: self.b_inner,
            effective_b,
            skipped_outer,
            skipped_inner_total,
            inner_attempted_total,
            m_outer,
            m_inner,
            l: self.resampler.block_len(),
            se_hat,
            theta_stats: theta_eff,
            t_stats: t_eff,
        })
    }

    fn run_outer_replicate<S>(
        &self,
        x: &[T],
        stat: &S,
        th: f64,
        seed: u64,
        m_outer: usize,
        m_inner: usize,
    ) -> OuterOutcome
    where
        S: Statistic<T>,
    {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut y_outer: Vec<T> = Vec::with_capacity(m_outer);
        let mut y_inner: Vec<T> = Vec::with_capacity(m_inner);

        self.resampler.resample_into(x, &mut y_outer, m_outer, &mut rng);
        let theta_star = stat.compute(&y_outer);
        if !theta_star.is_finite() {
            return OuterOutcome {
                theta: f64::NAN,
                t: f64::NAN,
                inner_attempted: 0,
                inner_skipped: 0,
            };
        }

        // Inner bootstrap for SE*: Welford accumulation with early stop once
        // the running SE stabilizes.
        let mut mean = 0.0f64;
        let mut m2 = 0.0f64;
        let mut eff_inner = 0usize;
        let mut inner_attempted = 0usize;
        let mut inner_skipped = 0usize;
        let mut last_se = f64::INFINITY;

        for _ in 0..self.b_inner {
            inner_attempted += 1;
            self.resampler
                .resample_into(&y_outer, &mut y_inner, m_inner, &mut rng);
            let v = stat.compute(&y_inner);
            if !v.is_finite() {
                inner_skipped += 1;
                continue;
            }
            eff_inner += 1;
            let delta = v - mean;
            mean += delta / eff_inner as f64;
            m2 += delta * (v - mean);

            if eff_inner >= MIN_INNER && eff_inner % CHECK_EVERY == 0 {
                let se_now = (m2 / eff_inner as f64).max(0.0).sqrt();
                if se_now.is_finite() && (se_now - last_se).abs() <= REL_EPS * se_now.max(1e-300) {
                    break;
                }
                last_se = se_now;
            }
        }

        if eff_inner < MIN_INNER {
            return OuterOutcome {
                theta: theta_star,
                t: f64::NAN,
                inner_attempted,
                inner_skipped,
            };
        }

        let se_star = (m2 / eff_inner as f64).max(0.0).sqrt();
        if !(se_star > 0.0) || !se_star.is_finite() {
            return OuterOutcome {
                theta: theta_star,
                t: f64::NAN,
                inner_attempted,
                inner_skipped,
            };
        }

        OuterOutcome {
            theta: theta_star,
            t: (theta_star - th) / se_star,
            inner_attempted,
            inner_skipped,
        }
    }
}
