//! Bias-corrected and accelerated (BCa) bootstrap.
//!
//! Second-order accurate intervals per Efron (1987): the percentile
//! quantiles are shifted by a bias-correction term z₀ (from the fraction of
//! replicates below θ̂) and an acceleration term a (from the resampler's
//! jackknife pseudo-values), then mapped back through Φ. The adjustment
//! breaks down under extreme bias or acceleration; the engine reports both
//! parameters so the tournament can gate on them.

use std::marker::PhantomData;

use tracing::debug;

use ci_core::{
    dec,
    normal::{inverse_normal_cdf, standard_normal_cdf},
    CoreError, IntervalType, Statistic,
};

use crate::executor::Executor;
use crate::resample::Resampler;
use crate::result::{unbiased_index, BcaResult};
use crate::rng::{CrnProvider, ReplicateRng};
use crate::simple::{degenerate_point, validate_common};

/// Proportions are clamped to this open neighborhood of {0, 1} before Φ⁻¹.
const PROP_CLAMP: f64 = 1e-10;
/// Below this |a| the acceleration adjustment is numerically a no-op.
const ACCEL_FLOOR: f64 = 1e-12;
/// Jackknife variance underflow guard.
const JACKKNIFE_UNDERFLOW: f64 = 1e-100;

pub struct BCaBootstrap<T, R> {
    b: usize,
    cl: f64,
    interval_type: IntervalType,
    resampler: R,
    rng: ReplicateRng,
    _sample: PhantomData<fn(T)>,
}

impl<T, R> BCaBootstrap<T, R>
where
    T: Clone + Send + Sync,
    R: Resampler<T>,
{
    pub fn new(
        b: usize,
        cl: f64,
        interval_type: IntervalType,
        resampler: R,
    ) -> Result<Self, CoreError> {
        Self::build(b, cl, interval_type, resampler, ReplicateRng::from_entropy())
    }

    pub fn with_provider(
        b: usize,
        cl: f64,
        interval_type: IntervalType,
        resampler: R,
        provider: CrnProvider,
    ) -> Result<Self, CoreError> {
        Self::build(b, cl, interval_type, resampler, ReplicateRng::Crn(provider))
    }

    fn build(
        b: usize,
        cl: f64,
        interval_type: IntervalType,
        resampler: R,
        rng: ReplicateRng,
    ) -> Result<Self, CoreError> {
        validate_common(b, cl)?;
        Ok(Self {
            b,
            cl,
            interval_type,
            resampler,
            rng,
            _sample: PhantomData,
        })
    }

    pub fn run<S, E>(&self, x: &[T], stat: &S, exec: &E) -> Result<BcaResult, CoreError>
    where
        S: Statistic<T>,
        E: Executor,
    {
        let n = x.len();
        if n < 2 {
            return Err(CoreError::InvalidArgument(
                "BCa bootstrap requires at least 2 data points".into(),
            ));
        }

        // (1) θ̂ on the original sample.
        let th = stat.compute(x);

        // (2) Bootstrap replicates.
        let raw = exec.parallel_for_chunked(self.b, |i| {
            let mut rng = self.rng.engine(i as u64);
            let mut y: Vec<T> = Vec::with_capacity(n);
            self.resampler.resample_into(x, &mut y, n, &mut rng);
            stat.compute(&y)
        });

        let boot_stats: Vec<f64> = raw.into_iter().filter(|v| v.is_finite()).collect();
        let effective_b = boot_stats.len();
        let skipped = self.b - effective_b;
        if skipped > 0 {
            debug!(skipped, b = self.b, "BCa skipped non-finite replicates");
        }
        if effective_b < 2 {
            return Err(CoreError::Logic(
                "fewer than 2 finite bootstrap statistics".into(),
            ));
        }

        if let Some(point) = degenerate_point(&boot_stats) {
            debug!("BCa bootstrap distribution degenerate, returning point interval");
            return Ok(BcaResult {
                mean: dec(point),
                lower: dec(point),
                upper: dec(point),
                cl: self.cl,
                interval_type: self.interval_type,
                n,
                b: self.b,
                effective_b,
                skipped,
                z0: 0.0,
                accel: 0.0,
                boot_stats,
            });
        }

        // (3) Bias correction z0 from the fraction of replicates below θ̂.
        let count_less = boot_stats.iter().filter(|&&v| v < th).count();
        let prop_less = (count_less as f64 / effective_b as f64)
            .clamp(PROP_CLAMP, 1.0 - PROP_CLAMP);
        let z0 = inverse_normal_cdf(prop_less);

        // (4) Acceleration a from the resampler's jackknife policy.
        let jk = self.resampler.jackknife(x, stat)?;
        let jk_avg = jk.iter().sum::<f64>() / jk.len() as f64;
        let mut num_d = 0.0; // Σ d³
        let mut den_d = 0.0; // Σ d²
        for &v in &jk {
            let d = jk_avg - v;
            let d2 = d * d;
            den_d += d2;
            num_d += d2 * d;
        }
        let mut accel = 0.0;
        if den_d > JACKKNIFE_UNDERFLOW {
            let den15 = den_d.powf(1.5);
            if den15 > JACKKNIFE_UNDERFLOW {
                accel = num_d / (6.0 * den15);
            }
        }

        // (5) Adjusted percentiles -> bounds.
        let alpha = self.interval_type.alpha(self.cl);
        let (z_lo, z_hi) = match self.interval_type {
            IntervalType::TwoSided => (
                inverse_normal_cdf(alpha),
                inverse_normal_cdf(1.0 - alpha),
            ),
            IntervalType::OneSidedLower => (
                inverse_normal_cdf(alpha),
                inverse_normal_cdf(IntervalType::extreme_quantile(alpha, true)),
            ),
            IntervalType::OneSidedUpper => (
                inverse_normal_cdf(IntervalType::extreme_quantile(alpha, false)),
                inverse_normal_cdf(1.0 - alpha),
            ),
        };

        let alpha1 = adjusted_tail_probability(z0, accel, z_lo);
        let alpha2 = adjusted_tail_probability(z0, accel, z_hi);

        let a1 = clamp_open_unit(alpha1);
        let a2 = clamp_open_unit(alpha2);

        let li = unbiased_index(a1.min(a2), effective_b);
        let ui = unbiased_index(a1.max(a2), effective_b);

        let mut work = boot_stats.clone();
        let cmp = |a: &f64, b: &f64| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal);
        let (_, lower, _) = work.select_nth_unstable_by(li, cmp);
        let lower = *lower;
        let (_, upper, _) = work.select_nth_unstable_by(ui, cmp);
        let upper = *upper;

        Ok(BcaResult {
            mean: dec(th),
            lower: dec(lower),
            upper: dec(upper),
            cl: self.cl,
            interval_type: self.interval_type,
            n,
            b: self.b,
            effective_b,
            skipped,
            z0,
            accel,
            boot_stats,
        })
    }
}

/// `Φ(z0 + (z0 + z) / (1 − a(z0 + z)))`, degrading to the plain percentile
/// adjustment `Φ(z0 + z)` when z0 is non-finite, the acceleration is
/// negligible, or the denominator degenerates.
fn adjusted_tail_probability(z0: f64, accel: f64, z: f64) -> f64 {
    let zz = z0 + z;
    if !z0.is_finite() || accel.abs() < ACCEL_FLOOR {
        return standard_normal_cdf(z0 + z);
    }
    let denom = 1.0 - accel * zz;
    if denom.abs() < 1e-8 {
        return standard_normal_cdf(z0 + z);
    }
    standard_normal_cdf(z0 + zz / denom)
}

fn clamp_open_unit(v: f64) -> f64 {
    if v.is_nan() {
        return 0.5;
    }
    v.clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON)
}
