//! Normal, Basic, and Percentile bootstrap engines.
//!
//! The three share one replicate driver and differ only in endpoint
//! construction, so they live behind a closed method tag rather than three
//! near-identical types.

use std::marker::PhantomData;

use ci_core::{
    dec, normal::inverse_normal_cdf, sample_std_dev, CoreError, IntervalType, Statistic,
};

use crate::executor::Executor;
use crate::resample::Resampler;
use crate::result::{select_unbiased_quantile, BootResult};
use crate::rng::{CrnProvider, ReplicateRng};

/// Endpoint construction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleMethod {
    /// θ̂ ± z·SE of the bootstrap distribution.
    Normal,
    /// Reflection: [2θ̂ − Q(hi), 2θ̂ − Q(lo)].
    Basic,
    /// Direct bootstrap quantiles.
    Percentile,
}

pub struct SimpleBootstrap<T, R> {
    method: SimpleMethod,
    b: usize,
    cl: f64,
    interval_type: IntervalType,
    resampler: R,
    rng: ReplicateRng,
    _sample: PhantomData<fn(T)>,
}

impl<T, R> SimpleBootstrap<T, R>
where
    T: Clone + Send + Sync,
    R: Resampler<T>,
{
    pub fn new(
        method: SimpleMethod,
        b: usize,
        cl: f64,
        interval_type: IntervalType,
        resampler: R,
    ) -> Result<Self, CoreError> {
        Self::build(method, b, cl, interval_type, resampler, ReplicateRng::from_entropy())
    }

    /// CRN construction: replicate `b` always draws from `provider.make_engine(b)`.
    pub fn with_provider(
        method: SimpleMethod,
        b: usize,
        cl: f64,
        interval_type: IntervalType,
        resampler: R,
        provider: CrnProvider,
    ) -> Result<Self, CoreError> {
        Self::build(method, b, cl, interval_type, resampler, ReplicateRng::Crn(provider))
    }

    fn build(
        method: SimpleMethod,
        b: usize,
        cl: f64,
        interval_type: IntervalType,
        resampler: R,
        rng: ReplicateRng,
    ) -> Result<Self, CoreError> {
        validate_common(b, cl)?;
        Ok(Self {
            method,
            b,
            cl,
            interval_type,
            resampler,
            rng,
            _sample: PhantomData,
        })
    }

    pub fn method(&self) -> SimpleMethod {
        self.method
    }

    pub fn run<S, E>(&self, x: &[T], stat: &S, exec: &E) -> Result<BootResult, CoreError>
    where
        S: Statistic<T>,
        E: Executor,
    {
        let n = x.len();
        if n < 2 {
            return Err(CoreError::InvalidArgument(
                "bootstrap requires at least 2 data points".into(),
            ));
        }

        let th = stat.compute(x);

        let raw = exec.parallel_for_chunked(self.b, |i| {
            let mut rng = self.rng.engine(i as u64);
            let mut y: Vec<T> = Vec::with_capacity(n);
            self.resampler.resample_into(x, &mut y, n, &mut rng);
            stat.compute(&y)
        });

        let boot_stats: Vec<f64> = raw.into_iter().filter(|v| v.is_finite()).collect();
        let effective_b = boot_stats.len();
        let skipped = self.b - effective_b;
        if effective_b < 2 {
            return Err(CoreError::Logic(
                "fewer than 2 finite bootstrap statistics".into(),
            ));
        }

        if let Some(point) = degenerate_point(&boot_stats) {
            return Ok(BootResult {
                mean: dec(point),
                lower: dec(point),
                upper: dec(point),
                cl: self.cl,
                interval_type: self.interval_type,
                n,
                b: self.b,
                effective_b,
                skipped,
                boot_stats,
            });
        }

        let (p_lo, p_hi) = self.interval_type.tail_probabilities(self.cl);
        let (lower, upper) = match self.method {
            SimpleMethod::Percentile => (
                select_unbiased_quantile(&boot_stats, p_lo),
                select_unbiased_quantile(&boot_stats, p_hi),
            ),
            SimpleMethod::Basic => {
                let q_lo = select_unbiased_quantile(&boot_stats, p_lo);
                let q_hi = select_unbiased_quantile(&boot_stats, p_hi);
                (2.0 * th - q_hi, 2.0 * th - q_lo)
            }
            SimpleMethod::Normal => {
                let se = sample_std_dev(&boot_stats);
                let z_lo = inverse_normal_cdf(p_lo);
                let z_hi = inverse_normal_cdf(p_hi);
                (th + z_lo * se, th + z_hi * se)
            }
        };

        Ok(BootResult {
            mean: dec(th),
            lower: dec(lower),
            upper: dec(upper),
            cl: self.cl,
            interval_type: self.interval_type,
            n,
            b: self.b,
            effective_b,
            skipped,
            boot_stats,
        })
    }
}

pub(crate) fn validate_common(b: usize, cl: f64) -> Result<(), CoreError> {
    if b < 100 {
        return Err(CoreError::InvalidArgument(
            "number of resamples must be at least 100".into(),
        ));
    }
    if !(cl > 0.5 && cl < 1.0) {
        return Err(CoreError::InvalidArgument(
            "confidence level must be in (0.5, 1)".into(),
        ));
    }
    Ok(())
}

/// The collapsed value when every finite replicate is identical.
pub(crate) fn degenerate_point(boot_stats: &[f64]) -> Option<f64> {
    let first = boot_stats[0];
    if boot_stats.iter().all(|&v| v == first) {
        Some(first)
    } else {
        None
    }
}
