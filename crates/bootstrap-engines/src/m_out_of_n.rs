//! m-out-of-n subsampling bootstrap.
//!
//! Resamples `m < n` observations per replicate and builds a percentile
//! interval on the subsampled distribution. The shrunken subsample inflates
//! replicate variance, which is exactly the point: it is the rescue method
//! for small, heavy-tailed samples where full-size resampling is
//! anti-conservative. The tournament grants it a relaxed length ceiling for
//! the same reason.

use std::marker::PhantomData;

use ci_core::{dec, CoreError, IntervalType, Statistic};

use crate::executor::Executor;
use crate::resample::Resampler;
use crate::result::{select_unbiased_quantile, MOutOfNResult};
use crate::rng::{CrnProvider, ReplicateRng};
use crate::simple::{degenerate_point, validate_common};

pub struct MOutOfNBootstrap<T, R> {
    b: usize,
    cl: f64,
    interval_type: IntervalType,
    /// Subsample ratio m/n; `None` selects the power-law default.
    m_ratio: Option<f64>,
    resampler: R,
    rng: ReplicateRng,
    _sample: PhantomData<fn(T)>,
}

impl<T, R> MOutOfNBootstrap<T, R>
where
    T: Clone + Send + Sync,
    R: Resampler<T>,
{
    pub fn new(
        b: usize,
        cl: f64,
        m_ratio: Option<f64>,
        interval_type: IntervalType,
        resampler: R,
    ) -> Result<Self, CoreError> {
        Self::build(b, cl, m_ratio, interval_type, resampler, ReplicateRng::from_entropy())
    }

    pub fn with_provider(
        b: usize,
        cl: f64,
        m_ratio: Option<f64>,
        interval_type: IntervalType,
        resampler: R,
        provider: CrnProvider,
    ) -> Result<Self, CoreError> {
        Self::build(b, cl, m_ratio, interval_type, resampler, ReplicateRng::Crn(provider))
    }

    fn build(
        b: usize,
        cl: f64,
        m_ratio: Option<f64>,
        interval_type: IntervalType,
        resampler: R,
        rng: ReplicateRng,
    ) -> Result<Self, CoreError> {
        validate_common(b, cl)?;
        if let Some(rho) = m_ratio {
            if !(rho > 0.0 && rho <= 1.0) {
                return Err(CoreError::InvalidArgument(
                    "m-out-of-n ratio must be in (0, 1]".into(),
                ));
            }
        }
        Ok(Self {
            b,
            cl,
            interval_type,
            m_ratio,
            resampler,
            rng,
            _sample: PhantomData,
        })
    }

    /// Power-law default ratio: target `m = n^(2/3)` with a floor of 7 and a
    /// ceiling of `n − 1`, returned as m/n. Shrinks the subsample as n grows
    /// so the method keeps its consistency benefits.
    pub fn default_subsample_ratio(n: usize) -> f64 {
        if n < 3 {
            return 1.0;
        }
        let m_target = (n as f64).powf(2.0 / 3.0);
        let m = m_target.max(7.0).min((n - 1) as f64);
        m / n as f64
    }

    pub fn run<S, E>(&self, x: &[T], stat: &S, exec: &E) -> Result<MOutOfNResult, CoreError>
    where
        S: Statistic<T>,
        E: Executor,
    {
        let n = x.len();
        if n < 3 {
            return Err(CoreError::InvalidArgument(
                "m-out-of-n bootstrap requires at least 3 data points".into(),
            ));
        }

        let rho = self
            .m_ratio
            .unwrap_or_else(|| Self::default_subsample_ratio(n));
        let m_sub = ((rho * n as f64).round() as usize).clamp(2, n);

        let th = stat.compute(x);

        let raw = exec.parallel_for_chunked(self.b, |i| {
            let mut rng = self.rng.engine(i as u64);
            let mut y: Vec<T> = Vec::with_capacity(m_sub);
            self.resampler.resample_into(x, &mut y, m_sub, &mut rng);
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
            return Ok(MOutOfNResult {
                mean: dec(point),
                lower: dec(point),
                upper: dec(point),
                cl: self.cl,
                interval_type: self.interval_type,
                n,
                m_sub,
                b: self.b,
                effective_b,
                skipped,
                l: self.resampler.block_len(),
                boot_stats,
            });
        }

        let (p_lo, p_hi) = self.interval_type.tail_probabilities(self.cl);
        let lower = select_unbiased_quantile(&boot_stats, p_lo);
        let upper = select_unbiased_quantile(&boot_stats, p_hi);

        Ok(MOutOfNResult {
            mean: dec(th),
            lower: dec(lower),
            upper: dec(upper),
            cl: self.cl,
            interval_type: self.interval_type,
            n,
            m_sub,
            b: self.b,
            effective_b,
            skipped,
            l: self.resampler.block_len(),
            boot_stats,
        })
    }
}
