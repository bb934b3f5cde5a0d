//! Factory wiring engines to their CRN providers.
//!
//! Every `make_*` builds an engine and the provider derived from
//! `(master seed, strategy id, stage tag, L, fold)`. Two factory calls with
//! the same tuple produce bitwise-identical engines, and therefore
//! bitwise-identical bounds on the same data. That is the determinism contract the
//! validation pipeline leans on when it re-runs stages.

use rand::rngs::StdRng;

use ci_core::{CoreError, IntervalType, StrategyIdentity};

use crate::bca::BCaBootstrap;
use crate::m_out_of_n::MOutOfNBootstrap;
use crate::percentile_t::PercentileTBootstrap;
use crate::resample::Resampler;
use crate::rng::{CrnKey, CrnProvider};
use crate::simple::{SimpleBootstrap, SimpleMethod};

#[derive(Debug, Clone, Copy)]
pub struct TradingBootstrapFactory {
    master_seed: u64,
}

/// CRN tag tuple identifying one analysis cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrnTags {
    pub strategy_id: u64,
    pub stage_tag: u64,
    pub l: u64,
    pub fold: u64,
}

impl CrnTags {
    pub fn new(strategy_id: u64, stage_tag: u64, l: u64, fold: u64) -> Self {
        Self {
            strategy_id,
            stage_tag,
            l,
            fold,
        }
    }

    pub fn for_strategy<S: StrategyIdentity>(
        strategy: &S,
        stage_tag: u64,
        l: u64,
        fold: u64,
    ) -> Self {
        Self::new(strategy.hash_code(), stage_tag, l, fold)
    }
}

impl TradingBootstrapFactory {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    /// Reduce the tag tuple into a CRN key.
    pub fn crn_key(&self, tags: CrnTags) -> CrnKey {
        CrnKey::new(self.master_seed)
            .with_tag(tags.strategy_id)
            .with_tags(&[tags.stage_tag, tags.l, tags.fold])
    }

    pub fn provider(&self, tags: CrnTags) -> CrnProvider {
        CrnProvider::new(self.crn_key(tags))
    }

    pub fn make_bca<T, R>(
        &self,
        b: usize,
        cl: f64,
        interval_type: IntervalType,
        resampler: R,
        tags: CrnTags,
    ) -> Result<BCaBootstrap<T, R>, CoreError>
    where
        T: Clone + Send + Sync,
        R: Resampler<T>,
    {
        BCaBootstrap::with_provider(b, cl, interval_type, resampler, self.provider(tags))
    }

    /// Percentile-t engine plus the caller-level engine that seeds its outer
    /// loop.
    pub fn make_percentile_t<T, R>(
        &self,
        b_outer: usize,
        b_inner: usize,
        cl: f64,
        interval_type: IntervalType,
        resampler: R,
        tags: CrnTags,
    ) -> Result<(PercentileTBootstrap<T, R>, StdRng), CoreError>
    where
        T: Clone + Send + Sync,
        R: Resampler<T>,
    {
        let engine = PercentileTBootstrap::new(b_outer, b_inner, cl, interval_type, resampler)?;
        Ok((engine, self.provider(tags).root_engine()))
    }

    pub fn make_m_out_of_n<T, R>(
        &self,
        b: usize,
        cl: f64,
        m_ratio: Option<f64>,
        interval_type: IntervalType,
        resampler: R,
        tags: CrnTags,
    ) -> Result<MOutOfNBootstrap<T, R>, CoreError>
    where
        T: Clone + Send + Sync,
        R: Resampler<T>,
    {
        MOutOfNBootstrap::with_provider(b, cl, m_ratio, interval_type, resampler, self.provider(tags))
    }

    pub fn make_normal<T, R>(
        &self,
        b: usize,
        cl: f64,
        interval_type: IntervalType,
        resampler: R,
        tags: CrnTags,
    ) -> Result<SimpleBootstrap<T, R>, CoreError>
    where
        T: Clone + Send + Sync,
        R: Resampler<T>,
    {
        SimpleBootstrap::with_provider(
            SimpleMethod::Normal,
            b,
            cl,
            interval_type,
            resampler,
            self.provider(tags),
        )
    }

    pub fn make_basic<T, R>(
        &self,
        b: usize,
        cl: f64,
        interval_type: IntervalType,
        resampler: R,
        tags: CrnTags,
    ) -> Result<SimpleBootstrap<T, R>, CoreError>
    where
        T: Clone + Send + Sync,
        R: Resampler<T>,
    {
        SimpleBootstrap::with_provider(
            SimpleMethod::Basic,
            b,
            cl,
            interval_type,
            resampler,
            self.provider(tags),
        )
    }

    pub fn make_percentile<T, R>(
        &self,
        b: usize,
        cl: f64,
        interval_type: IntervalType,
        resampler: R,
        tags: CrnTags,
    ) -> Result<SimpleBootstrap<T, R>, CoreError>
    where
        T: Clone + Send + Sync,
        R: Resampler<T>,
    {
        SimpleBootstrap::with_provider(
            SimpleMethod::Percentile,
            b,
            cl,
            interval_type,
            resampler,
            self.provider(tags),
        )
    }
}
