//! Conservative small-N lower bounds.
//!
//! Full-size resampling overfits the realized history when n is 20–60: the
//! resulting intervals are too narrow and flatter strategies slip through.
//! The conservative path runs a duel instead: m-out-of-n (a harsher test,
//! each replicate sees only ~n^(2/3) observations) against BCa, both on the
//! *same* resampler and CRN stream, keeping the lower of the two lower
//! bounds.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use bootstrap_engines::{
    CrnTags, Executor, IidResampler, Resampler, StationaryBlockResampler, TradingBootstrapFactory,
};
use ci_core::{
    annualize_one, consts, dec, skew_and_excess_kurtosis, to_f64, CoreError, Decimal, GeoMeanStat,
    IntervalType,
};

use crate::heuristics::{
    choose_block_small_n, clamp_small_l, longest_sign_run, sign_positive_ratio,
    z_from_two_sided_cl,
};

/// Below this n the block resampler is always used; IID at tiny n trusts
/// exchangeability more than the data can support.
const N_BLOCK_ALWAYS: usize = 60;

/// Runtime-selected resampler for the small-N path.
#[derive(Debug, Clone, Copy)]
pub enum SmallNResampler {
    Iid(IidResampler),
    Block(StationaryBlockResampler),
}

impl SmallNResampler {
    pub fn name(&self) -> &'static str {
        match self {
            SmallNResampler::Iid(_) => "IidResampler",
            SmallNResampler::Block(_) => "StationaryBlockResampler",
        }
    }
}

impl Resampler<Decimal> for SmallNResampler {
    fn resample_into(
        &self,
        x: &[Decimal],
        y: &mut Vec<Decimal>,
        m: usize,
        rng: &mut rand::rngs::StdRng,
    ) {
        match self {
            SmallNResampler::Iid(r) => r.resample_into(x, y, m, rng),
            SmallNResampler::Block(r) => r.resample_into(x, y, m, rng),
        }
    }

    fn jackknife(
        &self,
        x: &[Decimal],
        stat: &dyn ci_core::Statistic<Decimal>,
    ) -> Result<Vec<f64>, CoreError> {
        match self {
            SmallNResampler::Iid(r) => r.jackknife(x, stat),
            SmallNResampler::Block(r) => r.jackknife(x, stat),
        }
    }

    fn block_len(&self) -> usize {
        match self {
            SmallNResampler::Iid(r) => Resampler::<Decimal>::block_len(r),
            SmallNResampler::Block(r) => Resampler::<Decimal>::block_len(r),
        }
    }
}

/// Aggregate result of the conservative small-N duel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmallNConservativeResult {
    /// Combined per-period lower bound (min of the engines).
    pub per_lower: Decimal,
    /// Annualized lower bound.
    pub ann_lower: Decimal,
    /// Subsample size the m-out-of-n engine drew.
    pub m_sub: usize,
    /// Block length actually used (clamped).
    pub l_used: usize,
    /// Usable replicates per engine.
    pub eff_b_mn: usize,
    pub eff_b_bca: usize,
    /// Which resampler the heuristics picked.
    pub resampler_name: String,
}

/// Conservative lower bound with automatic heavy-tail detection.
#[allow(clippy::too_many_arguments)]
pub fn conservative_small_n_lower_bound_auto<E: Executor>(
    returns: &[Decimal],
    l: usize,
    annualization_factor: f64,
    conf_level: f64,
    b: usize,
    rho_m: Option<f64>,
    strategy_id: u64,
    factory: &TradingBootstrapFactory,
    stage_tag: u64,
    fold: u64,
    exec: &E,
) -> Result<SmallNConservativeResult, CoreError> {
    let xs: Vec<f64> = returns.iter().map(|d| to_f64(*d)).collect();
    let (skew, exkurt) = skew_and_excess_kurtosis(&xs);
    let heavy = crate::heuristics::has_heavy_tails_wide(skew, exkurt);
    let heavy_override = if heavy { Some(true) } else { None };

    debug!(skew, exkurt, heavy, "small-N tail diagnostics");

    conservative_small_n_lower_bound(
        returns,
        l,
        annualization_factor,
        conf_level,
        b,
        rho_m,
        strategy_id,
        factory,
        stage_tag,
        fold,
        heavy_override,
        exec,
    )
}

/// Core conservative small-N duel.
///
/// Resampler choice: an explicit override wins; otherwise block resampling
/// is unconditional up to n = 60, and the sign heuristics decide beyond
/// that. Both engines run on the chosen resampler with identical CRN tags,
/// and the result carries `min(lb_mn, lb_bca)`.
#[allow(clippy::too_many_arguments)]
pub fn conservative_small_n_lower_bound<E: Executor>(
    returns: &[Decimal],
    l: usize,
    annualization_factor: f64,
    conf_level: f64,
    b: usize,
    rho_m: Option<f64>,
    strategy_id: u64,
    factory: &TradingBootstrapFactory,
    stage_tag: u64,
    fold: u64,
    heavy_tails_override: Option<bool>,
    exec: &E,
) -> Result<SmallNConservativeResult, CoreError> {
    let n = returns.len();
    let ratio_pos = sign_positive_ratio(returns);
    let runlen = longest_sign_run(returns);
    let l_small = clamp_small_l(l);

    let use_block = match heavy_tails_override {
        Some(explicit) => explicit,
        None if n <= N_BLOCK_ALWAYS => true,
        None => choose_block_small_n(ratio_pos, n, runlen),
    };

    let resampler = if use_block {
        SmallNResampler::Block(StationaryBlockResampler::new(l_small))
    } else {
        SmallNResampler::Iid(IidResampler)
    };

    let tags = CrnTags::new(strategy_id, stage_tag, l_small as u64, fold);
    let stat = GeoMeanStat::default();
    let z = z_from_two_sided_cl(conf_level);

    // m-out-of-n leg.
    let rho = rho_m.filter(|r| *r > 0.0);
    let mn = factory
        .make_m_out_of_n(b, conf_level, rho, IntervalType::TwoSided, resampler, tags)?
        .run(returns, &stat, exec)?;
    let lb_mn = mn.lower;

    let mn_ratio = if n > 0 { mn.m_sub as f64 / n as f64 } else { 0.0 };
    debug!(
        m_sub = mn.m_sub,
        n,
        mn_ratio,
        shrink = 1.0 - mn_ratio,
        "m-out-of-n subsample"
    );
    if z > 0.0 {
        let width = (to_f64(mn.upper) - to_f64(mn.lower)).max(0.0);
        let sigma = width / (2.0 * z);
        debug!(sigma, eff_b = mn.effective_b, l = mn.l, "m-out-of-n effective sigma");
    }

    // BCa leg on the same resampler and CRN tags.
    let bca = factory
        .make_bca(b, conf_level, IntervalType::TwoSided, resampler, tags)?
        .run(returns, &stat, exec)?;
    let lb_bca = bca.lower;

    let per_lower = if lb_mn < lb_bca { lb_mn } else { lb_bca };
    let ann_lower = annualize_one(per_lower, annualization_factor)?;

    info!(
        resampler = resampler.name(),
        l_small,
        m_sub = mn.m_sub,
        "conservative small-N lower bound policy"
    );

    Ok(SmallNConservativeResult {
        per_lower,
        ann_lower,
        m_sub: mn.m_sub,
        l_used: l_small,
        eff_b_mn: mn.effective_b,
        eff_b_bca: bca.effective_b,
        resampler_name: resampler.name().to_string(),
    })
}

/// Minimum of the bounds; zero for an empty list.
pub fn min_of(v: &[Decimal]) -> Decimal {
    v.iter().copied().fold(None::<Decimal>, |acc, x| {
        Some(match acc {
            Some(m) if m < x => m,
            _ => x,
        })
    })
    .unwrap_or(consts::ZERO)
}

/// Median for two or three bounds; the two-element case takes the midpoint.
pub fn median_of_2_or_3(mut v: Vec<Decimal>) -> Decimal {
    v.sort();
    match v.len() {
        0 => consts::ZERO,
        1 => v[0],
        2 => v[0] + (v[1] - v[0]) / dec(2.0),
        _ => v[v.len() / 2],
    }
}

/// 2-of-3 vote (median) or strict minimum, per caller policy.
pub fn combine_lbs_2of3_or_min(parts: &[Decimal], vote2: bool) -> Decimal {
    if !vote2 || parts.is_empty() {
        return min_of(parts);
    }
    if parts.len() == 1 {
        return parts[0];
    }
    median_of_2_or_3(parts.to_vec())
}

/// Hurdle-aware combiner over per-period lower bounds.
///
/// When the annualized median of the candidates sits within `proximity_bps`
/// of the hurdle, the call is too close to trust a vote and the minimum is
/// taken. Away from the hurdle the median-of-present wins; with exactly two
/// candidates the one closer to their midpoint is returned.
pub fn combine_lbs_with_near_hurdle(
    parts_per: &[Decimal],
    annualization_factor: f64,
    hurdle_annual: Decimal,
    proximity_bps: f64,
) -> Result<Decimal, CoreError> {
    if parts_per.is_empty() {
        return Ok(consts::ZERO);
    }
    if parts_per.len() == 1 {
        return Ok(parts_per[0]);
    }

    let mut annualized = Vec::with_capacity(parts_per.len());
    for p in parts_per {
        annualized.push(annualize_one(*p, annualization_factor)?);
    }

    let med_ann = median_of_2_or_3(annualized.clone());
    let delta_bps = 10_000.0 * to_f64(med_ann - hurdle_annual);

    if delta_bps.abs() <= proximity_bps {
        // Near the hurdle: be conservative, take the minimum.
        let (idx, _) = annualized
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.cmp(b))
            .expect("non-empty");
        return Ok(parts_per[idx]);
    }

    let mut pairs: Vec<(Decimal, usize)> = annualized
        .iter()
        .copied()
        .zip(0..parts_per.len())
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    if pairs.len() == 2 {
        let mid = pairs[0].0 + (pairs[1].0 - pairs[0].0) / dec(2.0);
        let d0 = (to_f64(pairs[0].0) - to_f64(mid)).abs();
        let d1 = (to_f64(pairs[1].0) - to_f64(mid)).abs();
        let idx = if d0 <= d1 { pairs[0].1 } else { pairs[1].1 };
        return Ok(parts_per[idx]);
    }

    Ok(parts_per[pairs[pairs.len() / 2].1])
}
