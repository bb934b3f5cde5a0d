//! Candidate summarization and the selection tournament.
//!
//! Each engine result is first condensed into a `Candidate` carrying its
//! interval, diagnostics, and raw penalties. `select` then runs the
//! tournament: raw penalties → normalized weighted scores → hard gates →
//! lowest score wins (ties by method preference) → ranks and BCa rejection
//! analysis.

use ci_core::{
    empirical_cdf, median_sorted, sample_std_dev, skewness, to_f64, CoreError, StatisticSupport,
};

use bootstrap_engines::{BcaResult, BootResult, MOutOfNResult, PercentileTResult};

use crate::candidate::{
    AutoCiResult, Candidate, MethodId, RejectionMask, ScoreBreakdown, SelectionDiagnostics,
};
use crate::config;
use crate::penalty;
use crate::scoring::{CandidateGateKeeper, RawComponents, ScoreNormalizer, ScoringWeights};

/// Candidate for a Normal, Basic, or Percentile run.
pub fn summarize_percentile_like(
    method: MethodId,
    res: &BootResult,
) -> Result<Candidate, CoreError> {
    debug_assert!(matches!(
        method,
        MethodId::Normal | MethodId::Basic | MethodId::Percentile
    ));
    percentile_like_candidate(
        method,
        res.mean,
        res.lower,
        res.upper,
        res.cl,
        res.n,
        res.b,
        res.effective_b,
        res.skipped,
        &res.boot_stats,
    )
}

/// Candidate for an m-out-of-n run.
pub fn summarize_m_out_of_n(res: &MOutOfNResult) -> Result<Candidate, CoreError> {
    percentile_like_candidate(
        MethodId::MOutOfN,
        res.mean,
        res.lower,
        res.upper,
        res.cl,
        res.n,
        res.b,
        res.effective_b,
        res.skipped,
        &res.boot_stats,
    )
}

#[allow(clippy::too_many_arguments)]
fn percentile_like_candidate(
    method: MethodId,
    mean: ci_core::Decimal,
    lower: ci_core::Decimal,
    upper: ci_core::Decimal,
    cl: f64,
    n: usize,
    b: usize,
    effective_b: usize,
    skipped: usize,
    boot_stats: &[f64],
) -> Result<Candidate, CoreError> {
    if boot_stats.len() < 2 {
        return Err(CoreError::Logic(
            "need at least 2 bootstrap statistics to summarize a candidate".into(),
        ));
    }

    let mean_boot = ci_core::mean(boot_stats);
    let se_boot = sample_std_dev(boot_stats);
    // A zero SE means the distribution is degenerate; skewness reads as 0.
    let skew_boot = skewness(boot_stats, mean_boot, se_boot);

    let mu = to_f64(mean);
    let lo = to_f64(lower);
    let hi = to_f64(upper);
    let len = hi - lo;

    let mut center_shift_in_se = 0.0;
    if se_boot > 0.0 && len > 0.0 {
        let center = 0.5 * (lo + hi);
        center_shift_in_se = (center - mu).abs() / se_boot;
    }

    // Ordering (coverage) penalty applies only to Percentile and Normal.
    // Basic's reflected endpoints are not quantiles of the bootstrap
    // distribution, and m-out-of-n's rescaled space makes discrete coverage
    // counting a systematic artifact; both would be penalized for construction
    // choices rather than actual coverage defects.
    let mut ordering_penalty = 0.0;
    if method != MethodId::Basic && method != MethodId::MOutOfN {
        let f_lo = empirical_cdf(boot_stats, lo);
        let f_hi = empirical_cdf(boot_stats, hi);

        let mass = penalty::compute_empirical_mass_inclusive(boot_stats, lo, hi);
        if mass.effective_sample_count >= 2 {
            let b_eff = mass.effective_sample_count;
            let width_cdf = mass.mass_inclusive.clamp(0.0, 1.0);

            let under = penalty::under_coverage_with_half_step_tolerance(width_cdf, cl, b_eff);
            let over = penalty::over_coverage_with_half_step_tolerance(width_cdf, cl, b_eff);
            let cov_pen = config::UNDER_COVERAGE_MULTIPLIER * under * under
                + config::OVER_COVERAGE_MULTIPLIER * over * over;

            let f_mu = empirical_cdf(boot_stats, mu);
            let center_cdf = 0.5 * (f_lo + f_hi);
            let center_pen = (center_cdf - f_mu) * (center_cdf - f_mu);

            ordering_penalty = cov_pen + center_pen;
        }
    }

    let length = if method == MethodId::Normal {
        penalty::compute_length_penalty_normal(len, se_boot, cl)
    } else {
        penalty::compute_length_penalty_percentile(len, boot_stats, cl, method)
    };

    Ok(Candidate {
        method,
        mean,
        lower,
        upper,
        cl,
        n,
        b_outer: b,
        b_inner: 0,
        effective_b,
        skipped_total: skipped,
        se_boot,
        skew_boot,
        median_boot: length.median,
        center_shift_in_se,
        normalized_length: length.normalized_length,
        ordering_penalty,
        length_penalty: length.penalty,
        stability_penalty: 0.0,
        z0: 0.0,
        accel: 0.0,
        inner_failure_rate: 0.0,
        score: f64::NAN,
        candidate_id: 0,
        rank: 0,
        is_chosen: false,
    })
}

/// Candidate for a BCa run: adds the z0/accel stability penalty. Center
/// shift is not computed for BCa (its intervals are legitimately
/// asymmetric), and the ordering check does not apply either.
pub fn summarize_bca(res: &BcaResult, weights: &ScoringWeights) -> Result<Candidate, CoreError> {
    let stats = &res.boot_stats;
    if stats.len() < 2 {
        return Err(CoreError::Logic(
            "need at least 2 bootstrap statistics for a BCa candidate".into(),
        ));
    }

    let mean_boot = ci_core::mean(stats);
    let se_boot = sample_std_dev(stats);
    let skew_boot = skewness(stats, mean_boot, se_boot);

    let lo = to_f64(res.lower);
    let hi = to_f64(res.upper);
    let len = hi - lo;

    let length = penalty::compute_length_penalty_percentile(len, stats, res.cl, MethodId::BCa);

    let stability_penalty = penalty::compute_bca_stability_penalty(
        res.z0,
        res.accel,
        skew_boot,
        weights.bca_z0_scale,
        weights.bca_accel_scale,
    );

    let effective_b = stats.len();
    let skipped = res.b.saturating_sub(effective_b);

    Ok(Candidate {
        method: MethodId::BCa,
        mean: res.mean,
        lower: res.lower,
        upper: res.upper,
        cl: res.cl,
        n: res.n,
        b_outer: res.b,
        b_inner: 0,
        effective_b,
        skipped_total: skipped,
        se_boot,
        skew_boot,
        median_boot: length.median,
        center_shift_in_se: 0.0,
        normalized_length: length.normalized_length,
        ordering_penalty: 0.0,
        length_penalty: length.penalty,
        stability_penalty,
        z0: res.z0,
        accel: res.accel,
        inner_failure_rate: 0.0,
        score: f64::NAN,
        candidate_id: 0,
        rank: 0,
        is_chosen: false,
    })
}

/// Candidate for a Percentile-t run: stability derives from resample
/// quality (outer/inner failure rates, effective-B fraction), and the length
/// ideal lives in t-space.
pub fn summarize_percentile_t(res: &PercentileTResult) -> Result<Candidate, CoreError> {
    let theta_stats: Vec<f64> = res
        .theta_stats
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    if theta_stats.len() < 2 {
        return Err(CoreError::Logic(
            "need at least 2 finite theta* statistics for a percentile-t candidate".into(),
        ));
    }

    let mean_boot = ci_core::mean(&theta_stats);
    let se_boot_calc = sample_std_dev(&theta_stats);
    let se_ref = if res.se_hat > 0.0 {
        res.se_hat
    } else {
        se_boot_calc
    };
    let skew_boot = skewness(&theta_stats, mean_boot, se_boot_calc);

    let lo = to_f64(res.lower);
    let hi = to_f64(res.upper);
    let len = hi - lo;

    let mut theta_sorted = theta_stats.clone();
    theta_sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median_boot = median_sorted(&theta_sorted);

    let t_stats: Vec<f64> = res
        .t_stats
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    let length = if t_stats.len() >= 2 {
        penalty::compute_length_penalty_percentile_t(len, &t_stats, se_ref, res.cl)
    } else {
        penalty::compute_length_penalty_percentile_t(len, &[], se_ref, res.cl)
    };

    let stability_penalty = penalty::compute_percentile_t_stability(res);

    let inner_failure_rate = if res.inner_attempted_total > 0 {
        res.skipped_inner_total as f64 / res.inner_attempted_total as f64
    } else {
        0.0
    };

    Ok(Candidate {
        method: MethodId::PercentileT,
        mean: res.mean,
        lower: res.lower,
        upper: res.upper,
        cl: res.cl,
        n: res.n,
        b_outer: res.b_outer,
        b_inner: res.b_inner,
        effective_b: res.effective_b,
        skipped_total: res.skipped_outer + res.skipped_inner_total,
        se_boot: se_ref,
        skew_boot,
        median_boot,
        center_shift_in_se: 0.0,
        normalized_length: length.normalized_length,
        ordering_penalty: 0.0,
        length_penalty: length.penalty,
        stability_penalty,
        z0: 0.0,
        accel: 0.0,
        inner_failure_rate,
        score: f64::NAN,
        candidate_id: 0,
        rank: 0,
        is_chosen: false,
    })
}

/// Rejection mask for one candidate given its score and gate outcomes.
pub fn compute_rejection_mask(
    candidate: &Candidate,
    total_score: f64,
    domain_penalty: f64,
    passes_effective_b_gate: bool,
) -> RejectionMask {
    let mut mask = RejectionMask::NONE;

    if !total_score.is_finite() {
        mask |= RejectionMask::SCORE_NON_FINITE;
    }
    if domain_penalty > 0.0 {
        mask |= RejectionMask::VIOLATES_SUPPORT;
    }
    if !passes_effective_b_gate {
        mask |= RejectionMask::EFFECTIVE_B_LOW;
    }

    if candidate.method == MethodId::BCa {
        let z0 = candidate.z0;
        let accel = candidate.accel;

        if !z0.is_finite() || !accel.is_finite() {
            mask |= RejectionMask::BCA_PARAMS_NON_FINITE;
        }
        if z0.is_finite() && z0.abs() > config::BCA_Z0_HARD_LIMIT {
            mask |= RejectionMask::BCA_Z0_HARD_FAIL;
        }
        if accel.is_finite() && accel.abs() > config::BCA_ACCEL_HARD_LIMIT {
            mask |= RejectionMask::BCA_ACCEL_HARD_FAIL;
        }
    }

    if candidate.method == MethodId::PercentileT {
        if candidate.inner_failure_rate.is_finite()
            && candidate.inner_failure_rate > config::PERCENTILE_T_INNER_FAIL_THRESHOLD
        {
            mask |= RejectionMask::PERCENTILE_T_INNER_FAILS;
        }
        if candidate.b_outer > 0 {
            let eff_frac = candidate.effective_b as f64 / candidate.b_outer as f64;
            if eff_frac < config::PERCENTILE_T_MIN_EFFECTIVE_FRACTION {
                mask |= RejectionMask::PERCENTILE_T_LOW_EFF_B;
            }
        }
    }

    mask
}

/// Support actually enforced: `enforce_positive` installs a strict floor at
/// zero when the caller configured none.
fn effective_support(support: &StatisticSupport, weights: &ScoringWeights) -> StatisticSupport {
    if !support.has_lower_bound() && weights.enforce_positive {
        StatisticSupport::strict_lower_bound(0.0, config::POSITIVE_LOWER_EPSILON)
    } else {
        *support
    }
}

fn support_bounds(support: &StatisticSupport) -> (f64, f64) {
    // Supports constrain lower bounds only; the upper stays NaN.
    (support.lower_bound().unwrap_or(f64::NAN), f64::NAN)
}

struct BcaRejectionAnalysis {
    has_bca_candidate: bool,
    bca_chosen: bool,
    rejected_for_instability: bool,
    rejected_for_length: bool,
    rejected_for_domain: bool,
    rejected_for_non_finite: bool,
}

fn analyze_bca_rejection(
    enriched: &[Candidate],
    raw: &[RawComponents],
    winner_idx: usize,
    has_bca_candidate: bool,
) -> BcaRejectionAnalysis {
    if !has_bca_candidate {
        return BcaRejectionAnalysis {
            has_bca_candidate: false,
            bca_chosen: false,
            rejected_for_instability: false,
            rejected_for_length: false,
            rejected_for_domain: false,
            rejected_for_non_finite: false,
        };
    }

    if enriched[winner_idx].method == MethodId::BCa {
        return BcaRejectionAnalysis {
            has_bca_candidate: true,
            bca_chosen: true,
            rejected_for_instability: false,
            rejected_for_length: false,
            rejected_for_domain: false,
            rejected_for_non_finite: false,
        };
    }

    let mut rejected_for_instability = false;
    let mut rejected_for_length = false;
    let mut rejected_for_domain = false;
    let mut rejected_for_non_finite = false;

    for (i, c) in enriched.iter().enumerate() {
        if c.method != MethodId::BCa {
            continue;
        }

        if !c.score.is_finite() {
            rejected_for_non_finite = true;
        }
        if raw[i].domain_penalty > 0.0 {
            rejected_for_domain = true;
        }
        if !c.z0.is_finite()
            || !c.accel.is_finite()
            || c.z0.abs() > config::BCA_Z0_HARD_LIMIT
            || c.accel.abs() > config::BCA_ACCEL_HARD_LIMIT
        {
            rejected_for_instability = true;
        }
        if c.length_penalty > config::BCA_LENGTH_PENALTY_THRESHOLD {
            rejected_for_length = true;
        }

        break; // only one BCa candidate per tournament
    }

    BcaRejectionAnalysis {
        has_bca_candidate: true,
        bca_chosen: false,
        rejected_for_instability,
        rejected_for_length,
        rejected_for_domain,
        rejected_for_non_finite,
    }
}

/// Run the selection tournament over pre-summarized candidates.
///
/// Fails with `InvalidArgument` on an empty candidate list and with
/// `NoValidCandidate` when every candidate trips a hard gate; the latter
/// message lists each candidate's rejection mask.
pub fn select(
    candidates: &[Candidate],
    weights: &ScoringWeights,
    support: &StatisticSupport,
) -> Result<AutoCiResult, CoreError> {
    if candidates.is_empty() {
        return Err(CoreError::InvalidArgument(
            "select: no candidates provided".into(),
        ));
    }

    let effective = effective_support(support, weights);
    let bounds = support_bounds(&effective);

    // Phase 1: raw penalties.
    let raw = RawComponents::for_candidates(candidates, &effective);
    let has_bca = candidates.iter().any(|c| c.method == MethodId::BCa);

    // Phase 2: normalize and score.
    let normalizer = ScoreNormalizer::new(*weights);
    let mut enriched: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut breakdowns: Vec<ScoreBreakdown> = Vec::with_capacity(candidates.len());

    for (i, c) in candidates.iter().enumerate() {
        let r = &raw[i];
        let norm = normalizer.normalize(r);
        let total_score = normalizer.total_score(&norm, r, c.method, c.length_penalty);

        let passes_eff_b = CandidateGateKeeper::passes_effective_b_gate(c);
        let rejection_mask = compute_rejection_mask(c, total_score, r.domain_penalty, passes_eff_b);

        breakdowns.push(ScoreBreakdown {
            method: c.method,
            ordering_raw: r.ordering_penalty,
            length_raw: r.length_penalty,
            stability_raw: r.stability_penalty,
            center_sq_raw: r.center_shift_sq,
            skew_sq_raw: r.skew_sq,
            domain_raw: r.domain_penalty,
            ordering_norm: norm.ordering_norm,
            length_norm: norm.length_norm,
            stability_norm: norm.stability_norm,
            center_sq_norm: norm.center_sq_norm,
            skew_sq_norm: norm.skew_sq_norm,
            ordering_contrib: norm.ordering_contrib,
            length_contrib: norm.length_contrib,
            stability_contrib: norm.stability_contrib,
            center_sq_contrib: norm.center_sq_contrib,
            skew_sq_contrib: norm.skew_sq_contrib,
            domain_contrib: r.domain_penalty,
            total_score,
            rejection_text: rejection_mask.to_text(),
            rejection_mask,
            passed_gates: false, // filled in below
            violates_support: r.domain_penalty > 0.0,
            support_lower: bounds.0,
            support_upper: bounds.1,
        });

        enriched.push(c.clone().with_score(total_score).with_metadata(i as u64, 0, false));
    }

    for (i, b) in breakdowns.iter_mut().enumerate() {
        b.passed_gates = CandidateGateKeeper::is_valid(&enriched[i], &raw[i]);
    }

    // Phase 3: tournament.
    let mut selector = crate::scoring::TournamentSelector::new(&enriched);
    for i in 0..enriched.len() {
        if CandidateGateKeeper::is_valid(&enriched[i], &raw[i]) {
            selector.consider(i);
        }
    }
    let tie_epsilon = selector.tie_epsilon();
    let winner_idx = selector.winner_index().ok_or_else(|| {
        let masks: Vec<String> = breakdowns
            .iter()
            .map(|b| format!("{}=[{}]", b.method, b.rejection_text))
            .collect();
        CoreError::NoValidCandidate(format!(
            "all candidates rejected by hard gates: {}",
            masks.join(" ")
        ))
    })?;

    // Phase 4: ranks for eligible candidates, ascending by score.
    let winner_id = enriched[winner_idx].candidate_id;
    let mut order: Vec<usize> = (0..enriched.len()).collect();
    order.sort_by(|&a, &b| {
        enriched[a]
            .score
            .partial_cmp(&enriched[b].score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut rank = 1usize;
    for &i in &order {
        if CandidateGateKeeper::is_valid(&enriched[i], &raw[i]) {
            enriched[i].rank = rank;
            rank += 1;
        } else {
            enriched[i].rank = 0;
        }
    }
    for c in enriched.iter_mut() {
        if c.candidate_id == winner_id {
            c.is_chosen = true;
            break;
        }
    }

    // Phase 5: BCa rejection analysis.
    let bca = analyze_bca_rejection(&enriched, &raw, winner_idx, has_bca);

    let winner = enriched[winner_idx].clone();
    let diagnostics = SelectionDiagnostics {
        chosen_method: winner.method,
        chosen_method_name: winner.method.name().to_string(),
        chosen_score: winner.score,
        chosen_stability_penalty: winner.stability_penalty,
        chosen_length_penalty: winner.length_penalty,
        has_bca_candidate: bca.has_bca_candidate,
        bca_chosen: bca.bca_chosen,
        bca_rejected_for_instability: bca.rejected_for_instability,
        bca_rejected_for_length: bca.rejected_for_length,
        bca_rejected_for_domain: bca.rejected_for_domain,
        bca_rejected_for_non_finite: bca.rejected_for_non_finite,
        num_candidates: enriched.len(),
        score_breakdowns: breakdowns,
        tie_epsilon,
    };

    Ok(AutoCiResult {
        chosen_method: winner.method,
        chosen: winner,
        candidates: enriched,
        diagnostics,
    })
}
