use ci_core::{dec, CoreError, IntervalType, MeanStat, StatisticSupport};

use bootstrap_engines::{CrnTags, IidResampler, SingleThreadExecutor, TradingBootstrapFactory};

use crate::candidate::{Candidate, MethodId, RejectionMask};
use crate::scoring::ScoringWeights;
use crate::selector::{select, summarize_bca, summarize_percentile_like, summarize_percentile_t};

const MASTER_SEED: u64 = 0xDEAD_BEEF_CAFE_BABE;

/// Helper: a clean candidate that passes every gate with zero penalties.
fn clean_candidate(method: MethodId) -> Candidate {
    Candidate {
        method,
        mean: dec(0.01),
        lower: dec(0.001),
        upper: dec(0.02),
        cl: 0.95,
        n: 50,
        b_outer: 1000,
        b_inner: if method == MethodId::PercentileT { 200 } else { 0 },
        effective_b: 1000,
        skipped_total: 0,
        se_boot: 0.005,
        skew_boot: 0.1,
        median_boot: 0.01,
        center_shift_in_se: 0.0,
        normalized_length: 1.0,
        ordering_penalty: 0.0,
        length_penalty: 0.0,
        stability_penalty: 0.0,
        z0: 0.0,
        accel: 0.0,
        inner_failure_rate: 0.0,
        score: f64::NAN,
        candidate_id: 0,
        rank: 0,
        is_chosen: false,
    }
}

// =============================================================================
// Tournament mechanics on synthetic candidates
// =============================================================================

#[test]
fn test_tie_broken_by_method_preference() {
    // All-zero penalties tie every candidate; preference must pick BCa.
    let candidates = vec![
        clean_candidate(MethodId::Normal),
        clean_candidate(MethodId::Percentile),
        clean_candidate(MethodId::PercentileT),
        clean_candidate(MethodId::BCa),
        clean_candidate(MethodId::Basic),
    ];

    let result = select(
        &candidates,
        &ScoringWeights::returns_based(),
        &StatisticSupport::unbounded(),
    )
    .unwrap();

    assert_eq!(result.chosen_method, MethodId::BCa);
    assert!(result.chosen.is_chosen);
    assert!(result.diagnostics.bca_chosen);
    assert!(result.diagnostics.tie_epsilon > 0.0);

    // Order-independence: shuffling the list must not change the winner.
    let reordered: Vec<Candidate> = candidates.iter().rev().cloned().collect();
    let result2 = select(
        &reordered,
        &ScoringWeights::returns_based(),
        &StatisticSupport::unbounded(),
    )
    .unwrap();
    assert_eq!(result2.chosen_method, MethodId::BCa);
}

#[test]
fn test_bca_and_percentile_t_tie_selects_bca() {
    let candidates = vec![
        clean_candidate(MethodId::PercentileT),
        clean_candidate(MethodId::BCa),
    ];
    let result = select(
        &candidates,
        &ScoringWeights::default(),
        &StatisticSupport::unbounded(),
    )
    .unwrap();
    assert_eq!(result.chosen_method, MethodId::BCa);
}

#[test]
fn test_lowest_score_wins_over_preference() {
    let mut bca = clean_candidate(MethodId::BCa);
    bca.stability_penalty = 0.5; // normalized 0.5, weighted 0.5

    let percentile = clean_candidate(MethodId::Percentile);

    let result = select(
        &[bca, percentile],
        &ScoringWeights::returns_based(),
        &StatisticSupport::unbounded(),
    )
    .unwrap();

    assert_eq!(result.chosen_method, MethodId::Percentile);
    assert!(result.diagnostics.has_bca_candidate);
    assert!(!result.diagnostics.bca_chosen);
    // BCa lost on score, not gates.
    assert!(!result.diagnostics.bca_rejected_for_instability);
    assert!(!result.diagnostics.bca_rejected_for_non_finite);

    // Ranks: Percentile first, BCa second.
    let ranks: Vec<(MethodId, usize)> =
        result.candidates.iter().map(|c| (c.method, c.rank)).collect();
    assert!(ranks.contains(&(MethodId::Percentile, 1)));
    assert!(ranks.contains(&(MethodId::BCa, 2)));
}

#[test]
fn test_bca_hard_gate_on_z0() {
    // Extreme bias correction disqualifies BCa outright.
    let mut bca = clean_candidate(MethodId::BCa);
    bca.z0 = 0.8;

    let pt = clean_candidate(MethodId::PercentileT);
    let pct = clean_candidate(MethodId::Percentile);

    let result = select(
        &[bca, pt, pct],
        &ScoringWeights::returns_based(),
        &StatisticSupport::unbounded(),
    )
    .unwrap();

    // Falls back to the next-preferred method among the zero-score survivors.
    assert_eq!(result.chosen_method, MethodId::PercentileT);
    assert!(result.diagnostics.bca_rejected_for_instability);

    let bca_breakdown = result
        .diagnostics
        .score_breakdowns
        .iter()
        .find(|b| b.method == MethodId::BCa)
        .unwrap();
    assert!(bca_breakdown.rejection_mask.contains(RejectionMask::BCA_Z0_HARD_FAIL));
    assert!(!bca_breakdown.passed_gates);
    assert!(bca_breakdown.rejection_text.contains("BCA_Z0_EXCEEDED"));

    // The rejected candidate is unranked but still present.
    let bca_candidate = result
        .candidates
        .iter()
        .find(|c| c.method == MethodId::BCa)
        .unwrap();
    assert_eq!(bca_candidate.rank, 0);
    assert!(!bca_candidate.is_chosen);
}

#[test]
fn test_bca_hard_gate_on_accel_and_non_finite() {
    let mut accel_fail = clean_candidate(MethodId::BCa);
    accel_fail.accel = 0.3;
    let result = select(
        &[accel_fail, clean_candidate(MethodId::Percentile)],
        &ScoringWeights::default(),
        &StatisticSupport::unbounded(),
    )
    .unwrap();
    assert_eq!(result.chosen_method, MethodId::Percentile);
    let b = &result.diagnostics.score_breakdowns[0];
    assert!(b.rejection_mask.contains(RejectionMask::BCA_ACCEL_HARD_FAIL));

    let mut nan_z0 = clean_candidate(MethodId::BCa);
    nan_z0.z0 = f64::NAN;
    let result = select(
        &[nan_z0, clean_candidate(MethodId::Percentile)],
        &ScoringWeights::default(),
        &StatisticSupport::unbounded(),
    )
    .unwrap();
    let b = &result.diagnostics.score_breakdowns[0];
    assert!(b.rejection_mask.contains(RejectionMask::BCA_PARAMS_NON_FINITE));
    assert!(result.diagnostics.bca_rejected_for_instability);
}

#[test]
fn test_effective_b_gates() {
    // Absolute floor: 150 < 200.
    let mut starved = clean_candidate(MethodId::Percentile);
    starved.b_outer = 220;
    starved.effective_b = 150;

    let result = select(
        &[starved, clean_candidate(MethodId::Normal)],
        &ScoringWeights::default(),
        &StatisticSupport::unbounded(),
    )
    .unwrap();
    assert_eq!(result.chosen_method, MethodId::Normal);
    assert!(result.diagnostics.score_breakdowns[0]
        .rejection_mask
        .contains(RejectionMask::EFFECTIVE_B_LOW));

    // Fractional floor: 85% < 90% for a standard method.
    let mut fractional = clean_candidate(MethodId::Percentile);
    fractional.effective_b = 850;
    let result = select(
        &[fractional, clean_candidate(MethodId::Normal)],
        &ScoringWeights::default(),
        &StatisticSupport::unbounded(),
    )
    .unwrap();
    assert_eq!(result.chosen_method, MethodId::Normal);

    // Percentile-t is held to the relaxed 70% fraction: 850/1000 passes.
    let mut pt = clean_candidate(MethodId::PercentileT);
    pt.effective_b = 850;
    let result = select(
        &[pt, clean_candidate(MethodId::Normal)],
        &ScoringWeights::default(),
        &StatisticSupport::unbounded(),
    )
    .unwrap();
    assert_eq!(result.chosen_method, MethodId::PercentileT);

    // ...but 650/1000 fails it and sets the diagnostic flag too.
    let mut pt_low = clean_candidate(MethodId::PercentileT);
    pt_low.effective_b = 650;
    let result = select(
        &[pt_low, clean_candidate(MethodId::Normal)],
        &ScoringWeights::default(),
        &StatisticSupport::unbounded(),
    )
    .unwrap();
    assert_eq!(result.chosen_method, MethodId::Normal);
    let b = &result.diagnostics.score_breakdowns[0];
    assert!(b.rejection_mask.contains(RejectionMask::EFFECTIVE_B_LOW));
    assert!(b.rejection_mask.contains(RejectionMask::PERCENTILE_T_LOW_EFF_B));
}

#[test]
fn test_domain_gate_with_enforce_positive() {
    let mut negative_lower = clean_candidate(MethodId::Percentile);
    negative_lower.lower = dec(-0.05);

    // Without enforcement the interval is fine.
    let result = select(
        &[negative_lower.clone(), clean_candidate(MethodId::Normal)],
        &ScoringWeights::default(),
        &StatisticSupport::unbounded(),
    )
    .unwrap();
    assert_eq!(result.chosen_method, MethodId::Percentile);

    // Enforcing positivity installs a floor at 0 + epsilon.
    let weights = ScoringWeights::ratio_statistic().with_enforce_positive(true);
    let result = select(
        &[negative_lower, clean_candidate(MethodId::Normal)],
        &weights,
        &StatisticSupport::unbounded(),
    )
    .unwrap();
    assert_eq!(result.chosen_method, MethodId::Normal);
    let b = &result.diagnostics.score_breakdowns[0];
    assert!(b.rejection_mask.contains(RejectionMask::VIOLATES_SUPPORT));
    assert!(b.violates_support);
    assert_eq!(b.support_lower, 0.0);
    assert!(b.support_upper.is_nan());
}

#[test]
fn test_non_finite_stability_rejects_via_score() {
    let mut broken = clean_candidate(MethodId::PercentileT);
    broken.stability_penalty = f64::INFINITY;

    let result = select(
        &[broken, clean_candidate(MethodId::Percentile)],
        &ScoringWeights::default(),
        &StatisticSupport::unbounded(),
    )
    .unwrap();
    assert_eq!(result.chosen_method, MethodId::Percentile);
    assert!(result.diagnostics.score_breakdowns[0]
        .rejection_mask
        .contains(RejectionMask::SCORE_NON_FINITE));
}

#[test]
fn test_empty_and_all_invalid_candidate_lists() {
    let err = select(
        &[],
        &ScoringWeights::default(),
        &StatisticSupport::unbounded(),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::InvalidArgument(_)));

    let mut bad = clean_candidate(MethodId::BCa);
    bad.z0 = 0.9;
    let err = select(
        &[bad],
        &ScoringWeights::default(),
        &StatisticSupport::unbounded(),
    )
    .unwrap_err();
    match err {
        CoreError::NoValidCandidate(msg) => {
            assert!(msg.contains("BCA_Z0_EXCEEDED"), "diagnostic lists masks: {}", msg);
        }
        other => panic!("expected NoValidCandidate, got {:?}", other),
    }
}

#[test]
fn test_reselect_is_idempotent() {
    let mut bca = clean_candidate(MethodId::BCa);
    bca.stability_penalty = 0.2;
    let mut normal = clean_candidate(MethodId::Normal);
    normal.ordering_penalty = 0.001;

    let candidates = vec![
        bca,
        clean_candidate(MethodId::Percentile),
        normal,
        clean_candidate(MethodId::Basic),
    ];

    let weights = ScoringWeights::returns_based();
    let support = StatisticSupport::unbounded();

    let first = select(&candidates, &weights, &support).unwrap();
    let second = select(&first.candidates, &weights, &support).unwrap();

    assert_eq!(first.chosen_method, second.chosen_method);

    let ranks = |r: &crate::candidate::AutoCiResult| -> Vec<(MethodId, usize)> {
        let mut v: Vec<(MethodId, usize)> =
            r.candidates.iter().map(|c| (c.method, c.rank)).collect();
        v.sort_by_key(|(m, _)| m.preference());
        v
    };
    assert_eq!(ranks(&first), ranks(&second));
}

#[test]
fn test_ranks_ascend_with_score() {
    let mut a = clean_candidate(MethodId::Percentile);
    a.length_penalty = 0.04; // normalized 1.0, weighted 0.25 (default)
    let mut b = clean_candidate(MethodId::Normal);
    b.length_penalty = 0.08;
    let c = clean_candidate(MethodId::Basic);

    let result = select(
        &[a, b, c],
        &ScoringWeights::default(),
        &StatisticSupport::unbounded(),
    )
    .unwrap();

    assert_eq!(result.chosen_method, MethodId::Basic);
    let by_rank = |rank: usize| {
        result
            .candidates
            .iter()
            .find(|c| c.rank == rank)
            .map(|c| c.method)
    };
    assert_eq!(by_rank(1), Some(MethodId::Basic));
    assert_eq!(by_rank(2), Some(MethodId::Percentile));
    assert_eq!(by_rank(3), Some(MethodId::Normal));
}

// =============================================================================
// Engine-driven tournament: mild-skew returns favor BCa
// =============================================================================

#[test]
fn test_mild_skew_tournament_selects_bca() {
    let returns: Vec<_> = [
        0.01, 0.02, -0.01, 0.015, -0.005, 0.025, 0.01, 0.0, -0.01, 0.02, 0.015, 0.005,
    ]
    .iter()
    .map(|&r| dec(r))
    .collect();

    let factory = TradingBootstrapFactory::new(MASTER_SEED);
    let tags = CrnTags::new(0x11, 1, 1, 0);
    let exec = SingleThreadExecutor;
    let weights = ScoringWeights::returns_based();

    let bca_res = factory
        .make_bca(2000, 0.95, IntervalType::TwoSided, IidResampler, tags)
        .unwrap()
        .run(&returns, &MeanStat, &exec)
        .unwrap();
    let pct_res = factory
        .make_percentile(2000, 0.95, IntervalType::TwoSided, IidResampler, tags)
        .unwrap()
        .run(&returns, &MeanStat, &exec)
        .unwrap();
    let nrm_res = factory
        .make_normal(2000, 0.95, IntervalType::TwoSided, IidResampler, tags)
        .unwrap()
        .run(&returns, &MeanStat, &exec)
        .unwrap();

    let candidates = vec![
        summarize_bca(&bca_res, &weights).unwrap(),
        summarize_percentile_like(MethodId::Percentile, &pct_res).unwrap(),
        summarize_percentile_like(MethodId::Normal, &nrm_res).unwrap(),
    ];

    let result = select(&candidates, &weights, &StatisticSupport::unbounded()).unwrap();

    assert!(result.diagnostics.has_bca_candidate);
    assert_eq!(result.chosen_method, MethodId::BCa);
    let chosen = &result.chosen;
    assert!(chosen.lower <= chosen.mean && chosen.mean <= chosen.upper);
    assert!(chosen.z0.abs() < 0.25);
    assert!(chosen.accel.abs() < 0.10);
    assert!(chosen.score.is_finite());
    assert_eq!(result.candidates.len(), 3);
}

#[test]
fn test_summarize_percentile_t_diagnostics() {
    let returns: Vec<_> = (0..50)
        .map(|i| dec(0.0006 + 0.012 * (i as f64 * 0.7).sin()))
        .collect();
    let factory = TradingBootstrapFactory::new(MASTER_SEED);
    let (engine, mut rng) = factory
        .make_percentile_t(
            400,
            100,
            0.95,
            IntervalType::TwoSided,
            IidResampler,
            CrnTags::new(0x33, 2, 1, 0),
        )
        .unwrap();
    let res = engine
        .run(&returns, &MeanStat, &mut rng, &SingleThreadExecutor)
        .unwrap();

    let c = summarize_percentile_t(&res).unwrap();
    assert_eq!(c.method, MethodId::PercentileT);
    assert_eq!(c.b_outer, 400);
    assert_eq!(c.b_inner, 100);
    assert!(c.stability_penalty.is_finite());
    assert!(c.se_boot > 0.0);
    // Asymmetry is expected for the studentized interval; no center penalty.
    assert_eq!(c.center_shift_in_se, 0.0);
    assert_eq!(c.ordering_penalty, 0.0);

    // A healthy percentile-t run is a valid tournament entrant on its own.
    let result = select(
        &[c],
        &ScoringWeights::returns_based(),
        &StatisticSupport::unbounded(),
    )
    .unwrap();
    assert_eq!(result.chosen_method, MethodId::PercentileT);
    assert!(result.bootstrap_median().is_finite());
}

#[test]
fn test_summaries_populate_diagnostics() {
    let returns: Vec<_> = (0..60).map(|i| dec(0.001 * ((i % 7) as f64 - 3.0))).collect();
    let factory = TradingBootstrapFactory::new(MASTER_SEED);
    let tags = CrnTags::new(0x22, 2, 1, 0);

    let res = factory
        .make_percentile(1000, 0.95, IntervalType::TwoSided, IidResampler, tags)
        .unwrap()
        .run(&returns, &MeanStat, &SingleThreadExecutor)
        .unwrap();
    let c = summarize_percentile_like(MethodId::Percentile, &res).unwrap();

    assert_eq!(c.method, MethodId::Percentile);
    assert_eq!(c.b_outer, 1000);
    assert_eq!(c.b_inner, 0);
    assert!(c.se_boot > 0.0);
    assert!(c.normalized_length > 0.5 && c.normalized_length < 2.0);
    // Percentile endpoints are the coverage quantiles themselves; the
    // ordering penalty should be negligible.
    assert!(c.ordering_penalty < 0.01, "ordering={}", c.ordering_penalty);
    assert!(c.score.is_nan(), "score is assigned during select()");
}
