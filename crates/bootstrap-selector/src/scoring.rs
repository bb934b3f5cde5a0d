//! Scoring weights, normalization, gating, and the tournament itself.

use serde::{Deserialize, Serialize};

use ci_core::StatisticSupport;

use crate::candidate::{Candidate, MethodId};
use crate::config;
use crate::penalty;

/// Weight profile for the tournament score.
///
/// The ordering weight is fixed at 1.0; the profiles below shift emphasis
/// among the remaining components per statistic class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub center_shift: f64,
    pub skew: f64,
    pub length: f64,
    pub stability: f64,
    /// Force a lower-bound support at 0 + ε when none is configured.
    pub enforce_positive: bool,
    pub bca_z0_scale: f64,
    pub bca_accel_scale: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            center_shift: 1.0,
            skew: 0.5,
            length: 0.25,
            stability: 1.0,
            enforce_positive: false,
            bca_z0_scale: config::BCA_Z0_PENALTY_SCALE,
            bca_accel_scale: config::BCA_ACCEL_PENALTY_SCALE,
        }
    }
}

impl ScoringWeights {
    /// Profile for returns-based statistics (mean, geometric mean).
    pub fn returns_based() -> Self {
        Self {
            center_shift: 0.5,
            skew: 0.5,
            length: 1.0,
            stability: 1.0,
            ..Self::default()
        }
    }

    /// Profile for ratio statistics (profit factor, Sharpe): these are prone
    /// to division instabilities, so stability dominates and center shift is
    /// de-emphasized.
    pub fn ratio_statistic() -> Self {
        Self {
            center_shift: 0.25,
            skew: 0.5,
            length: 0.75,
            stability: 1.5,
            ..Self::default()
        }
    }

    pub fn with_enforce_positive(mut self, enforce: bool) -> Self {
        self.enforce_positive = enforce;
        self
    }
}

/// Raw (unweighted, unnormalized) penalty components for one candidate.
#[derive(Debug, Clone, Copy)]
pub struct RawComponents {
    pub ordering_penalty: f64,
    pub length_penalty: f64,
    pub stability_penalty: f64,
    pub center_shift_sq: f64,
    pub skew_sq: f64,
    pub domain_penalty: f64,
}

impl RawComponents {
    /// Raw penalties for a single candidate. Cosmetic metrics (center shift,
    /// skew) are robustified: non-finite values read as zero so they cannot
    /// poison the score on their own.
    pub fn for_candidate(c: &Candidate, support: &StatisticSupport) -> Self {
        let center_shift = if c.center_shift_in_se.is_finite() {
            c.center_shift_in_se
        } else {
            0.0
        };
        let skew = if c.skew_boot.is_finite() { c.skew_boot } else { 0.0 };

        Self {
            ordering_penalty: c.ordering_penalty,
            length_penalty: c.length_penalty,
            stability_penalty: c.stability_penalty,
            center_shift_sq: center_shift * center_shift,
            skew_sq: penalty::compute_skew_penalty(skew),
            domain_penalty: penalty::compute_domain_penalty(ci_core::to_f64(c.lower), support),
        }
    }

    pub fn for_candidates(candidates: &[Candidate], support: &StatisticSupport) -> Vec<Self> {
        candidates
            .iter()
            .map(|c| Self::for_candidate(c, support))
            .collect()
    }
}

/// Normalized penalties and their weighted contributions.
#[derive(Debug, Clone, Copy)]
pub struct NormalizedScores {
    pub ordering_norm: f64,
    pub length_norm: f64,
    pub stability_norm: f64,
    pub center_sq_norm: f64,
    pub skew_sq_norm: f64,
    pub ordering_contrib: f64,
    pub length_contrib: f64,
    pub stability_contrib: f64,
    pub center_sq_contrib: f64,
    pub skew_sq_contrib: f64,
}

/// Divides raw penalties by fixed references and applies the weight profile.
#[derive(Debug, Clone, Copy)]
pub struct ScoreNormalizer {
    weights: ScoringWeights,
}

impl ScoreNormalizer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn normalize(&self, raw: &RawComponents) -> NormalizedScores {
        let non_neg = |x: f64| if x < 0.0 { 0.0 } else { x };

        let ordering_norm = non_neg(raw.ordering_penalty / config::REF_ORDERING_ERROR_SQ);
        let length_norm = non_neg(raw.length_penalty / config::REF_LENGTH_ERROR_SQ);
        let stability_norm = non_neg(raw.stability_penalty / config::REF_STABILITY);
        let center_sq_norm = non_neg(raw.center_shift_sq / config::REF_CENTER_SHIFT_SQ);
        let skew_sq_norm = non_neg(raw.skew_sq / config::REF_SKEW_SQ);

        let w_order = 1.0;

        NormalizedScores {
            ordering_norm,
            length_norm,
            stability_norm,
            center_sq_norm,
            skew_sq_norm,
            ordering_contrib: w_order * ordering_norm,
            length_contrib: self.weights.length * length_norm,
            stability_contrib: self.weights.stability * stability_norm,
            center_sq_contrib: self.weights.center_shift * center_sq_norm,
            skew_sq_contrib: self.weights.skew * skew_sq_norm,
        }
    }

    /// Total score: weighted contributions, the domain penalty, and the
    /// BCa-only length overflow.
    pub fn total_score(
        &self,
        norm: &NormalizedScores,
        raw: &RawComponents,
        method: MethodId,
        length_penalty: f64,
    ) -> f64 {
        let mut total = norm.ordering_contrib
            + norm.length_contrib
            + norm.stability_contrib
            + norm.center_sq_contrib
            + norm.skew_sq_contrib
            + raw.domain_penalty;

        if method == MethodId::BCa {
            total += penalty::compute_bca_length_overflow(length_penalty);
        }

        total
    }
}

/// Hard validation gates applied before a candidate may win.
pub struct CandidateGateKeeper;

impl CandidateGateKeeper {
    /// Effective-B gate: `effective_B >= max(200, ceil(frac · B_outer))`,
    /// with the fraction relaxed to 0.70 for Percentile-t (its outer
    /// replicates are expected to fail more often).
    pub fn passes_effective_b_gate(candidate: &Candidate) -> bool {
        let requested = candidate.b_outer;
        if requested < 2 {
            return false;
        }

        let min_frac = match candidate.method {
            MethodId::PercentileT => config::PERCENTILE_T_MIN_EFFECTIVE_FRACTION,
            _ => config::DEFAULT_MIN_EFFECTIVE_FRACTION,
        };
        let required_by_frac = (min_frac * requested as f64).ceil() as usize;
        let required = config::MIN_EFFECTIVE_ABSOLUTE.max(required_by_frac);

        candidate.effective_b >= required
    }

    /// Gates common to every method: finite score, no domain violation,
    /// sufficient effective B.
    pub fn is_common_candidate_valid(candidate: &Candidate, raw: &RawComponents) -> bool {
        if !candidate.score.is_finite() {
            return false;
        }
        if raw.domain_penalty > 0.0 {
            return false;
        }
        Self::passes_effective_b_gate(candidate)
    }

    /// BCa adds parameter gates on top of the common ones.
    pub fn is_bca_candidate_valid(candidate: &Candidate, raw: &RawComponents) -> bool {
        if !Self::is_common_candidate_valid(candidate, raw) {
            return false;
        }
        if !candidate.z0.is_finite() || !candidate.accel.is_finite() {
            return false;
        }
        if candidate.z0.abs() > config::BCA_Z0_HARD_LIMIT {
            return false;
        }
        if candidate.accel.abs() > config::BCA_ACCEL_HARD_LIMIT {
            return false;
        }
        true
    }

    pub fn is_valid(candidate: &Candidate, raw: &RawComponents) -> bool {
        if candidate.method == MethodId::BCa {
            Self::is_bca_candidate_valid(candidate, raw)
        } else {
            Self::is_common_candidate_valid(candidate, raw)
        }
    }
}

/// Lowest-score selection with relative-epsilon ties broken by method
/// preference.
pub struct TournamentSelector<'a> {
    candidates: &'a [Candidate],
    best_score: f64,
    winner_idx: Option<usize>,
    tie_epsilon_used: f64,
}

impl<'a> TournamentSelector<'a> {
    pub fn new(candidates: &'a [Candidate]) -> Self {
        Self {
            candidates,
            best_score: f64::INFINITY,
            winner_idx: None,
            tie_epsilon_used: 0.0,
        }
    }

    fn relative_epsilon(a: f64, b: f64) -> f64 {
        config::RELATIVE_TIE_EPSILON_SCALE * (1.0 + a.abs().max(b.abs()))
    }

    pub fn consider(&mut self, index: usize) {
        let candidate = &self.candidates[index];
        let score = candidate.score;

        let winner_idx = match self.winner_idx {
            Some(i) => i,
            None => {
                self.best_score = score;
                self.winner_idx = Some(index);
                self.tie_epsilon_used = Self::relative_epsilon(score, score);
                return;
            }
        };

        let eps = Self::relative_epsilon(score, self.best_score);
        self.tie_epsilon_used = eps;

        if score < self.best_score - eps {
            self.best_score = score;
            self.winner_idx = Some(index);
        } else if (score - self.best_score).abs() <= eps {
            let current = &self.candidates[winner_idx];
            if candidate.method.preference() < current.method.preference() {
                self.best_score = score;
                self.winner_idx = Some(index);
            }
        }
    }

    pub fn winner_index(&self) -> Option<usize> {
        self.winner_idx
    }

    pub fn tie_epsilon(&self) -> f64 {
        self.tie_epsilon_used
    }
}
