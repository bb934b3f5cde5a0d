//! Result model for the selection tournament: candidates, score breakdowns,
//! diagnostics, and the aggregate result.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use ci_core::Decimal;

/// Closed set of bootstrap interval constructions the tournament ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodId {
    Normal,
    Basic,
    Percentile,
    PercentileT,
    MOutOfN,
    BCa,
}

impl MethodId {
    pub fn name(self) -> &'static str {
        match self {
            MethodId::Normal => "Normal",
            MethodId::Basic => "Basic",
            MethodId::Percentile => "Percentile",
            MethodId::PercentileT => "PercentileT",
            MethodId::MOutOfN => "MOutOfN",
            MethodId::BCa => "BCa",
        }
    }

    /// Tie-break preference; lower wins. Second-order accurate methods come
    /// first.
    pub fn preference(self) -> u32 {
        match self {
            MethodId::BCa => 1,
            MethodId::PercentileT => 2,
            MethodId::MOutOfN => 3,
            MethodId::Percentile => 4,
            MethodId::Basic => 5,
            MethodId::Normal => 6,
        }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitmask of rejection reasons accumulated during gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RejectionMask(u32);

impl RejectionMask {
    pub const NONE: RejectionMask = RejectionMask(0);
    /// Score is NaN or infinite.
    pub const SCORE_NON_FINITE: RejectionMask = RejectionMask(1 << 0);
    /// Interval violates the statistic's support.
    pub const VIOLATES_SUPPORT: RejectionMask = RejectionMask(1 << 1);
    /// Effective-B gate failed.
    pub const EFFECTIVE_B_LOW: RejectionMask = RejectionMask(1 << 2);
    /// BCa z0 or acceleration non-finite.
    pub const BCA_PARAMS_NON_FINITE: RejectionMask = RejectionMask(1 << 3);
    /// |z0| exceeds the hard limit.
    pub const BCA_Z0_HARD_FAIL: RejectionMask = RejectionMask(1 << 4);
    /// |accel| exceeds the hard limit.
    pub const BCA_ACCEL_HARD_FAIL: RejectionMask = RejectionMask(1 << 5);
    /// Percentile-t inner failure rate too high (diagnostic).
    pub const PERCENTILE_T_INNER_FAILS: RejectionMask = RejectionMask(1 << 6);
    /// Percentile-t effective-B fraction too low (diagnostic).
    pub const PERCENTILE_T_LOW_EFF_B: RejectionMask = RejectionMask(1 << 7);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, reason: RejectionMask) -> bool {
        self.0 & reason.0 != 0
    }

    pub fn insert(&mut self, reason: RejectionMask) {
        self.0 |= reason.0;
    }

    /// Semicolon-joined reason names; empty when nothing is set.
    pub fn to_text(self) -> String {
        const NAMES: [(RejectionMask, &str); 8] = [
            (RejectionMask::SCORE_NON_FINITE, "SCORE_NON_FINITE"),
            (RejectionMask::VIOLATES_SUPPORT, "VIOLATES_SUPPORT"),
            (RejectionMask::EFFECTIVE_B_LOW, "EFFECTIVE_B_LOW"),
            (RejectionMask::BCA_PARAMS_NON_FINITE, "BCA_PARAMS_NON_FINITE"),
            (RejectionMask::BCA_Z0_HARD_FAIL, "BCA_Z0_EXCEEDED"),
            (RejectionMask::BCA_ACCEL_HARD_FAIL, "BCA_ACCEL_EXCEEDED"),
            (RejectionMask::PERCENTILE_T_INNER_FAILS, "PCTT_INNER_FAILURES"),
            (RejectionMask::PERCENTILE_T_LOW_EFF_B, "PCTT_LOW_EFFECTIVE_B"),
        ];
        let mut parts = Vec::new();
        for (flag, name) in NAMES {
            if self.contains(flag) {
                parts.push(name);
            }
        }
        parts.join(";")
    }
}

impl BitOr for RejectionMask {
    type Output = RejectionMask;
    fn bitor(self, rhs: RejectionMask) -> RejectionMask {
        RejectionMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for RejectionMask {
    fn bitor_assign(&mut self, rhs: RejectionMask) {
        self.0 |= rhs.0;
    }
}

/// One engine's output plus everything the tournament scored it on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub method: MethodId,
    pub mean: Decimal,
    pub lower: Decimal,
    pub upper: Decimal,
    pub cl: f64,
    pub n: usize,
    pub b_outer: usize,
    /// Inner replicate count; zero for everything but Percentile-t.
    pub b_inner: usize,
    pub effective_b: usize,
    pub skipped_total: usize,
    /// Bootstrap SE: SD of the replicate statistics.
    pub se_boot: f64,
    pub skew_boot: f64,
    pub median_boot: f64,
    /// |midpoint − θ̂| / SE; zero for BCa and Percentile-t where asymmetry is
    /// expected.
    pub center_shift_in_se: f64,
    /// Actual interval width over the ideal bootstrap width.
    pub normalized_length: f64,
    pub ordering_penalty: f64,
    pub length_penalty: f64,
    pub stability_penalty: f64,
    /// BCa bias correction; zero elsewhere.
    pub z0: f64,
    /// BCa acceleration; zero elsewhere.
    pub accel: f64,
    /// Percentile-t inner failure rate; zero elsewhere.
    pub inner_failure_rate: f64,
    /// Weighted tournament score; NaN until scored.
    pub score: f64,
    pub candidate_id: u64,
    /// 1-based rank among gate-passing candidates; 0 when ineligible.
    pub rank: usize,
    pub is_chosen: bool,
}

impl Candidate {
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn with_metadata(mut self, candidate_id: u64, rank: usize, is_chosen: bool) -> Self {
        self.candidate_id = candidate_id;
        self.rank = rank;
        self.is_chosen = is_chosen;
        self
    }

    pub fn mark_chosen(mut self) -> Self {
        self.is_chosen = true;
        self
    }
}

/// Per-candidate decomposition of the total score: raw penalties, their
/// normalized forms, and the weighted contributions, plus the gate verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub method: MethodId,
    pub ordering_raw: f64,
    pub length_raw: f64,
    pub stability_raw: f64,
    pub center_sq_raw: f64,
    pub skew_sq_raw: f64,
    pub domain_raw: f64,
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
    pub domain_contrib: f64,
    pub total_score: f64,
    pub rejection_mask: RejectionMask,
    pub rejection_text: String,
    pub passed_gates: bool,
    pub violates_support: bool,
    /// NaN when unbounded below.
    pub support_lower: f64,
    /// NaN; supports constrain lower bounds only.
    pub support_upper: f64,
}

/// Why the winner won and, in particular, why BCa did or did not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionDiagnostics {
    pub chosen_method: MethodId,
    pub chosen_method_name: String,
    pub chosen_score: f64,
    pub chosen_stability_penalty: f64,
    pub chosen_length_penalty: f64,
    pub has_bca_candidate: bool,
    pub bca_chosen: bool,
    pub bca_rejected_for_instability: bool,
    pub bca_rejected_for_length: bool,
    pub bca_rejected_for_domain: bool,
    pub bca_rejected_for_non_finite: bool,
    pub num_candidates: usize,
    pub score_breakdowns: Vec<ScoreBreakdown>,
    /// Relative tolerance actually used for tie detection.
    pub tie_epsilon: f64,
}

/// Aggregate result of the selection tournament.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoCiResult {
    pub chosen_method: MethodId,
    pub chosen: Candidate,
    pub candidates: Vec<Candidate>,
    pub diagnostics: SelectionDiagnostics,
}

impl AutoCiResult {
    pub fn bootstrap_median(&self) -> f64 {
        self.chosen.median_boot
    }
}
