use serde::{Deserialize, Serialize};

/// Far-tail divisor for the unbounded side of one-sided intervals.
const EXTREME_TAIL_RATIO: f64 = 1000.0;

/// Shape of the requested confidence interval.
///
/// One-sided intervals keep the far tail at an extreme but finite quantile
/// (α / 1000) so the reported bound stays reachable instead of collapsing to
/// infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IntervalType {
    #[default]
    TwoSided,
    OneSidedLower,
    OneSidedUpper,
}

impl IntervalType {
    /// Per-tail α for this interval shape: `(1 − CL)/2` two-sided, `1 − CL`
    /// one-sided.
    pub fn alpha(self, confidence_level: f64) -> f64 {
        let tail = 1.0 - confidence_level;
        match self {
            IntervalType::TwoSided => 0.5 * tail,
            IntervalType::OneSidedLower | IntervalType::OneSidedUpper => tail,
        }
    }

    /// Probability attached to the extreme (effectively unbounded) tail.
    pub fn extreme_quantile(alpha: f64, is_upper: bool) -> f64 {
        let extreme = alpha / EXTREME_TAIL_RATIO;
        if is_upper {
            1.0 - extreme
        } else {
            extreme
        }
    }

    /// Lower and upper tail probabilities for quantile-style endpoints.
    pub fn tail_probabilities(self, confidence_level: f64) -> (f64, f64) {
        let alpha = self.alpha(confidence_level);
        match self {
            IntervalType::TwoSided => (alpha, 1.0 - alpha),
            IntervalType::OneSidedLower => (alpha, Self::extreme_quantile(alpha, true)),
            IntervalType::OneSidedUpper => (Self::extreme_quantile(alpha, false), 1.0 - alpha),
        }
    }
}
