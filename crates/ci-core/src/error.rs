use thiserror::Error;

/// Hard failure taxonomy for the bootstrap core.
///
/// Soft rejections (gate failures during the selection tournament) never
/// surface here; they flow through `RejectionMask` flags on the score
/// breakdowns. Degenerate bootstrap distributions and non-finite replicate
/// statistics are handled in-engine and are not errors.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Logic error: {0}")]
    Logic(String),

    #[error("No valid candidate: {0}")]
    NoValidCandidate(String),
}
