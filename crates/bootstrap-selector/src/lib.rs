pub mod candidate;
pub mod config;
pub mod penalty;
pub mod scoring;
pub mod selector;

#[cfg(test)]
mod tests;

pub use candidate::*;
pub use scoring::{RawComponents, ScoringWeights};
pub use selector::{
    select, summarize_bca, summarize_m_out_of_n, summarize_percentile_like,
    summarize_percentile_t,
};
