pub mod bca;
pub mod executor;
pub mod factory;
pub mod m_out_of_n;
pub mod percentile_t;
pub mod resample;
pub mod result;
pub mod rng;
pub mod simple;


pub use bca::BCaBootstrap;
pub use executor::{Executor, RayonExecutor, SingleThreadExecutor};
pub use factory::{CrnTags, TradingBootstrapFactory};
pub use m_out_of_n::MOutOfNBootstrap;
pub use percentile_t::PercentileTBootstrap;
pub use resample::{IidResampler, Resampler, StationaryBlockResampler};
pub use result::*;
pub use rng::{CrnKey, CrnProvider, ReplicateRng};
pub use simple::{SimpleBootstrap, SimpleMethod};
