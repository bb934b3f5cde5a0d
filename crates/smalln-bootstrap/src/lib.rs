pub mod conservative;
pub mod heuristics;
pub mod runs_test;

pub use conservative::*;
pub use heuristics::*;
pub use runs_test::*;
