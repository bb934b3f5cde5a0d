//! Pluggable replicate-loop executors.
//!
//! Engines express their replicate loops as a map over indices `0..n`;
//! results come back in index order regardless of execution order, which
//! keeps parallel runs deterministic under CRN (each index derives its own
//! engine, so nothing depends on scheduling).

use rayon::prelude::*;

pub trait Executor: Send + Sync {
    /// Evaluate `f` for every index in `0..n`, returning results in index
    /// order.
    fn parallel_for_chunked<R, F>(&self, n: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize) -> R + Send + Sync;
}

/// Runs the loop on the caller's thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleThreadExecutor;

impl Executor for SingleThreadExecutor {
    fn parallel_for_chunked<R, F>(&self, n: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize) -> R + Send + Sync,
    {
        (0..n).map(f).collect()
    }
}

/// Fans the loop out over the rayon thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct RayonExecutor;

impl Executor for RayonExecutor {
    fn parallel_for_chunked<R, F>(&self, n: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize) -> R + Send + Sync,
    {
        (0..n).into_par_iter().map(f).collect()
    }
}
