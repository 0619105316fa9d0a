//! Parallel processing utilities
//!
//! The extraction scheduler and the relevance tester share the same task
//! contract: side-effect-free closures whose results are returned, never
//! written into shared state. Workers are rayon threads sized by
//! [`ParallelConfig`].

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TsfeatError};

/// Configuration for parallel processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of worker threads (None = use all available)
    pub workers: Option<usize>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self { workers: None }
    }
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set worker count
    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = Some(n);
        self
    }

    /// Get the number of workers to use
    pub fn num_workers(&self) -> usize {
        self.workers.unwrap_or_else(rayon::current_num_threads).max(1)
    }
}

/// Parallel map on a dedicated pool sized by `config`
///
/// Results come back in input order regardless of execution order, which is
/// what makes downstream merges deterministic.
pub fn parallel_map_with_config<T, U, F>(items: Vec<T>, config: &ParallelConfig, f: F) -> Result<Vec<U>>
where
    T: Send,
    U: Send,
    F: Fn(T) -> U + Send + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_workers())
        .build()
        .map_err(|e| TsfeatError::ThreadPoolError(e.to_string()))?;

    Ok(pool.install(|| items.into_par_iter().map(f).collect()))
}
