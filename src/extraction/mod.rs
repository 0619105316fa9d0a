//! Extraction scheduler and feature table
//!
//! The scheduler expands (series x calculator x parameter binding) into a
//! task set, runs it on a worker pool, and merges the returned cell triples
//! into a wide [`FeatureTable`]. Workers never touch shared state; merging
//! happens on the calling thread, which is what makes the output independent
//! of task execution order.

mod scheduler;
mod table;

pub use scheduler::{extract, extract_cancellable};
pub use table::{FeatureTable, FeatureTableBuilder};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::utils::ParallelConfig;

/// Configuration for one extraction run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Worker pool sizing
    pub parallel: ParallelConfig,
    /// Fraction of failed tasks above which the run is reported as degraded
    pub fail_on_error_rate: f64,
    /// Optional restriction of calculators per series kind
    ///
    /// When set, a series with a kind label runs only the calculators listed
    /// for that kind (an unlisted kind runs none); series without a kind
    /// label always run the full registry.
    pub kind_filter: Option<HashMap<String, Vec<String>>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            parallel: ParallelConfig::default(),
            fail_on_error_rate: 0.1,
            kind_filter: None,
        }
    }
}

impl ExtractionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, n: usize) -> Self {
        self.parallel = self.parallel.with_workers(n);
        self
    }

    pub fn with_fail_on_error_rate(mut self, rate: f64) -> Self {
        self.fail_on_error_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_kind_filter(mut self, filter: HashMap<String, Vec<String>>) -> Self {
        self.kind_filter = Some(filter);
        self
    }
}

/// Cooperative cancellation signal
///
/// Cancelling skips tasks that have not started; in-flight tasks run to
/// completion. Skipped cells stay NaN sentinels in the table.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// One recovered per-cell calculator failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellFailure {
    pub series_id: String,
    pub calculator: String,
    pub parameters: String,
    pub reason: String,
}

/// Non-fatal aggregate warning: too many tasks failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionDegraded {
    /// Fraction of executed tasks that failed
    pub error_rate: f64,
    /// Configured threshold that was exceeded
    pub threshold: f64,
    /// Failure counts per calculator, ordered by name
    pub failing_calculators: Vec<(String, usize)>,
}

/// Result of one extraction run
#[derive(Debug)]
pub struct ExtractionReport {
    pub table: FeatureTable,
    /// Every recovered per-cell failure, in deterministic task order
    pub failures: Vec<CellFailure>,
    /// Present when the failure rate exceeded the configured threshold
    pub degraded: Option<ExtractionDegraded>,
    pub tasks_total: usize,
    pub tasks_cancelled: usize,
}

impl ExtractionReport {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}
