//! tsfeat - Parallel time-series feature extraction and relevance filtering
//!
//! This crate turns collections of univariate time series into a wide table
//! of statistical features and filters that table down to the features that
//! are relevant to a supervised target, with false-discovery-rate control
//! over the simultaneous hypothesis tests.
//!
//! # Modules
//!
//! ## Core pipeline
//! - [`series`] - Series records and long-format ingestion
//! - [`calculators`] - Feature calculators, parameter grids, and the registry
//! - [`extraction`] - Parallel extraction scheduler and the feature table
//! - [`impute`] - Imputation of non-finite feature cells
//! - [`relevance`] - Hypothesis tests, FDR correction, and selection
//! - [`pipeline`] - One-call extract, impute, test, and select
//!
//! ## Support
//! - [`error`] - Error types
//! - [`utils`] - Worker pool configuration
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use tsfeat::pipeline::{filter_features, CalculatorSelection, FilterConfig};
//! use tsfeat::series::SeriesRecord;
//!
//! # fn main() -> tsfeat::Result<()> {
//! let series: Vec<SeriesRecord> = (0..30)
//!     .map(|i| {
//!         let values = (0..50).map(|t| ((t + i) as f64 * 0.3).sin()).collect();
//!         SeriesRecord::new(format!("s{}", i), values)
//!     })
//!     .collect();
//! let targets: HashMap<String, f64> =
//!     (0..30).map(|i| (format!("s{}", i), (i % 2) as f64)).collect();
//!
//! let config = FilterConfig::classification()
//!     .with_calculators(CalculatorSelection::Minimal);
//! let outcome = filter_features(&series, &targets, &config)?;
//! for key in &outcome.selected_keys {
//!     println!("{}", key);
//! }
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Core pipeline
pub mod series;
pub mod calculators;
pub mod extraction;
pub mod impute;
pub mod relevance;
pub mod pipeline;

// Support
pub mod utils;

pub use error::{Result, TsfeatError};

/// Commonly used types for quick imports
pub mod prelude {
    pub use crate::calculators::{
        Calculator, CalculatorKind, FeatureKey, FeatureRegistry, ParamBinding, ParamValue,
    };
    pub use crate::error::{Result, TsfeatError};
    pub use crate::extraction::{
        extract, extract_cancellable, CancellationToken, ExtractionConfig, ExtractionReport,
        FeatureTable,
    };
    pub use crate::impute::{ConstantImputer, Imputer, MinMaxMedianImputer};
    pub use crate::pipeline::{filter_features, CalculatorSelection, FilterConfig, FilterOutcome};
    pub use crate::relevance::{
        select_features, test_relevance, DependencyAssumption, MlTask, RelevanceConfig,
        RelevanceRecord, Target,
    };
    pub use crate::series::SeriesRecord;
}
