//! End-to-end filtering pipeline
//!
//! Chains extraction, imputation, relevance testing, and selection into one
//! call. Each stage keeps its own configuration; the pipeline only aligns
//! their inputs and forwards their outputs.

use std::collections::HashMap;
use tracing::info;

use crate::calculators::{FeatureKey, FeatureRegistry, ParamBinding};
use crate::error::{Result, TsfeatError};
use crate::extraction::{extract, ExtractionConfig, ExtractionReport};
use crate::impute::{Imputer, MinMaxMedianImputer};
use crate::relevance::{select_features, RelevanceConfig, RelevanceRecord, Target};
use crate::series::SeriesRecord;

/// Which calculators the pipeline extracts
#[derive(Debug, Clone, Default)]
pub enum CalculatorSelection {
    /// The full built-in catalog
    #[default]
    Comprehensive,
    /// The cheap order and moment statistics only
    Minimal,
    /// An explicit list of calculator names
    Subset(Vec<String>),
}

/// Configuration for one extract-and-filter run
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub calculators: CalculatorSelection,
    /// Replacement parameter grids, keyed by calculator name
    pub parameter_overrides: HashMap<String, Vec<ParamBinding>>,
    pub extraction: ExtractionConfig,
    pub relevance: RelevanceConfig,
}

impl FilterConfig {
    pub fn classification() -> Self {
        Self {
            calculators: CalculatorSelection::default(),
            parameter_overrides: HashMap::new(),
            extraction: ExtractionConfig::default(),
            relevance: RelevanceConfig::classification(),
        }
    }

    pub fn regression() -> Self {
        Self {
            relevance: RelevanceConfig::regression(),
            ..Self::classification()
        }
    }

    pub fn with_calculators(mut self, selection: CalculatorSelection) -> Self {
        self.calculators = selection;
        self
    }

    pub fn with_parameter_overrides(
        mut self,
        overrides: HashMap<String, Vec<ParamBinding>>,
    ) -> Self {
        self.parameter_overrides = overrides;
        self
    }

    pub fn with_extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.extraction = extraction;
        self
    }

    pub fn with_relevance(mut self, relevance: RelevanceConfig) -> Self {
        self.relevance = relevance;
        self
    }

    fn build_registry(&self) -> Result<FeatureRegistry> {
        let base = match &self.calculators {
            CalculatorSelection::Comprehensive => FeatureRegistry::comprehensive()?,
            CalculatorSelection::Minimal => FeatureRegistry::minimal()?,
            CalculatorSelection::Subset(names) => FeatureRegistry::global().subset(names)?,
        };
        if self.parameter_overrides.is_empty() {
            Ok(base)
        } else {
            base.with_overrides(&self.parameter_overrides)
        }
    }
}

/// Everything one filtering run produced
#[derive(Debug)]
pub struct FilterOutcome {
    /// Extraction report, including the full unfiltered table and failures
    pub extraction: ExtractionReport,
    /// One relevance record per extracted feature column
    pub records: Vec<RelevanceRecord>,
    /// Selected feature keys in canonical column order
    pub selected_keys: Vec<FeatureKey>,
    /// Imputed table projected onto the selected columns
    pub selected_table: crate::extraction::FeatureTable,
}

/// Extract features for every series, filter them against the target
///
/// `targets` maps series id to target value; every series must have one.
/// Imputation uses [`MinMaxMedianImputer`]; use [`filter_features_with`] to
/// substitute a different strategy.
pub fn filter_features(
    series: &[SeriesRecord],
    targets: &HashMap<String, f64>,
    config: &FilterConfig,
) -> Result<FilterOutcome> {
    filter_features_with(series, targets, config, &MinMaxMedianImputer)
}

/// [`filter_features`] with a caller-supplied imputation strategy
pub fn filter_features_with(
    series: &[SeriesRecord],
    targets: &HashMap<String, f64>,
    config: &FilterConfig,
    imputer: &dyn Imputer,
) -> Result<FilterOutcome> {
    let registry = config.build_registry()?;
    let report = extract(series, &registry, &config.extraction)?;

    let imputed = imputer.impute(&report.table)?;

    // target values aligned to the table's row order
    let mut labels = Vec::with_capacity(imputed.nrows());
    for id in imputed.row_ids() {
        let value = targets.get(id).ok_or_else(|| {
            TsfeatError::ConfigError(format!("no target value for series '{}'", id))
        })?;
        labels.push(*value);
    }
    let target = Target::from_labels(labels, config.relevance.ml_task)?;

    let outcome = select_features(&imputed, &target, &config.relevance)?;

    info!(
        series = series.len(),
        extracted = report.table.ncols(),
        selected = outcome.selected_keys.len(),
        "feature filtering pipeline complete"
    );

    Ok(FilterOutcome {
        extraction: report,
        records: outcome.records,
        selected_keys: outcome.selected_keys,
        selected_table: outcome.selected_table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relevance::DiagnosticFlag;

    /// Two classes of 15 series each; class 1 has a higher level
    fn labeled_series() -> (Vec<SeriesRecord>, HashMap<String, f64>) {
        let mut series = Vec::new();
        let mut targets = HashMap::new();
        for i in 0..30 {
            let class = (i % 2) as f64;
            let id = format!("s{}", i);
            let values: Vec<f64> = (0..40)
                .map(|t| class * 5.0 + ((t + i) as f64 * 0.41).sin())
                .collect();
            series.push(SeriesRecord::new(id.clone(), values));
            targets.insert(id, class);
        }
        (series, targets)
    }

    #[test]
    fn test_pipeline_selects_level_features() {
        let (series, targets) = labeled_series();
        let config = FilterConfig::classification()
            .with_calculators(CalculatorSelection::Minimal);

        let outcome = filter_features(&series, &targets, &config).unwrap();
        assert_eq!(outcome.extraction.table.nrows(), 30);
        assert!(!outcome.selected_keys.is_empty());

        // level statistics separate the classes; length is constant
        let mean_key = FeatureKey::new("mean", &ParamBinding::empty());
        assert!(outcome.selected_keys.contains(&mean_key));
        let length = outcome
            .records
            .iter()
            .find(|r| r.key.as_str() == "length")
            .unwrap();
        assert_eq!(length.flag, Some(DiagnosticFlag::ZeroVariance));
        assert!(!length.selected);
    }

    #[test]
    fn test_missing_target_is_config_error() {
        let (series, mut targets) = labeled_series();
        targets.remove("s7");
        let config = FilterConfig::classification()
            .with_calculators(CalculatorSelection::Minimal);

        let err = filter_features(&series, &targets, &config).unwrap_err();
        assert!(matches!(err, TsfeatError::ConfigError(_)));
        assert!(err.to_string().contains("s7"));
    }

    #[test]
    fn test_unknown_subset_name_fails_before_extraction() {
        let (series, targets) = labeled_series();
        let config = FilterConfig::classification()
            .with_calculators(CalculatorSelection::Subset(vec!["no_such".to_string()]));
        assert!(filter_features(&series, &targets, &config).is_err());
    }
}
