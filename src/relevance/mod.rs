//! Relevance testing and feature selection
//!
//! Scores every feature column against the target with an appropriate
//! hypothesis test, then controls the false discovery rate across all
//! simultaneous tests. Each feature's test is independent of the others, so
//! the per-column work runs on the same parallel contract as extraction.

pub mod correction;
pub mod hypothesis;

pub use correction::{benjamini_hochberg, benjamini_yekutieli, select, DependencyAssumption};

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::calculators::FeatureKey;
use crate::error::{Result, TsfeatError};
use crate::extraction::FeatureTable;
use crate::impute::assert_finite;
use crate::utils::{parallel_map_with_config, ParallelConfig};

/// Learning task the target labels come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MlTask {
    Classification,
    Regression,
}

/// Inferred structure of the target vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    Binary,
    Multiclass,
    Continuous,
}

/// Target vector aligned with the feature table rows
#[derive(Debug, Clone)]
pub struct Target {
    values: Vec<f64>,
    kind: TargetKind,
    /// Distinct class labels, sorted; empty for continuous targets
    classes: Vec<f64>,
}

impl Target {
    /// Build a target from raw labels
    ///
    /// Classification targets are binned into their distinct labels; a
    /// constant target carries no signal to test against and is rejected.
    pub fn from_labels(values: Vec<f64>, ml_task: MlTask) -> Result<Self> {
        if values.is_empty() {
            return Err(TsfeatError::ConfigError("empty target vector".to_string()));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(TsfeatError::ConfigError(format!(
                "non-finite target value at index {}",
                pos
            )));
        }

        let mut classes = values.clone();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        classes.dedup();

        if classes.len() < 2 {
            return Err(TsfeatError::ConfigError(
                "target is constant, nothing to test against".to_string(),
            ));
        }

        let (kind, classes) = match ml_task {
            MlTask::Classification => {
                if classes.len() == 2 {
                    (TargetKind::Binary, classes)
                } else {
                    (TargetKind::Multiclass, classes)
                }
            }
            MlTask::Regression => (TargetKind::Continuous, Vec::new()),
        };

        Ok(Self {
            values,
            kind,
            classes,
        })
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Smallest class population; usize::MAX for continuous targets
    fn min_class_size(&self) -> usize {
        if self.classes.is_empty() {
            return usize::MAX;
        }
        self.classes
            .iter()
            .map(|&c| self.values.iter().filter(|&&v| v == c).count())
            .min()
            .unwrap_or(0)
    }
}

/// How multiclass targets are tested per feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MulticlassStrategy {
    /// One k-sample rank test per feature
    KruskalWallis,
    /// Pairwise two-sample tests, Simes-combined within the feature
    PairwiseCombined,
}

/// Configuration for one relevance-testing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceConfig {
    pub ml_task: MlTask,
    /// FDR level the selection controls
    pub significance_level: f64,
    /// Features from the same series are dependent, so arbitrary is the default
    pub dependency: DependencyAssumption,
    /// Below this many rows every feature is flagged instead of tested
    pub min_samples: usize,
    /// Below this per-class population every feature is flagged instead of tested
    pub min_class_size: usize,
    pub multiclass: MulticlassStrategy,
    pub parallel: ParallelConfig,
}

impl RelevanceConfig {
    pub fn classification() -> Self {
        Self {
            ml_task: MlTask::Classification,
            significance_level: 0.05,
            dependency: DependencyAssumption::Arbitrary,
            min_samples: 20,
            min_class_size: 5,
            multiclass: MulticlassStrategy::KruskalWallis,
            parallel: ParallelConfig::default(),
        }
    }

    pub fn regression() -> Self {
        Self {
            ml_task: MlTask::Regression,
            ..Self::classification()
        }
    }

    pub fn with_significance_level(mut self, alpha: f64) -> Self {
        self.significance_level = alpha;
        self
    }

    pub fn with_dependency(mut self, dependency: DependencyAssumption) -> Self {
        self.dependency = dependency;
        self
    }

    pub fn with_min_samples(mut self, min_samples: usize, min_class_size: usize) -> Self {
        self.min_samples = min_samples;
        self.min_class_size = min_class_size;
        self
    }

    pub fn with_multiclass(mut self, strategy: MulticlassStrategy) -> Self {
        self.multiclass = strategy;
        self
    }

    pub fn with_workers(mut self, n: usize) -> Self {
        self.parallel = self.parallel.with_workers(n);
        self
    }
}

/// Hypothesis test applied to one feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestKind {
    MannWhitneyU,
    KendallTau,
    KruskalWallis,
    PairwiseMannWhitney,
    /// No test ran; see the diagnostic flag
    Skipped,
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestKind::MannWhitneyU => "mann_whitney_u",
            TestKind::KendallTau => "kendall_tau",
            TestKind::KruskalWallis => "kruskal_wallis",
            TestKind::PairwiseMannWhitney => "pairwise_mann_whitney",
            TestKind::Skipped => "skipped",
        };
        write!(f, "{}", name)
    }
}

/// Why a feature fell back to p = 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticFlag {
    /// Constant after imputation
    ZeroVariance,
    /// Too few rows or too small a class for a stable statistic
    InsufficientSamples,
    /// The selected test could not be computed
    TestFailure,
}

/// Scoring result for one feature column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceRecord {
    pub key: FeatureKey,
    pub p_value: f64,
    pub test: TestKind,
    pub selected: bool,
    pub flag: Option<DiagnosticFlag>,
}

/// Full outcome of a filtering run
#[derive(Debug)]
pub struct RelevanceOutcome {
    /// One record per feature column, in canonical column order
    pub records: Vec<RelevanceRecord>,
    /// Selected keys, in canonical column order
    pub selected_keys: Vec<FeatureKey>,
    /// Projection of the input table onto the selected columns
    pub selected_table: FeatureTable,
}

/// Score every feature column against the target
///
/// Requires a fully imputed table; non-finite cells indicate a skipped
/// imputation step and are a fatal precondition violation. Always returns
/// exactly one record per column with p in [0, 1]; `selected` is false
/// until a corrector runs.
pub fn test_relevance(
    table: &FeatureTable,
    target: &Target,
    config: &RelevanceConfig,
) -> Result<Vec<RelevanceRecord>> {
    if target.len() != table.nrows() {
        return Err(TsfeatError::ShapeError {
            expected: format!("target of length {}", table.nrows()),
            actual: format!("length {}", target.len()),
        });
    }
    assert_finite(table)?;

    let undersampled = table.nrows() < config.min_samples
        || target.min_class_size() < config.min_class_size;

    let columns: Vec<usize> = (0..table.ncols()).collect();
    let scored = parallel_map_with_config(columns, &config.parallel, |c| {
        let feature: Vec<f64> = table.column(c).iter().copied().collect();
        score_column(&feature, target, config, undersampled)
    })?;

    let records = table
        .column_keys()
        .iter()
        .zip(scored)
        .map(|(key, (p_value, test, flag))| {
            if let Some(flag) = flag {
                debug!(feature = %key, ?flag, "feature fell back to p = 1");
            }
            RelevanceRecord {
                key: key.clone(),
                p_value,
                test,
                selected: false,
                flag,
            }
        })
        .collect();

    Ok(records)
}

fn score_column(
    feature: &[f64],
    target: &Target,
    config: &RelevanceConfig,
    undersampled: bool,
) -> (f64, TestKind, Option<DiagnosticFlag>) {
    let lo = feature.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = feature.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        return (1.0, TestKind::Skipped, Some(DiagnosticFlag::ZeroVariance));
    }
    if undersampled {
        return (
            1.0,
            TestKind::Skipped,
            Some(DiagnosticFlag::InsufficientSamples),
        );
    }

    let outcome = match target.kind() {
        TargetKind::Binary => {
            let (x, y) = split_binary(feature, target);
            (
                hypothesis::mann_whitney_u(&x, &y),
                TestKind::MannWhitneyU,
            )
        }
        TargetKind::Continuous => (
            hypothesis::kendall_tau_b(feature, target.values()).map(|(_, p)| p),
            TestKind::KendallTau,
        ),
        TargetKind::Multiclass => match config.multiclass {
            MulticlassStrategy::KruskalWallis => (
                hypothesis::kruskal_wallis(&split_classes(feature, target)),
                TestKind::KruskalWallis,
            ),
            MulticlassStrategy::PairwiseCombined => (
                pairwise_combined(feature, target),
                TestKind::PairwiseMannWhitney,
            ),
        },
    };

    match outcome {
        (Ok(p), test) => (p.clamp(0.0, 1.0), test, None),
        (Err(_), test) => (1.0, test, Some(DiagnosticFlag::TestFailure)),
    }
}

fn split_binary(feature: &[f64], target: &Target) -> (Vec<f64>, Vec<f64>) {
    let c0 = target.classes()[0];
    let mut x = Vec::new();
    let mut y = Vec::new();
    for (&f, &t) in feature.iter().zip(target.values()) {
        if t == c0 {
            x.push(f);
        } else {
            y.push(f);
        }
    }
    (x, y)
}

fn split_classes(feature: &[f64], target: &Target) -> Vec<Vec<f64>> {
    target
        .classes()
        .iter()
        .map(|&c| {
            feature
                .iter()
                .zip(target.values())
                .filter(|(_, &t)| t == c)
                .map(|(&f, _)| f)
                .collect()
        })
        .collect()
}

/// All pairwise two-sample tests, combined by Simes within the feature so
/// exactly one p-value is emitted
fn pairwise_combined(feature: &[f64], target: &Target) -> Result<f64> {
    let groups = split_classes(feature, target);
    let mut pvalues = Vec::new();
    for i in 0..groups.len() {
        for j in i + 1..groups.len() {
            pvalues.push(hypothesis::mann_whitney_u(&groups[i], &groups[j])?);
        }
    }
    hypothesis::simes_combine(&pvalues)
}

/// Score, correct, and select: the full filtering stage
pub fn select_features(
    table: &FeatureTable,
    target: &Target,
    config: &RelevanceConfig,
) -> Result<RelevanceOutcome> {
    let mut records = test_relevance(table, target, config)?;

    let pvalues: Vec<f64> = records.iter().map(|r| r.p_value).collect();
    let selected_idx = correction::select(
        &pvalues,
        config.significance_level,
        config.dependency,
    )?;
    for &idx in &selected_idx {
        records[idx].selected = true;
    }

    let selected_keys: Vec<FeatureKey> = selected_idx
        .iter()
        .map(|&idx| records[idx].key.clone())
        .collect();
    let selected_table = table.select_columns(&selected_keys)?;

    info!(
        tested = records.len(),
        selected = selected_keys.len(),
        significance_level = config.significance_level,
        "relevance filtering complete"
    );

    Ok(RelevanceOutcome {
        records,
        selected_keys,
        selected_table,
    })
}
