//! Task expansion and parallel execution

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::calculators::{
    execute, expand_output, Calculator, CalculatorKind, FeatureKey, FeatureRegistry, ParamBinding,
};
use crate::error::{Result, TsfeatError};
use crate::extraction::{
    CancellationToken, CellFailure, ExtractionConfig, ExtractionDegraded, ExtractionReport,
    FeatureTableBuilder,
};
use crate::series::SeriesRecord;
use crate::utils::parallel_map_with_config;

struct Task {
    series_idx: usize,
    calculator: Arc<dyn Calculator>,
    binding: ParamBinding,
}

enum TaskOutcome {
    Cells(Vec<(FeatureKey, f64)>),
    Failed(CellFailure, Option<FeatureKey>),
    Cancelled,
}

/// Extract the full feature table for a set of series
pub fn extract(
    series: &[SeriesRecord],
    registry: &FeatureRegistry,
    config: &ExtractionConfig,
) -> Result<ExtractionReport> {
    extract_cancellable(series, registry, config, &CancellationToken::new())
}

/// Extraction with an external cancellation signal
pub fn extract_cancellable(
    series: &[SeriesRecord],
    registry: &FeatureRegistry,
    config: &ExtractionConfig,
    token: &CancellationToken,
) -> Result<ExtractionReport> {
    let row_ids: Vec<String> = series.iter().map(|s| s.id().to_string()).collect();
    // rejects duplicate ids before any work is scheduled
    let mut builder = FeatureTableBuilder::new(row_ids)?;

    let tasks = build_tasks(series, registry, config);
    let tasks_total = tasks.len();

    let outcomes = parallel_map_with_config(tasks, &config.parallel, |task| {
        run_task(series, task, token)
    })?;

    let mut failures = Vec::new();
    let mut tasks_cancelled = 0usize;
    for (task_series_idx, outcome) in outcomes {
        match outcome {
            TaskOutcome::Cells(cells) => {
                let id = series[task_series_idx].id().to_string();
                for (key, value) in cells {
                    builder.set(&id, key, value)?;
                }
            }
            TaskOutcome::Failed(failure, key) => {
                // scalar failures still materialize their column so the
                // sentinel is visible; combiner component keys are unknown
                // without execution and stay absent
                if let Some(key) = key {
                    builder.touch_column(key);
                }
                debug!(
                    series_id = %failure.series_id,
                    calculator = %failure.calculator,
                    parameters = %failure.parameters,
                    reason = %failure.reason,
                    "calculator task failed, recording sentinel"
                );
                failures.push(failure);
            }
            TaskOutcome::Cancelled => tasks_cancelled += 1,
        }
    }

    let executed = tasks_total - tasks_cancelled;
    let error_rate = if executed > 0 {
        failures.len() as f64 / executed as f64
    } else {
        0.0
    };

    let degraded = if !failures.is_empty() && error_rate > config.fail_on_error_rate {
        let mut per_calculator: BTreeMap<String, usize> = BTreeMap::new();
        for failure in &failures {
            *per_calculator.entry(failure.calculator.clone()).or_insert(0) += 1;
        }
        let summary = ExtractionDegraded {
            error_rate,
            threshold: config.fail_on_error_rate,
            failing_calculators: per_calculator.into_iter().collect(),
        };
        warn!(
            error_rate,
            threshold = config.fail_on_error_rate,
            failures = failures.len(),
            "extraction degraded: task failure rate exceeds threshold"
        );
        Some(summary)
    } else {
        None
    };

    Ok(ExtractionReport {
        table: builder.finish(),
        failures,
        degraded,
        tasks_total,
        tasks_cancelled,
    })
}

fn build_tasks(
    series: &[SeriesRecord],
    registry: &FeatureRegistry,
    config: &ExtractionConfig,
) -> Vec<Task> {
    let mut tasks = Vec::new();
    for (series_idx, record) in series.iter().enumerate() {
        let allowed: Option<&[String]> = match (&config.kind_filter, record.kind()) {
            (Some(filter), Some(kind)) => {
                Some(filter.get(kind).map(|v| v.as_slice()).unwrap_or(&[]))
            }
            _ => None,
        };

        for (calculator, grid) in registry.iter() {
            if let Some(allowed) = allowed {
                if !allowed.iter().any(|n| n == calculator.name()) {
                    continue;
                }
            }
            for binding in grid {
                tasks.push(Task {
                    series_idx,
                    calculator: Arc::clone(calculator),
                    binding: binding.clone(),
                });
            }
        }
    }
    tasks
}

fn run_task(
    series: &[SeriesRecord],
    task: Task,
    token: &CancellationToken,
) -> (usize, TaskOutcome) {
    if token.is_cancelled() {
        return (task.series_idx, TaskOutcome::Cancelled);
    }

    let record = &series[task.series_idx];
    match execute(task.calculator.as_ref(), record.values(), &task.binding) {
        Ok(output) => {
            let cells = expand_output(task.calculator.as_ref(), &task.binding, output);
            (task.series_idx, TaskOutcome::Cells(cells))
        }
        Err(TsfeatError::CalculatorError {
            calculator,
            parameters,
            reason,
        }) => {
            let sentinel_key = match task.calculator.kind() {
                CalculatorKind::Scalar => {
                    Some(FeatureKey::new(task.calculator.name(), &task.binding))
                }
                CalculatorKind::Combiner => None,
            };
            let failure = CellFailure {
                series_id: record.id().to_string(),
                calculator,
                parameters,
                reason,
            };
            (task.series_idx, TaskOutcome::Failed(failure, sentinel_key))
        }
        Err(other) => {
            let failure = CellFailure {
                series_id: record.id().to_string(),
                calculator: task.calculator.name().to_string(),
                parameters: task.binding.canonical(),
                reason: other.to_string(),
            };
            (task.series_idx, TaskOutcome::Failed(failure, None))
        }
    }
}
