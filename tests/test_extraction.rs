//! Integration tests for extraction: task expansion, parallel determinism,
//! sentinel handling, and degraded-run reporting

use std::collections::HashMap;

use tsfeat::calculators::{FeatureKey, FeatureRegistry, ParamBinding, ParamValue};
use tsfeat::extraction::{extract, ExtractionConfig};
use tsfeat::series::SeriesRecord;

// ============================================================================
// Fixtures
// ============================================================================

/// Nine well-behaved sinusoids plus one constant series. The constant series
/// makes every autocorrelation binding fail while quantile still succeeds.
fn mixed_series() -> Vec<SeriesRecord> {
    let mut series: Vec<SeriesRecord> = (0..9)
        .map(|i| {
            let values: Vec<f64> = (0..50).map(|t| ((t + i) as f64 * 0.29).sin()).collect();
            SeriesRecord::new(format!("s{}", i), values)
        })
        .collect();
    series.push(SeriesRecord::new("s9", vec![2.0; 50]));
    series
}

fn narrowed_registry() -> FeatureRegistry {
    let mut overrides = HashMap::new();
    overrides.insert(
        "autocorrelation".to_string(),
        (1..=3)
            .map(|lag| ParamBinding::single("lag", ParamValue::Int(lag)))
            .collect(),
    );
    overrides.insert(
        "quantile".to_string(),
        [0.25, 0.5, 0.75]
            .iter()
            .map(|&q| ParamBinding::single("q", ParamValue::Float(q)))
            .collect(),
    );
    FeatureRegistry::global()
        .subset(&["autocorrelation", "quantile"])
        .unwrap()
        .with_overrides(&overrides)
        .unwrap()
}

// ============================================================================
// Shape and naming
// ============================================================================

#[test]
fn test_table_shape_and_feature_names() {
    let series = mixed_series();
    let registry = narrowed_registry();

    let report = extract(&series, &registry, &ExtractionConfig::new()).unwrap();
    assert_eq!(report.table.nrows(), 10);
    assert_eq!(report.table.ncols(), 6);
    assert_eq!(report.tasks_total, 60);

    // columns are sorted canonical names
    let names: Vec<&str> = report.table.column_keys().iter().map(|k| k.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "autocorrelation__lag_1",
            "autocorrelation__lag_2",
            "autocorrelation__lag_3",
            "quantile__q_0.25",
            "quantile__q_0.5",
            "quantile__q_0.75",
        ]
    );

    // row order follows input order
    let ids: Vec<&str> = report.table.row_ids().iter().map(|s| s.as_str()).collect();
    assert_eq!(ids[0], "s0");
    assert_eq!(ids[9], "s9");
}

#[test]
fn test_failures_become_sentinels_and_quantiles_survive() {
    let series = mixed_series();
    let registry = narrowed_registry();

    let report = extract(&series, &registry, &ExtractionConfig::new()).unwrap();

    // 3 autocorrelation bindings fail on the constant series only
    assert_eq!(report.failures.len(), 3);
    for failure in &report.failures {
        assert_eq!(failure.series_id, "s9");
        assert_eq!(failure.calculator, "autocorrelation");
    }

    let ac1 = FeatureKey::new("autocorrelation", &ParamBinding::single("lag", ParamValue::Int(1)));
    assert!(report.table.get("s9", &ac1).unwrap().is_nan());
    assert!(report.table.get("s0", &ac1).unwrap().is_finite());

    // median of a constant series is its value
    let q50 = FeatureKey::new("quantile", &ParamBinding::single("q", ParamValue::Float(0.5)));
    assert_eq!(report.table.get("s9", &q50), Some(2.0));
}

// ============================================================================
// Degraded-run reporting
// ============================================================================

#[test]
fn test_degraded_threshold_is_configurable() {
    let series = mixed_series();
    let registry = narrowed_registry();

    // 3 of 60 tasks fail: 5% error rate
    let report = extract(&series, &registry, &ExtractionConfig::new()).unwrap();
    assert!(!report.is_degraded());

    let strict = ExtractionConfig::new().with_fail_on_error_rate(0.04);
    let report = extract(&series, &registry, &strict).unwrap();
    assert!(report.is_degraded());
    let degraded = report.degraded.unwrap();
    assert_eq!(
        degraded.failing_calculators,
        vec![("autocorrelation".to_string(), 3)]
    );
    assert!((degraded.error_rate - 0.05).abs() < 1e-12);
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_output_independent_of_worker_count() {
    let series = mixed_series();
    let registry = narrowed_registry();

    let baseline = extract(
        &series,
        &registry,
        &ExtractionConfig::new().with_workers(1),
    )
    .unwrap();
    for workers in [2, 4, 8] {
        let run = extract(
            &series,
            &registry,
            &ExtractionConfig::new().with_workers(workers),
        )
        .unwrap();
        assert_eq!(run.table.row_ids(), baseline.table.row_ids());
        assert_eq!(run.table.column_keys(), baseline.table.column_keys());
        for r in 0..run.table.nrows() {
            for c in 0..run.table.ncols() {
                let a = baseline.table.values()[[r, c]];
                let b = run.table.values()[[r, c]];
                assert!(
                    a == b || (a.is_nan() && b.is_nan()),
                    "cell ({}, {}) differs: {} vs {}",
                    r,
                    c,
                    a,
                    b
                );
            }
        }
    }
}

// ============================================================================
// Rebuilding a registry from column names
// ============================================================================

#[test]
fn test_registry_rebuilt_from_column_names_reproduces_columns() {
    let series: Vec<SeriesRecord> = mixed_series().into_iter().take(3).collect();
    let registry = FeatureRegistry::global()
        .from_column_names(&["autocorrelation__lag_1", "quantile__q_0.5", "mean"])
        .unwrap();

    let report = extract(&series, &registry, &ExtractionConfig::new()).unwrap();
    let names: Vec<&str> = report.table.column_keys().iter().map(|k| k.as_str()).collect();
    assert_eq!(
        names,
        vec!["autocorrelation__lag_1", "mean", "quantile__q_0.5"]
    );
    assert!(report.failures.is_empty());
}

#[test]
fn test_combiner_column_names_restore_the_full_binding() {
    // one component name is enough to bring back the whole component family
    let series: Vec<SeriesRecord> = mixed_series().into_iter().take(2).collect();
    let registry = FeatureRegistry::global()
        .from_column_names(&["linear_trend__slope"])
        .unwrap();

    let report = extract(&series, &registry, &ExtractionConfig::new()).unwrap();
    let names: Vec<&str> = report.table.column_keys().iter().map(|k| k.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "linear_trend__intercept",
            "linear_trend__pvalue",
            "linear_trend__rvalue",
            "linear_trend__slope",
            "linear_trend__stderr",
        ]
    );
}

// ============================================================================
// Full catalog smoke test
// ============================================================================

#[test]
fn test_comprehensive_registry_on_clean_series() {
    let series: Vec<SeriesRecord> = (0..5)
        .map(|i| {
            let values: Vec<f64> = (0..64)
                .map(|t| ((t + i) as f64 * 0.17).sin() + 0.01 * t as f64)
                .collect();
            SeriesRecord::new(format!("s{}", i), values)
        })
        .collect();
    let registry = FeatureRegistry::comprehensive().unwrap();

    let report = extract(&series, &registry, &ExtractionConfig::new()).unwrap();
    assert_eq!(report.table.nrows(), 5);
    assert!(report.table.ncols() > 50);
    assert!(report.failures.is_empty());
    assert!(!report.is_degraded());

    let variance = FeatureKey::new("variance", &ParamBinding::empty());
    assert!(report.table.get("s0", &variance).unwrap() > 0.0);
}
