//! Imputation of non-finite feature cells
//!
//! Boundary collaborator between extraction and relevance testing. The
//! relevance tester only assumes finiteness afterwards, never that the
//! imputed values are meaningful; [`assert_finite`] is its fail-fast guard.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TsfeatError};
use crate::extraction::FeatureTable;

/// Replaces every non-finite cell of a feature table
pub trait Imputer: Send + Sync {
    fn impute(&self, table: &FeatureTable) -> Result<FeatureTable>;
}

/// Column-local imputation: NaN -> median, +inf -> max, -inf -> min
///
/// Matches the extraction sentinel semantics: a NaN cell means "could not be
/// computed" and gets the column's typical value; signed infinities keep
/// their direction by saturating at the observed extremes. A column with no
/// finite value at all becomes 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinMaxMedianImputer;

impl Imputer for MinMaxMedianImputer {
    fn impute(&self, table: &FeatureTable) -> Result<FeatureTable> {
        let mut data = table.values().to_owned();
        for mut column in data.columns_mut() {
            let mut finite: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
            if finite.is_empty() {
                column.fill(0.0);
                continue;
            }
            finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let min = finite[0];
            let max = finite[finite.len() - 1];
            let median = if finite.len() % 2 == 0 {
                (finite[finite.len() / 2 - 1] + finite[finite.len() / 2]) / 2.0
            } else {
                finite[finite.len() / 2]
            };

            for value in column.iter_mut() {
                if value.is_nan() {
                    *value = median;
                } else if *value == f64::INFINITY {
                    *value = max;
                } else if *value == f64::NEG_INFINITY {
                    *value = min;
                }
            }
        }
        table.with_values(data)
    }
}

/// Replace every non-finite cell with one configured constant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantImputer {
    pub fill_value: f64,
}

impl ConstantImputer {
    pub fn new(fill_value: f64) -> Self {
        Self { fill_value }
    }
}

impl Imputer for ConstantImputer {
    fn impute(&self, table: &FeatureTable) -> Result<FeatureTable> {
        if !self.fill_value.is_finite() {
            return Err(TsfeatError::ConfigError(format!(
                "fill value must be finite, got {}",
                self.fill_value
            )));
        }
        let mut data: Array2<f64> = table.values().to_owned();
        data.mapv_inplace(|v| if v.is_finite() { v } else { self.fill_value });
        table.with_values(data)
    }
}

/// Fail fast when a table still contains non-finite cells
pub fn assert_finite(table: &FeatureTable) -> Result<()> {
    if let Some((row, key)) = table.first_non_finite() {
        return Err(TsfeatError::PreconditionError(format!(
            "non-finite value in feature table at series '{}', column '{}'; run imputation first",
            row, key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::{FeatureKey, ParamBinding};
    use crate::extraction::FeatureTableBuilder;

    fn key(name: &str) -> FeatureKey {
        FeatureKey::new(name, &ParamBinding::empty())
    }

    fn table_with_gaps() -> FeatureTable {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let mut builder = FeatureTableBuilder::new(ids).unwrap();
        builder.set("a", key("f"), 1.0).unwrap();
        builder.set("b", key("f"), f64::NAN).unwrap();
        builder.set("c", key("f"), 3.0).unwrap();
        builder.set("d", key("f"), f64::INFINITY).unwrap();
        builder.set("a", key("g"), f64::NAN).unwrap();
        builder.set("b", key("g"), f64::NAN).unwrap();
        builder.set("c", key("g"), f64::NAN).unwrap();
        builder.set("d", key("g"), f64::NAN).unwrap();
        builder.finish()
    }

    #[test]
    fn test_min_max_median_imputer() {
        let table = table_with_gaps();
        let imputed = MinMaxMedianImputer.impute(&table).unwrap();

        assert!(assert_finite(&imputed).is_ok());
        // NaN -> median of {1, 3} = 2; +inf -> max of {1, 3} = 3
        assert_eq!(imputed.get("b", &key("f")), Some(2.0));
        assert_eq!(imputed.get("d", &key("f")), Some(3.0));
        // all-missing column -> 0
        assert_eq!(imputed.get("a", &key("g")), Some(0.0));
    }

    #[test]
    fn test_constant_imputer() {
        let table = table_with_gaps();
        let imputed = ConstantImputer::new(-1.0).impute(&table).unwrap();

        assert!(assert_finite(&imputed).is_ok());
        assert_eq!(imputed.get("b", &key("f")), Some(-1.0));
        assert_eq!(imputed.get("d", &key("f")), Some(-1.0));
        assert_eq!(imputed.get("a", &key("f")), Some(1.0));

        assert!(ConstantImputer::new(f64::NAN).impute(&table).is_err());
    }

    #[test]
    fn test_assert_finite_reports_location() {
        let table = table_with_gaps();
        let err = assert_finite(&table).unwrap_err();
        assert!(matches!(err, TsfeatError::PreconditionError(_)));
        assert!(err.to_string().contains("series 'a'"));
        assert!(err.to_string().contains("column 'g'"));
    }
}
