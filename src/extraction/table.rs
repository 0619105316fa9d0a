//! Wide feature table
//!
//! Rectangular table with one row per input series id and one column per
//! feature key. Missing or failed cells are explicit NaN sentinels; rows are
//! never dropped. Columns are kept sorted by canonical key so any serialized
//! view of the table is reproducible regardless of task execution order.

use ndarray::{Array2, ArrayView1, ArrayView2};
use std::collections::HashMap;

use crate::calculators::FeatureKey;
use crate::error::{Result, TsfeatError};

/// Immutable wide feature table
#[derive(Debug, Clone)]
pub struct FeatureTable {
    row_ids: Vec<String>,
    row_index: HashMap<String, usize>,
    /// Sorted by canonical key
    columns: Vec<FeatureKey>,
    data: Array2<f64>,
}

impl FeatureTable {
    pub fn nrows(&self) -> usize {
        self.row_ids.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    pub fn column_keys(&self) -> &[FeatureKey] {
        &self.columns
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn column(&self, index: usize) -> ArrayView1<'_, f64> {
        self.data.column(index)
    }

    pub fn get(&self, row_id: &str, key: &FeatureKey) -> Option<f64> {
        let row = *self.row_index.get(row_id)?;
        let col = self.columns.binary_search(key).ok()?;
        Some(self.data[[row, col]])
    }

    /// First non-finite cell as (row id, key), if any
    pub fn first_non_finite(&self) -> Option<(&str, &FeatureKey)> {
        for (r, row_id) in self.row_ids.iter().enumerate() {
            for (c, key) in self.columns.iter().enumerate() {
                if !self.data[[r, c]].is_finite() {
                    return Some((row_id, key));
                }
            }
        }
        None
    }

    /// Project onto a subset of columns, preserving canonical order
    pub fn select_columns(&self, keys: &[FeatureKey]) -> Result<FeatureTable> {
        let mut indices = Vec::with_capacity(keys.len());
        for key in keys {
            let col = self.columns.binary_search(key).map_err(|_| {
                TsfeatError::ConfigError(format!("unknown feature column '{}'", key))
            })?;
            indices.push(col);
        }
        indices.sort_unstable();
        indices.dedup();

        let mut data = Array2::from_elem((self.nrows(), indices.len()), f64::NAN);
        let mut columns = Vec::with_capacity(indices.len());
        for (new_c, &old_c) in indices.iter().enumerate() {
            columns.push(self.columns[old_c].clone());
            data.column_mut(new_c).assign(&self.data.column(old_c));
        }

        Ok(FeatureTable {
            row_ids: self.row_ids.clone(),
            row_index: self.row_index.clone(),
            columns,
            data,
        })
    }

    /// Rebuild the same table with a replaced value matrix
    pub(crate) fn with_values(&self, data: Array2<f64>) -> Result<FeatureTable> {
        if data.dim() != self.data.dim() {
            return Err(TsfeatError::ShapeError {
                expected: format!("{:?}", self.data.dim()),
                actual: format!("{:?}", data.dim()),
            });
        }
        Ok(FeatureTable {
            row_ids: self.row_ids.clone(),
            row_index: self.row_index.clone(),
            columns: self.columns.clone(),
            data,
        })
    }
}

/// Builder merging (row, key, value) triples into a table
///
/// The row set is fixed up front to the input series id set, so the finished
/// table is row-complete even when every task for a series failed. The merge
/// is associative: insertion order does not affect the result.
#[derive(Debug)]
pub struct FeatureTableBuilder {
    row_ids: Vec<String>,
    row_index: HashMap<String, usize>,
    columns: HashMap<FeatureKey, Vec<f64>>,
}

impl FeatureTableBuilder {
    pub fn new(row_ids: Vec<String>) -> Result<Self> {
        let mut row_index = HashMap::with_capacity(row_ids.len());
        for (i, id) in row_ids.iter().enumerate() {
            if row_index.insert(id.clone(), i).is_some() {
                return Err(TsfeatError::DataError(format!(
                    "duplicate series id '{}'",
                    id
                )));
            }
        }
        Ok(Self {
            row_ids,
            row_index,
            columns: HashMap::new(),
        })
    }

    /// Record one cell; each (row, key) pair is produced by exactly one task
    pub fn set(&mut self, row_id: &str, key: FeatureKey, value: f64) -> Result<()> {
        let row = *self.row_index.get(row_id).ok_or_else(|| {
            TsfeatError::DataError(format!("unknown series id '{}'", row_id))
        })?;
        let n_rows = self.row_ids.len();
        let column = self
            .columns
            .entry(key)
            .or_insert_with(|| vec![f64::NAN; n_rows]);
        column[row] = value;
        Ok(())
    }

    /// Ensure a column exists even if no task produced a value for it
    pub fn touch_column(&mut self, key: FeatureKey) {
        let n_rows = self.row_ids.len();
        self.columns.entry(key).or_insert_with(|| vec![f64::NAN; n_rows]);
    }

    pub fn finish(self) -> FeatureTable {
        let mut keys: Vec<FeatureKey> = self.columns.keys().cloned().collect();
        keys.sort();

        let n_rows = self.row_ids.len();
        let mut data = Array2::from_elem((n_rows, keys.len()), f64::NAN);
        for (c, key) in keys.iter().enumerate() {
            let column = &self.columns[key];
            for (r, &value) in column.iter().enumerate() {
                data[[r, c]] = value;
            }
        }

        FeatureTable {
            row_ids: self.row_ids,
            row_index: self.row_index,
            columns: keys,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::ParamBinding;

    fn key(name: &str) -> FeatureKey {
        FeatureKey::new(name, &ParamBinding::empty())
    }

    #[test]
    fn test_builder_row_completeness() {
        let mut builder =
            FeatureTableBuilder::new(vec!["a".to_string(), "b".to_string()]).unwrap();
        builder.set("a", key("mean"), 1.0).unwrap();
        // no cell at all for row "b"

        let table = builder.finish();
        assert_eq!(table.nrows(), 2);
        assert_eq!(table.ncols(), 1);
        assert_eq!(table.get("a", &key("mean")), Some(1.0));
        assert!(table.get("b", &key("mean")).unwrap().is_nan());
    }

    #[test]
    fn test_columns_sorted_regardless_of_insertion_order() {
        let mut builder = FeatureTableBuilder::new(vec!["a".to_string()]).unwrap();
        builder.set("a", key("variance"), 2.0).unwrap();
        builder.set("a", key("abs_energy"), 3.0).unwrap();
        builder.set("a", key("mean"), 1.0).unwrap();

        let table = builder.finish();
        let names: Vec<&str> = table.column_keys().iter().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["abs_energy", "mean", "variance"]);
    }

    #[test]
    fn test_select_columns_projection() {
        let mut builder = FeatureTableBuilder::new(vec!["a".to_string()]).unwrap();
        builder.set("a", key("mean"), 1.0).unwrap();
        builder.set("a", key("variance"), 2.0).unwrap();
        let table = builder.finish();

        let projected = table.select_columns(&[key("variance")]).unwrap();
        assert_eq!(projected.ncols(), 1);
        assert_eq!(projected.get("a", &key("variance")), Some(2.0));

        assert!(table.select_columns(&[key("nope")]).is_err());
    }

    #[test]
    fn test_first_non_finite() {
        let mut builder = FeatureTableBuilder::new(vec!["a".to_string()]).unwrap();
        builder.set("a", key("mean"), 1.0).unwrap();
        builder.touch_column(key("variance"));
        let table = builder.finish();

        let (row, col) = table.first_non_finite().unwrap();
        assert_eq!(row, "a");
        assert_eq!(col.as_str(), "variance");
    }

    #[test]
    fn test_duplicate_row_ids_rejected() {
        assert!(FeatureTableBuilder::new(vec!["a".to_string(), "a".to_string()]).is_err());
    }
}
