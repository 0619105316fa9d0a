//! Series records and input normalization
//!
//! A [`SeriesRecord`] is one labeled, time-ordered sequence of numeric
//! values. Records are immutable once built; all ordering happens during
//! normalization, strictly before any extraction is scheduled.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, TsfeatError};

/// One labeled time series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesRecord {
    /// Series identity; one feature-table row per id
    id: String,
    /// Optional kind label; series of the same kind share calculator applicability
    kind: Option<String>,
    /// Time-ordered values
    values: Vec<f64>,
}

impl SeriesRecord {
    /// Create a record from already-ordered values (wide-format input)
    pub fn new(id: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            kind: None,
            values,
        }
    }

    /// Attach a kind label
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
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
}

/// One row of long-format input: (series id, kind, sort index, value)
pub type LongRow = (String, Option<String>, f64, f64);

/// Normalize long-format rows into series records
///
/// Rows are grouped by (id, kind) and sorted by the sort index within each
/// group. Record order follows first appearance in the input, so repeated
/// normalization of the same input yields the same record order. Duplicate
/// (id, kind, index) entries are rejected: they would make the value ordering
/// ambiguous.
pub fn series_from_long(rows: &[LongRow]) -> Result<Vec<SeriesRecord>> {
    let mut order: Vec<(String, Option<String>)> = Vec::new();
    let mut groups: HashMap<(String, Option<String>), Vec<(f64, f64)>> = HashMap::new();

    for (id, kind, index, value) in rows {
        let key = (id.clone(), kind.clone());
        let entry = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            Vec::new()
        });
        if entry.iter().any(|(i, _)| i == index) {
            return Err(TsfeatError::DataError(format!(
                "duplicate index {} for series '{}'",
                index, id
            )));
        }
        entry.push((*index, *value));
    }

    let mut records = Vec::with_capacity(order.len());
    for key in order {
        let mut points = groups.remove(&key).unwrap_or_default();
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let (id, kind) = key;
        let mut record = SeriesRecord::new(id, points.into_iter().map(|(_, v)| v).collect());
        if let Some(kind) = kind {
            record = record.with_kind(kind);
        }
        records.push(record);
    }

    Ok(records)
}

/// Build a record from already-ordered values (wide-format input)
pub fn series_from_wide(
    id: impl Into<String>,
    kind: Option<String>,
    values: Vec<f64>,
) -> SeriesRecord {
    let mut record = SeriesRecord::new(id, values);
    if let Some(kind) = kind {
        record = record.with_kind(kind);
    }
    record
}

/// Check that series ids (with kind) are unique across a record set
pub fn validate_unique_ids(records: &[SeriesRecord]) -> Result<()> {
    let mut seen: HashMap<(&str, Option<&str>), ()> = HashMap::new();
    for r in records {
        if seen.insert((r.id(), r.kind()), ()).is_some() {
            return Err(TsfeatError::DataError(format!(
                "duplicate series id '{}'",
                r.id()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_format_sorting() {
        let rows = vec![
            ("a".to_string(), None, 2.0, 30.0),
            ("a".to_string(), None, 0.0, 10.0),
            ("a".to_string(), None, 1.0, 20.0),
            ("b".to_string(), None, 0.0, 5.0),
        ];

        let records = series_from_long(&rows).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id(), "a");
        assert_eq!(records[0].values(), &[10.0, 20.0, 30.0]);
        assert_eq!(records[1].values(), &[5.0]);
    }

    #[test]
    fn test_long_format_duplicate_index_rejected() {
        let rows = vec![
            ("a".to_string(), None, 0.0, 1.0),
            ("a".to_string(), None, 0.0, 2.0),
        ];
        assert!(series_from_long(&rows).is_err());
    }

    #[test]
    fn test_record_order_follows_first_appearance() {
        let rows = vec![
            ("z".to_string(), None, 0.0, 1.0),
            ("a".to_string(), None, 0.0, 1.0),
            ("z".to_string(), None, 1.0, 2.0),
        ];
        let records = series_from_long(&rows).unwrap();
        assert_eq!(records[0].id(), "z");
        assert_eq!(records[1].id(), "a");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let records = vec![
            SeriesRecord::new("a", vec![1.0]),
            SeriesRecord::new("a", vec![2.0]),
        ];
        assert!(validate_unique_ids(&records).is_err());

        let records = vec![
            SeriesRecord::new("a", vec![1.0]).with_kind("x"),
            SeriesRecord::new("a", vec![2.0]).with_kind("y"),
        ];
        assert!(validate_unique_ids(&records).is_ok());
    }
}
