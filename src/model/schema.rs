//! Column schema derived from the first record

use super::record::{CellValue, Record};

/// Ordered column names used when writing to a flat target.
///
/// Columns come from the first record only. Later records with extra keys
/// lose those cells; records missing a key produce an empty/null cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    names: Vec<String>,
}

impl ColumnSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Take the keys of a record, in order
    pub fn from_record(record: &Record) -> Self {
        Self {
            names: record.keys().map(str::to_string).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Flattened cell values of `record` in column order. Missing keys and
    /// null cells yield `None`.
    pub fn values_for(&self, record: &Record) -> Vec<Option<String>> {
        self.names
            .iter()
            .map(|name| record.get(name).and_then(CellValue::flatten))
            .collect()
    }

    /// Count keys of `record` that this schema will drop
    pub fn dropped_keys(&self, record: &Record) -> usize {
        record
            .keys()
            .filter(|k| !self.names.iter().any(|n| n == k))
            .count()
    }
}
