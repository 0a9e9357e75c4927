//! Minimal row table for graph payloads.
//!
//! Rows are JSON objects. Columns are the union of row keys in first-seen
//! order. An optional index column names the row key that identifies a row;
//! it stays in the row but is not listed among the columns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A table of JSON rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    index: Option<String>,
    columns: Vec<String>,
    rows: Vec<Map<String, Value>>,
}

impl Table {
    /// An empty table with no columns.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a table from records, optionally indexed by one of their keys.
    #[must_use]
    pub fn from_records(records: Vec<Map<String, Value>>, index: Option<&str>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &records {
            for key in row.keys() {
                if Some(key.as_str()) != index && !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        Self {
            index: index.map(str::to_string),
            columns,
            rows: records,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Non-index columns.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Name of the index column, if any.
    #[must_use]
    pub fn index_column(&self) -> Option<&str> {
        self.index.as_deref()
    }

    #[must_use]
    pub fn rows(&self) -> &[Map<String, Value>] {
        &self.rows
    }

    /// Index values in row order. Empty for an unindexed table.
    #[must_use]
    pub fn index_values(&self) -> Vec<&Value> {
        match &self.index {
            Some(index) => self.rows.iter().filter_map(|r| r.get(index)).collect(),
            None => Vec::new(),
        }
    }

    /// Values of one column in row order; `None` where a row lacks the key.
    ///
    /// Returns `None` if the column does not exist at all.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<Option<&Value>>> {
        let known = self.columns.iter().any(|c| c == name) || self.index.as_deref() == Some(name);
        if !known {
            return None;
        }
        Some(self.rows.iter().map(|r| r.get(name)).collect())
    }

    /// Looks a row up by its index value.
    #[must_use]
    pub fn row_by_index(&self, key: &str) -> Option<&Map<String, Value>> {
        let index = self.index.as_deref()?;
        self.rows
            .iter()
            .find(|r| r.get(index).and_then(Value::as_str) == Some(key))
    }

    /// The rows as a JSON array.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Array(self.rows.iter().cloned().map(Value::Object).collect())
    }
}
