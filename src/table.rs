//! Tabular batch type threaded through the ETL transforms.
//!
//! A [`Table`] is an ordered list of JSON records. Columns are dynamic: a
//! column exists when at least one row carries the key. Transforms consume a
//! table and return a new one with the same or an extended column set.

use crate::error::EtlError;
use serde_json::Value;

/// One row of a table. Key order is preserved (`serde_json` with
/// `preserve_order`), so output column order follows insertion order.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    rows: Vec<Record>,
}

impl Table {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_rows(rows: Vec<Record>) -> Self {
        Self { rows }
    }

    #[must_use]
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    #[must_use]
    pub fn rows_mut(&mut self) -> &mut [Record] {
        &mut self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    pub fn push(&mut self, row: Record) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// A column exists when any row carries the key.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.rows.iter().any(|row| row.contains_key(name))
    }

    /// Fails fast when a transform's required source column is absent.
    pub fn require_column(&self, name: &str) -> Result<(), EtlError> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(EtlError::missing_column(name))
        }
    }

    /// Union of row keys, in order of first appearance.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    pub fn drop_column(&mut self, name: &str) {
        for row in &mut self.rows {
            row.remove(name);
        }
    }
}

impl FromIterator<Record> for Table {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// Borrows a string cell; null and non-string values read as absent.
#[must_use]
pub fn str_cell<'a>(row: &'a Record, name: &str) -> Option<&'a str> {
    row.get(name).and_then(Value::as_str)
}
