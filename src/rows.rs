//! Raw upstream rows.
//!
//! [`RawTable`] keeps every cell as text exactly as the source delivered it.
//! Adapters resolve the columns they need by name up front through
//! [`RawTable::require()`], so schema drift fails with the missing column named
//! instead of silently reading the wrong field.

use anyhow::{Result, anyhow};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            anyhow!(
                "Expected column '{name}' not found; available columns: {:?}",
                self.headers
            )
        })
    }

    pub fn require_all<const N: usize>(&self, names: [&str; N]) -> Result<[usize; N]> {
        let mut indices = [0usize; N];
        for (slot, name) in indices.iter_mut().zip(names) {
            *slot = self.require(name)?;
        }
        Ok(indices)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&[String]) -> bool) {
        self.rows.retain(|row| keep(row));
    }

    /// Cell accessor that treats short rows as blank cells.
    pub fn cell<'a>(row: &'a [String], idx: usize) -> &'a str {
        row.get(idx).map(|s| s.as_str()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawTable {
        RawTable::new(
            vec!["Area".into(), "Item".into(), "Value".into()],
            vec![vec!["Peru".into(), "Rice".into()]],
        )
    }

    #[test]
    fn require_names_missing_column() {
        let table = sample();
        let err = table.require("Element").unwrap_err().to_string();
        assert!(err.contains("'Element'"));
        assert_eq!(table.require_all(["Item", "Area"]).unwrap(), [1, 0]);
    }

    #[test]
    fn short_rows_read_as_blank() {
        let table = sample();
        assert_eq!(RawTable::cell(&table.rows()[0], 2), "");
        assert_eq!(RawTable::cell(&table.rows()[0], 0), "Peru");
    }
}
