#![deny(unsafe_code)]

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum CellValue {
    Text(String),
    Number(f64),
    Missing,
}

/// The kind of a non-missing cell, used by type sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Text,
    Number,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
        }
    }
}

/// Hashable identity of a cell, for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Text(String),
    Number(u64),
    Missing,
}

impl CellValue {
    /// Build a cell from raw spreadsheet text. Blank cells are missing.
    pub fn from_raw(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Self::Missing
        } else {
            Self::Text(raw.to_string())
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Text(_) => Some(ValueKind::Text),
            Self::Number(_) => Some(ValueKind::Number),
            Self::Missing => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Render the cell as text; missing cells render empty.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Self::Text(value) => Cow::Borrowed(value.as_str()),
            Self::Number(value) => Cow::Owned(value.to_string()),
            Self::Missing => Cow::Borrowed(""),
        }
    }

    pub fn key(&self) -> CellKey {
        match self {
            Self::Text(value) => CellKey::Text(value.clone()),
            // -0.0 and 0.0 compare equal, so they must share a key.
            Self::Number(value) if *value == 0.0 => CellKey::Number(0.0f64.to_bits()),
            Self::Number(value) => CellKey::Number(value.to_bits()),
            Self::Missing => CellKey::Missing,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Missing, Into::into)
    }
}

/// Ordered rows over a fixed, ordered set of uniquely named columns.
///
/// Every row holds exactly one cell per column; the constructors and
/// [`TabularDataset::push_row`] reject anything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TabularDataset {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl TabularDataset {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(ModelError::DuplicateColumn(column.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        let mut dataset = Self::new(columns)?;
        dataset.rows.reserve(rows.len());
        for row in rows {
            dataset.push_row(row)?;
        }
        Ok(dataset)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<CellValue>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(ModelError::RowWidth {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(idx))
    }

    /// Iterate one column's cells in row order.
    pub fn column_values(&self, name: &str) -> Result<impl Iterator<Item = &CellValue> + '_> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ModelError::UnknownColumn(name.to_string()))?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Number of missing cells in a column.
    pub fn null_count(&self, name: &str) -> Result<usize> {
        Ok(self
            .column_values(name)?
            .filter(|cell| cell.is_missing())
            .count())
    }

    /// True when every non-missing cell of the column is a number.
    pub fn is_numeric_column(&self, name: &str) -> Result<bool> {
        Ok(self
            .column_values(name)?
            .all(|cell| !matches!(cell, CellValue::Text(_))))
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<CellValue>>) {
        (self.columns, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TabularDataset {
        TabularDataset::from_rows(
            vec!["indicator".to_string(), "value".to_string()],
            vec![
                vec![CellValue::text("ANC 4th visit"), CellValue::Number(38.0)],
                vec![CellValue::text("Deliveries"), CellValue::Missing],
            ],
        )
        .expect("dataset")
    }

    #[test]
    fn rejects_ragged_rows() {
        let mut dataset = sample();
        let error = dataset.push_row(vec![CellValue::Missing]).unwrap_err();
        assert!(matches!(
            error,
            ModelError::RowWidth {
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn rejects_duplicate_columns() {
        let error = TabularDataset::new(vec!["a".into(), "a".into()]).unwrap_err();
        assert!(matches!(error, ModelError::DuplicateColumn(name) if name == "a"));
    }

    #[test]
    fn column_lookups() {
        let dataset = sample();
        assert_eq!(dataset.cell(0, "value"), Some(&CellValue::Number(38.0)));
        assert_eq!(dataset.null_count("value").unwrap(), 1);
        assert!(dataset.is_numeric_column("value").unwrap());
        assert!(!dataset.is_numeric_column("indicator").unwrap());
        assert!(dataset.column_values("missing").is_err());
    }

    #[test]
    fn blank_raw_cells_are_missing() {
        assert_eq!(CellValue::from_raw("   "), CellValue::Missing);
        assert_eq!(CellValue::from_raw(" 80 "), CellValue::text(" 80 "));
    }

    #[test]
    fn signed_zero_shares_a_key() {
        assert_eq!(CellValue::Number(-0.0).key(), CellValue::Number(0.0).key());
        assert_ne!(CellValue::Number(1.0).key(), CellValue::text("1").key());
    }

    #[test]
    fn renders_numbers_without_trailing_zeros() {
        assert_eq!(CellValue::Number(80.0).to_string(), "80");
        assert_eq!(CellValue::Number(1234.5).to_string(), "1234.5");
        assert_eq!(CellValue::Missing.to_string(), "");
    }
}
