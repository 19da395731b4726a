//! Wide period columns to long rows.

use hsi_model::{CellValue, TabularDataset};
use serde::Serialize;

use crate::error::{Result, TransformError};
use crate::header::unique_names;
use crate::predicates::{is_fallback_year_column, is_year_column};

pub const INDICATOR_COLUMN: &str = "indicator";
pub const PERIOD_COLUMN: &str = "period_label";
pub const VALUE_COLUMN: &str = "value";

/// Which source columns identify a row and which hold period values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRoles {
    pub identifiers: Vec<String>,
    pub periods: Vec<String>,
}

impl ColumnRoles {
    /// Split columns into identifiers and periods.
    ///
    /// Periods are period-shaped or all-digit names, falling back to any name
    /// containing a digit. Identifiers are the rest; with none left, the
    /// leftmost column identifies rows on its own.
    pub fn classify(columns: &[String]) -> Self {
        let mut periods: Vec<String> = columns
            .iter()
            .filter(|name| is_year_column(name))
            .cloned()
            .collect();
        if periods.is_empty() {
            periods = columns
                .iter()
                .filter(|name| is_fallback_year_column(name))
                .cloned()
                .collect();
        }

        let mut identifiers: Vec<String> = columns
            .iter()
            .filter(|name| !periods.contains(name))
            .cloned()
            .collect();
        if identifiers.is_empty() {
            identifiers.extend(columns.first().cloned());
        }

        Self {
            identifiers,
            periods,
        }
    }

    /// Output column names: `indicator`, remaining identifiers under their
    /// own names, then `period_label` and `value`.
    pub fn output_columns(&self) -> Vec<String> {
        // Reserved names are claimed first, so a clashing identifier gets the suffix.
        let claimed = unique_names(
            [INDICATOR_COLUMN, PERIOD_COLUMN, VALUE_COLUMN]
                .map(String::from)
                .into_iter()
                .chain(self.identifiers.iter().skip(1).cloned()),
        );
        let mut names = Vec::with_capacity(claimed.len());
        names.push(claimed[0].clone());
        names.extend(claimed[3..].iter().cloned());
        names.push(claimed[1].clone());
        names.push(claimed[2].clone());
        names
    }
}

/// Full cross of rows by period columns. Output row count is always
/// `rows × periods`.
pub fn unpivot(dataset: &TabularDataset, roles: &ColumnRoles) -> Result<TabularDataset> {
    if roles.periods.is_empty() {
        return Err(TransformError::NoPeriodColumns {
            columns: dataset.columns().to_vec(),
        });
    }

    let id_indices: Vec<usize> = roles
        .identifiers
        .iter()
        .filter_map(|name| dataset.column_index(name))
        .collect();
    let period_indices: Vec<(usize, &String)> = roles
        .periods
        .iter()
        .filter_map(|name| dataset.column_index(name).map(|idx| (idx, name)))
        .collect();

    let mut long = TabularDataset::new(roles.output_columns())?;
    for row in dataset.rows() {
        for (period_idx, period) in &period_indices {
            let mut out: Vec<CellValue> = id_indices.iter().map(|idx| row[*idx].clone()).collect();
            out.push(CellValue::text(period.as_str()));
            out.push(row[*period_idx].clone());
            long.push_row(out)?;
        }
    }
    Ok(long)
}
