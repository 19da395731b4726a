//! Post-unpivot cleanup: drop missing values, trim identifiers, coerce values.

use std::fmt;

use hsi_model::{CellValue, TabularDataset};
use serde::Serialize;

use crate::error::Result;
use crate::predicates::numeric_text;
use crate::unpivot::{PERIOD_COLUMN, VALUE_COLUMN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The text is not a number once separators are stripped.
    NotNumeric,
    /// The text parses, but to NaN.
    NotANumber,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotNumeric => "not_numeric",
            Self::NotANumber => "not_a_number",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A long-format row dropped because its value could not be coerced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// Row index in the unpivoted output.
    pub row: usize,
    /// Period column the value came from.
    pub column: String,
    pub raw_value: String,
    pub reason: RejectReason,
}

/// Coerce raw cell text to a number. Infinities are kept for the validity
/// checks to flag.
pub fn coerce_number(raw: &str) -> std::result::Result<f64, RejectReason> {
    let text = numeric_text(raw);
    match text.parse::<f64>() {
        Ok(value) if value.is_nan() => Err(RejectReason::NotANumber),
        Ok(value) => Ok(value),
        Err(_) => Err(RejectReason::NotNumeric),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub dataset: TabularDataset,
    pub dropped_missing: usize,
    pub rejections: Vec<Rejection>,
}

/// Normalize an unpivoted dataset whose last two columns are period and value.
pub fn normalize(long: TabularDataset) -> Result<Normalized> {
    let value_idx = long.column_index(VALUE_COLUMN);
    let period_idx = long.column_index(PERIOD_COLUMN);
    let (columns, rows) = long.into_parts();

    let (Some(value_idx), Some(period_idx)) = (value_idx, period_idx) else {
        return Ok(Normalized {
            dataset: TabularDataset::from_rows(columns, rows)?,
            dropped_missing: 0,
            rejections: Vec::new(),
        });
    };

    let mut dataset = TabularDataset::new(columns)?;
    let mut dropped_missing = 0;
    let mut rejections = Vec::new();

    for (row_idx, mut row) in rows.into_iter().enumerate() {
        let value = match &row[value_idx] {
            CellValue::Missing => {
                dropped_missing += 1;
                continue;
            }
            CellValue::Number(number) if number.is_nan() => Err(RejectReason::NotANumber),
            CellValue::Number(number) => Ok(*number),
            CellValue::Text(raw) => coerce_number(raw),
        };
        let value = match value {
            Ok(value) => value,
            Err(reason) => {
                rejections.push(Rejection {
                    row: row_idx,
                    column: row[period_idx].render().into_owned(),
                    raw_value: row[value_idx].render().into_owned(),
                    reason,
                });
                continue;
            }
        };

        for (idx, cell) in row.iter_mut().enumerate() {
            if idx == value_idx || idx == period_idx {
                continue;
            }
            if let CellValue::Text(text) = cell {
                let trimmed = text.trim();
                if trimmed.len() != text.len() {
                    *text = trimmed.to_string();
                }
            }
        }
        row[value_idx] = CellValue::Number(value);
        dataset.push_row(row)?;
    }

    Ok(Normalized {
        dataset,
        dropped_missing,
        rejections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion() {
        assert_eq!(coerce_number("1,234"), Ok(1234.0));
        assert_eq!(coerce_number("  85 "), Ok(85.0));
        assert_eq!(coerce_number("N/A"), Err(RejectReason::NotNumeric));
        assert_eq!(coerce_number("nan"), Err(RejectReason::NotANumber));
        assert_eq!(coerce_number(""), Err(RejectReason::NotNumeric));
        assert!(coerce_number("inf").unwrap().is_infinite());
    }

    #[test]
    fn drops_missing_and_rejects_non_numeric() {
        let long = TabularDataset::from_rows(
            vec!["indicator".into(), "period_label".into(), "value".into()],
            vec![
                vec![
                    CellValue::text("  ANC 4th visit "),
                    CellValue::text("2016/17"),
                    CellValue::text("1,234"),
                ],
                vec![
                    CellValue::text("ANC 4th visit"),
                    CellValue::text("2017/18"),
                    CellValue::Missing,
                ],
                vec![
                    CellValue::text("ANC 4th visit"),
                    CellValue::text("2018/19"),
                    CellValue::text("N/A"),
                ],
            ],
        )
        .unwrap();

        let normalized = normalize(long).unwrap();
        assert_eq!(normalized.dataset.height(), 1);
        assert_eq!(
            normalized.dataset.cell(0, "indicator"),
            Some(&CellValue::text("ANC 4th visit"))
        );
        assert_eq!(
            normalized.dataset.cell(0, "value"),
            Some(&CellValue::Number(1234.0))
        );
        assert_eq!(normalized.dropped_missing, 1);
        assert_eq!(
            normalized.rejections,
            vec![Rejection {
                row: 2,
                column: "2018/19".to_string(),
                raw_value: "N/A".to_string(),
                reason: RejectReason::NotNumeric,
            }]
        );
    }
}
