//! Pure predicates behind the shape heuristics.

use hsi_model::CellValue;

pub use hsi_model::period::{contains_digit, is_digit_label, is_period_label_shape};

/// A cell that looks like a period label (`2016/17`, `FY 2018/2019`).
pub fn is_period_cell(cell: &CellValue) -> bool {
    !cell.is_missing() && is_period_label_shape(&cell.render())
}

/// Primary year-column test: period-label shape or a bare number.
pub fn is_year_column(name: &str) -> bool {
    is_period_label_shape(name) || is_digit_label(name)
}

/// Fallback year-column test when no primary match exists.
pub fn is_fallback_year_column(name: &str) -> bool {
    contains_digit(name)
}

/// Strip thousands separators and surrounding whitespace.
pub fn numeric_text(raw: &str) -> String {
    raw.replace(',', "").trim().to_string()
}
