//! Indicator-specific checks recorded alongside the composite checks.

use hsi_model::period::leading_year;
use hsi_model::{CheckCategory, Comparator, QualityCheck, TabularDataset};
use serde_json::json;

use crate::checks::period_column;
use crate::thresholds::QualityThresholds;

fn present_text(dataset: &TabularDataset, column: &str) -> Option<Vec<String>> {
    let cells = dataset.column_values(column).ok()?;
    Some(
        cells
            .filter(|cell| !cell.is_missing())
            .map(|cell| cell.render().into_owned())
            .collect(),
    )
}

/// Indicator names must be non-blank and mostly of a plausible length.
///
/// Any blank name fails the check outright (metric 0).
pub fn check_indicator_names(
    dataset: &TabularDataset,
    table_name: &str,
    thresholds: &QualityThresholds,
) -> Option<QualityCheck> {
    let names = present_text(dataset, "indicator")?;
    let blank = names.iter().filter(|name| name.trim().is_empty()).count();
    let plausible = names
        .iter()
        .filter(|name| {
            let len = name.chars().count();
            len >= thresholds.indicator_name_min_len && len <= thresholds.indicator_name_max_len
        })
        .count();
    let length_rate = if names.is_empty() {
        1.0
    } else {
        plausible as f64 / names.len() as f64
    };
    let metric = if blank > 0 { 0.0 } else { length_rate };

    Some(
        QualityCheck::evaluate(
            "health_indicator_names_valid",
            CheckCategory::Validity,
            metric,
            thresholds.min_indicator_name_rate,
            Comparator::GreaterThan,
        )
        .with_table(table_name)
        .with_column("indicator")
        .with_row_count(names.len())
        .with_failure_count(names.len() - plausible)
        .with_details(json!({
            "blank_names": blank,
            "length_rate": length_rate,
            "expected_length": [thresholds.indicator_name_min_len, thresholds.indicator_name_max_len],
        })),
    )
}

/// Leading years of period labels must mostly fall inside the expected range.
pub fn check_year_range(
    dataset: &TabularDataset,
    table_name: &str,
    thresholds: &QualityThresholds,
) -> Option<QualityCheck> {
    let column = period_column(dataset)?;
    let labels = present_text(dataset, column)?;
    let years: Vec<Option<i32>> = labels.iter().map(|label| leading_year(label)).collect();
    let in_range = years
        .iter()
        .flatten()
        .filter(|year| (thresholds.min_year..=thresholds.max_year).contains(*year))
        .count();
    let rate = if years.is_empty() {
        1.0
    } else {
        in_range as f64 / years.len() as f64
    };

    Some(
        QualityCheck::evaluate(
            "health_year_range_valid",
            CheckCategory::Validity,
            rate,
            thresholds.min_year_range_rate,
            Comparator::GreaterThan,
        )
        .with_table(table_name)
        .with_column(column)
        .with_row_count(years.len())
        .with_failure_count(years.len() - in_range)
        .with_details(json!({
            "expected_range": [thresholds.min_year, thresholds.max_year],
            "min_year": years.iter().flatten().min(),
            "max_year": years.iter().flatten().max(),
        })),
    )
}
