//! The five composite checks.
//!
//! Each function is pure: it inspects the dataset and returns a
//! [`CheckOutcome`] carrying the facts to record. Facts derive `passed` from
//! metric, threshold, and comparator, so the thresholds here are expressed on
//! the "good share" scale (e.g. `1 - null_rate > 1 - max_null_rate`).

use std::collections::{HashMap, HashSet};

use hsi_model::period::is_fiscal_year_label;
use hsi_model::{CellKey, CellValue, CheckCategory, Comparator, QualityCheck, TabularDataset};
use serde_json::{Map, json};

use crate::summary::{CheckKind, CheckOutcome};
use crate::thresholds::QualityThresholds;

pub const VALUE_COLUMN: &str = "value";

/// Period columns in lookup order.
pub const PERIOD_COLUMNS: &[&str] = &["period_label", "year_label"];

/// Columns that, when present, form the natural key of a long-format row.
pub const KEY_COLUMN_CANDIDATES: &[&str] = &["indicator", "year_label", "period_label", "location"];

pub fn period_column(dataset: &TabularDataset) -> Option<&'static str> {
    PERIOD_COLUMNS
        .iter()
        .copied()
        .find(|name| dataset.has_column(name))
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// True when both cells are present and of different kinds.
pub(crate) fn kind_changed(first: &CellValue, second: &CellValue) -> bool {
    match (first.kind(), second.kind()) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    }
}

/// Null rate over the given columns; one fact per column.
///
/// Columns absent from the dataset are skipped and listed in the details.
pub fn check_completeness(
    dataset: &TabularDataset,
    table_name: &str,
    columns: &[String],
    thresholds: &QualityThresholds,
) -> CheckOutcome {
    let rows = dataset.height();
    let mut facts = Vec::new();
    let mut breakdown = Map::new();
    let mut absent = Vec::new();
    let mut null_cells = 0usize;
    let mut checked = 0usize;

    for column in columns {
        let Ok(nulls) = dataset.null_count(column) else {
            absent.push(column.clone());
            continue;
        };
        checked += 1;
        null_cells += nulls;
        let null_rate = ratio(nulls, rows);

        facts.push(
            QualityCheck::evaluate(
                format!("completeness_{column}"),
                CheckCategory::Completeness,
                1.0 - null_rate,
                1.0 - thresholds.max_null_rate,
                Comparator::GreaterThan,
            )
            .with_table(table_name)
            .with_column(column.as_str())
            .with_row_count(rows)
            .with_failure_count(nulls)
            .with_details(json!({ "null_rate": null_rate })),
        );
        breakdown.insert(
            column.clone(),
            json!({ "null_count": nulls, "null_rate": null_rate }),
        );
    }

    let total_cells = rows * checked;
    let null_rate = ratio(null_cells, total_cells);
    let mut details = json!({
        "total_cells": total_cells,
        "null_cells": null_cells,
        "null_rate": null_rate,
        "column_breakdown": breakdown,
    });
    if !absent.is_empty() {
        details["absent_columns"] = json!(absent);
    }

    CheckOutcome {
        kind: CheckKind::Completeness,
        passed: null_rate < thresholds.max_null_rate,
        score: 1.0 - null_rate,
        details,
        facts,
    }
}

/// Range checks on the numeric value column.
///
/// A missing or non-numeric value column, or one with no values, passes
/// vacuously.
pub fn check_validity(
    dataset: &TabularDataset,
    table_name: &str,
    thresholds: &QualityThresholds,
) -> CheckOutcome {
    let values: Vec<f64> = match dataset.is_numeric_column(VALUE_COLUMN) {
        Ok(true) => dataset
            .column_values(VALUE_COLUMN)
            .map(|cells| cells.filter_map(CellValue::as_number).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let mut facts = Vec::new();
    if !values.is_empty() {
        let count = values.len();

        let negatives = values.iter().filter(|value| **value < 0.0).count();
        facts.push(
            QualityCheck::evaluate(
                "validity_no_negatives",
                CheckCategory::Validity,
                1.0 - ratio(negatives, count),
                1.0,
                Comparator::AtLeast,
            )
            .with_table(table_name)
            .with_column(VALUE_COLUMN)
            .with_row_count(count)
            .with_failure_count(negatives),
        );

        let out_of_range = values
            .iter()
            .filter(|value| **value < thresholds.min_value || **value > thresholds.max_value)
            .count();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        facts.push(
            QualityCheck::evaluate(
                "validity_value_range",
                CheckCategory::Validity,
                1.0 - ratio(out_of_range, count),
                1.0 - thresholds.max_outlier_rate,
                Comparator::GreaterThan,
            )
            .with_table(table_name)
            .with_column(VALUE_COLUMN)
            .with_row_count(count)
            .with_failure_count(out_of_range)
            .with_details(json!({
                "min_value": min,
                "max_value": max,
                "expected_range": [thresholds.min_value, thresholds.max_value],
            })),
        );

        let infinites = values.iter().filter(|value| value.is_infinite()).count();
        facts.push(
            QualityCheck::flag("validity_no_infinites", CheckCategory::Validity, infinites == 0)
                .with_table(table_name)
                .with_column(VALUE_COLUMN)
                .with_failure_count(infinites),
        );
    }

    CheckOutcome::from_facts(CheckKind::Validity, facts, json!({}))
}

/// Duplicate full rows, plus strict period label format when a period column
/// exists.
pub fn check_consistency(
    dataset: &TabularDataset,
    table_name: &str,
    thresholds: &QualityThresholds,
) -> CheckOutcome {
    let rows = dataset.height();
    let mut seen: HashSet<Vec<CellKey>> = HashSet::with_capacity(rows);
    let duplicates = dataset
        .rows()
        .iter()
        .filter(|row| !seen.insert(row.iter().map(CellValue::key).collect()))
        .count();

    let mut facts = vec![
        QualityCheck::evaluate(
            "consistency_no_duplicates",
            CheckCategory::Consistency,
            1.0 - ratio(duplicates, rows),
            1.0 - thresholds.max_duplicate_rate,
            Comparator::GreaterThan,
        )
        .with_table(table_name)
        .with_row_count(rows)
        .with_failure_count(duplicates)
        .with_details(json!({ "duplicate_count": duplicates })),
    ];

    if let Some(column) = period_column(dataset) {
        let labels: Vec<String> = dataset
            .column_values(column)
            .map(|cells| {
                cells
                    .filter(|cell| !cell.is_missing())
                    .map(|cell| cell.render().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        let valid = labels
            .iter()
            .filter(|label| is_fiscal_year_label(label))
            .count();
        let rate = if labels.is_empty() {
            1.0
        } else {
            ratio(valid, labels.len())
        };
        facts.push(
            QualityCheck::evaluate(
                "consistency_year_format",
                CheckCategory::Consistency,
                rate,
                thresholds.min_period_format_rate,
                Comparator::AtLeast,
            )
            .with_table(table_name)
            .with_column(column)
            .with_row_count(labels.len())
            .with_failure_count(labels.len() - valid),
        );
    }

    CheckOutcome::from_facts(CheckKind::Consistency, facts, json!({}))
}

/// No two rows may share the inferred key. The first row of each key is
/// kept; every later repeat counts as a failure.
pub fn check_uniqueness(dataset: &TabularDataset, table_name: &str) -> CheckOutcome {
    let key_columns: Vec<&str> = KEY_COLUMN_CANDIDATES
        .iter()
        .copied()
        .filter(|name| dataset.has_column(name))
        .collect();

    if key_columns.is_empty() {
        return CheckOutcome {
            kind: CheckKind::Uniqueness,
            passed: true,
            score: 1.0,
            details: json!({ "skipped": "no_key_columns" }),
            facts: Vec::new(),
        };
    }

    let indices: Vec<usize> = key_columns
        .iter()
        .filter_map(|name| dataset.column_index(name))
        .collect();
    let mut groups: HashMap<Vec<CellKey>, usize> = HashMap::new();
    for row in dataset.rows() {
        let key = indices.iter().map(|idx| row[*idx].key()).collect();
        *groups.entry(key).or_default() += 1;
    }
    let duplicate_rows: usize = groups.values().map(|count| count - 1).sum();
    let rows = dataset.height();
    let duplicate_rate = ratio(duplicate_rows, rows);

    let fact = QualityCheck::evaluate(
        "uniqueness_key_constraint",
        CheckCategory::Consistency,
        1.0 - duplicate_rate,
        1.0,
        Comparator::AtLeast,
    )
    .with_table(table_name)
    .with_row_count(rows)
    .with_failure_count(duplicate_rows)
    .with_details(json!({
        "key_columns": key_columns,
        "duplicate_count": duplicate_rows,
    }));

    CheckOutcome {
        kind: CheckKind::Uniqueness,
        passed: duplicate_rows == 0,
        score: 1.0 - duplicate_rate,
        details: json!({
            "key_columns": key_columns,
            "duplicate_keys": duplicate_rows,
            "duplicate_rate": duplicate_rate,
        }),
        facts: vec![fact],
    }
}

/// The value column is numeric, and no column changes kind between its first
/// row and its midpoint row.
pub fn check_data_types(dataset: &TabularDataset, table_name: &str) -> CheckOutcome {
    let mut facts = Vec::new();

    if let Ok(numeric) = dataset.is_numeric_column(VALUE_COLUMN) {
        facts.push(
            QualityCheck::flag("type_value_is_numeric", CheckCategory::Validity, numeric)
                .with_table(table_name)
                .with_column(VALUE_COLUMN),
        );
    }

    let mut mixed: Vec<String> = Vec::new();
    if let (Some(first), Some(middle)) = (dataset.row(0), dataset.row(dataset.height() / 2)) {
        for (idx, column) in dataset.columns().iter().enumerate() {
            if kind_changed(&first[idx], &middle[idx]) {
                mixed.push(column.clone());
            }
        }
    }
    facts.push(
        QualityCheck::flag("type_no_mixed_types", CheckCategory::Validity, mixed.is_empty())
            .with_table(table_name)
            .with_details(json!({ "mixed_type_columns": mixed })),
    );

    CheckOutcome::from_facts(
        CheckKind::DataTypes,
        facts,
        json!({ "mixed_type_columns": mixed }),
    )
}

/// Helper for tests and callers building datasets by hand.
#[cfg(test)]
pub(crate) fn long_dataset(rows: &[(&str, &str, Option<f64>)]) -> TabularDataset {
    TabularDataset::from_rows(
        vec![
            "indicator".to_string(),
            "period_label".to_string(),
            VALUE_COLUMN.to_string(),
        ],
        rows.iter()
            .map(|(indicator, period, value)| {
                vec![
                    CellValue::text(*indicator),
                    CellValue::text(*period),
                    CellValue::from(*value),
                ]
            })
            .collect(),
    )
    .expect("long dataset")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_columns(dataset: &TabularDataset) -> Vec<String> {
        dataset.columns().to_vec()
    }

    #[test]
    fn completeness_counts_nulls_over_all_columns() {
        let dataset = long_dataset(&[
            ("ANC 4th visit", "2016/17", Some(38.0)),
            ("ANC 4th visit", "2017/18", None),
        ]);
        let outcome = check_completeness(
            &dataset,
            "anc",
            &all_columns(&dataset),
            &QualityThresholds::default(),
        );
        assert!(!outcome.passed);
        assert!((outcome.score - 5.0 / 6.0).abs() < 1e-9);
        assert_eq!(outcome.facts.len(), 3);
        assert!(outcome.facts[0].passed());
        assert!(!outcome.facts[2].passed());
        assert_eq!(outcome.facts[2].failure_count, Some(1));
    }

    #[test]
    fn completeness_at_exactly_the_threshold_fails() {
        let mut rows = vec![("Deliveries in unit", "2016/17", Some(1.0)); 19];
        rows.push(("Deliveries in unit", "2016/17", None));
        let dataset = long_dataset(&rows);
        let outcome = check_completeness(
            &dataset,
            "t",
            &[VALUE_COLUMN.to_string()],
            &QualityThresholds::default(),
        );
        assert!(!outcome.passed);
        assert!(!outcome.facts[0].passed());
    }

    #[test]
    fn completeness_notes_absent_columns() {
        let dataset = long_dataset(&[("Deliveries in unit", "2016/17", Some(1.0))]);
        let outcome = check_completeness(
            &dataset,
            "t",
            &["location".to_string()],
            &QualityThresholds::default(),
        );
        assert!(outcome.passed);
        assert_eq!(outcome.details["absent_columns"][0], "location");
        assert!(outcome.facts.is_empty());
    }

    #[test]
    fn validity_flags_negatives_and_infinities() {
        let dataset = long_dataset(&[
            ("Deliveries in unit", "2016/17", Some(-1.0)),
            ("Deliveries in unit", "2017/18", Some(f64::INFINITY)),
            ("Deliveries in unit", "2018/19", Some(5.0)),
        ]);
        let outcome = check_validity(&dataset, "t", &QualityThresholds::default());
        assert!(!outcome.passed);
        assert_eq!(outcome.facts.len(), 3);
        assert!(outcome.facts.iter().all(|fact| !fact.passed()));
        assert_eq!(outcome.score, 0.0);
    }

    #[test]
    fn validity_is_vacuous_without_numeric_values() {
        let text = TabularDataset::from_rows(
            vec!["indicator".to_string(), VALUE_COLUMN.to_string()],
            vec![vec![CellValue::text("Deliveries"), CellValue::text("n/a")]],
        )
        .unwrap();
        let outcome = check_validity(&text, "t", &QualityThresholds::default());
        assert!(outcome.passed);
        assert_eq!(outcome.score, 1.0);
        assert!(outcome.facts.is_empty());

        let no_value = TabularDataset::new(vec!["indicator".to_string()]).unwrap();
        assert!(check_validity(&no_value, "t", &QualityThresholds::default()).passed);
    }

    #[test]
    fn consistency_checks_duplicates_and_period_format() {
        let dataset = long_dataset(&[
            ("Deliveries in unit", "2016/17", Some(1.0)),
            ("Deliveries in unit", "2016/17", Some(1.0)),
            ("Deliveries in unit", "2017", Some(2.0)),
        ]);
        let outcome = check_consistency(&dataset, "t", &QualityThresholds::default());
        assert!(!outcome.passed);
        assert_eq!(outcome.facts[0].failure_count, Some(1));
        assert_eq!(outcome.facts[1].column_name.as_deref(), Some("period_label"));
        assert!(!outcome.facts[1].passed());
        assert_eq!(outcome.score, 0.0);
    }

    #[test]
    fn uniqueness_counts_repeats_after_the_first() {
        let dataset = long_dataset(&[
            ("Deliveries in unit", "2016/17", Some(1.0)),
            ("Deliveries in unit", "2016/17", Some(2.0)),
            ("Deliveries in unit", "2016/17", Some(5.0)),
            ("Deliveries in unit", "2017/18", Some(3.0)),
            ("ANC 4th visit", "2016/17", Some(4.0)),
        ]);
        let outcome = check_uniqueness(&dataset, "t");
        assert!(!outcome.passed);
        assert_eq!(outcome.facts[0].failure_count, Some(2));
        assert_eq!(outcome.details["duplicate_keys"], 2);
        assert!((outcome.score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn uniqueness_without_key_columns_is_skipped() {
        let dataset = TabularDataset::from_rows(
            vec![VALUE_COLUMN.to_string()],
            vec![vec![CellValue::Number(1.0)], vec![CellValue::Number(1.0)]],
        )
        .unwrap();
        let outcome = check_uniqueness(&dataset, "t");
        assert!(outcome.passed);
        assert_eq!(outcome.score, 1.0);
        assert_eq!(outcome.details["skipped"], "no_key_columns");
    }

    #[test]
    fn data_types_compare_first_and_midpoint_rows() {
        let dataset = TabularDataset::from_rows(
            vec!["indicator".to_string(), VALUE_COLUMN.to_string()],
            vec![
                vec![CellValue::text("a"), CellValue::Number(1.0)],
                vec![CellValue::Number(7.0), CellValue::Number(2.0)],
                vec![CellValue::Number(8.0), CellValue::Missing],
            ],
        )
        .unwrap();
        let outcome = check_data_types(&dataset, "t");
        assert!(!outcome.passed);
        assert_eq!(outcome.details["mixed_type_columns"][0], "indicator");
        assert!((outcome.score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn missing_cells_never_count_as_a_kind_change() {
        assert!(!kind_changed(&CellValue::Missing, &CellValue::Number(1.0)));
        assert!(!kind_changed(&CellValue::text("a"), &CellValue::Missing));
        assert!(kind_changed(&CellValue::text("a"), &CellValue::Number(1.0)));
    }
}
