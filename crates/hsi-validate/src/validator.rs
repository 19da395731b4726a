use hsi_model::TabularDataset;
use hsi_observe::RunTracker;
use tracing::debug;

use crate::checks::{
    VALUE_COLUMN, check_completeness, check_consistency, check_data_types, check_uniqueness,
    check_validity, period_column,
};
use crate::health::{check_indicator_names, check_year_range};
use crate::summary::ValidationSummary;
use crate::thresholds::QualityThresholds;

/// Stateless validator over configurable thresholds.
#[derive(Debug, Clone, Default)]
pub struct QualityValidator {
    thresholds: QualityThresholds,
}

impl QualityValidator {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// Run the five composite checks.
    ///
    /// `critical_columns` limits completeness; `None` means every column.
    pub fn run_checks(
        &self,
        dataset: &TabularDataset,
        table_name: &str,
        critical_columns: Option<&[String]>,
    ) -> (bool, ValidationSummary) {
        let all_columns;
        let columns = match critical_columns {
            Some(columns) => columns,
            None => {
                all_columns = dataset.columns().to_vec();
                &all_columns
            }
        };

        let outcomes = vec![
            check_completeness(dataset, table_name, columns, &self.thresholds),
            check_validity(dataset, table_name, &self.thresholds),
            check_consistency(dataset, table_name, &self.thresholds),
            check_uniqueness(dataset, table_name),
            check_data_types(dataset, table_name),
        ];
        let summary = ValidationSummary::new(table_name, outcomes);

        debug!(
            table = table_name,
            rows = dataset.height(),
            all_passed = summary.all_passed,
            score = summary.overall_score,
            "quality checks evaluated"
        );
        (summary.all_passed, summary)
    }

    /// Composite checks over the indicator/period/value columns, plus the
    /// indicator-name and year-range checks (recorded, not scored).
    pub fn validate_health_data(
        &self,
        dataset: &TabularDataset,
        table_name: &str,
    ) -> (bool, ValidationSummary) {
        let critical: Vec<String> = ["indicator"]
            .into_iter()
            .chain(period_column(dataset))
            .chain([VALUE_COLUMN])
            .filter(|name| dataset.has_column(name))
            .map(str::to_string)
            .collect();

        let (all_passed, mut summary) = self.run_checks(dataset, table_name, Some(&critical));
        summary.supplementary.extend(
            check_indicator_names(dataset, table_name, &self.thresholds)
                .into_iter()
                .chain(check_year_range(dataset, table_name, &self.thresholds)),
        );
        (all_passed, summary)
    }

    /// [`Self::validate_health_data`] with every fact recorded against the
    /// tracker's active run, check names scoped to `unit` when given.
    pub fn validate_and_record(
        &self,
        dataset: &TabularDataset,
        table_name: &str,
        unit: Option<&str>,
        tracker: &RunTracker<'_>,
    ) -> hsi_observe::Result<(bool, ValidationSummary)> {
        let (all_passed, summary) = self.validate_health_data(dataset, table_name);
        summary.record(tracker, unit)?;
        Ok((all_passed, summary))
    }
}
