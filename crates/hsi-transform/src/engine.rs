use hsi_model::{RunCounts, RunFailure, TabularDataset, TransformationType};
use hsi_observe::{LineageRecorder, RunOutcome, RunTracker};
use hsi_validate::{GatingDecision, QualityValidator, ValidationSummary, gate_load};
use serde_json::json;
use tracing::{info, info_span, warn};

use crate::error::{Result, TransformError};
use crate::header::resolve_header;
use crate::normalize::{Rejection, normalize};
use crate::options::TransformOptions;
use crate::unpivot::{ColumnRoles, INDICATOR_COLUMN, PERIOD_COLUMN, VALUE_COLUMN, unpivot};

/// One extracted sheet of a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub dataset: TabularDataset,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, dataset: TabularDataset) -> Self {
        Self {
            name: name.into(),
            dataset,
        }
    }
}

/// A cleaned sheet and how it got there.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanOutput {
    pub dataset: TabularDataset,
    /// Data row promoted to header, if any.
    pub header_row: Option<usize>,
    pub roles: ColumnRoles,
    /// Rows of the raw sheet.
    pub input_rows: usize,
    /// Rows produced by the unpivot, before filtering.
    pub unpivoted_rows: usize,
    pub dropped_missing: usize,
    pub rejections: Vec<Rejection>,
}

impl CleanOutput {
    fn empty(input_rows: usize, header_row: Option<usize>, columns: &[String]) -> Self {
        Self {
            dataset: TabularDataset::default(),
            header_row,
            roles: ColumnRoles::classify(columns),
            input_rows,
            unpivoted_rows: 0,
            dropped_missing: 0,
            rejections: Vec::new(),
        }
    }

    /// Counters for this sheet; `loaded` counts only rows actually promoted.
    pub fn counts(&self, loaded: bool) -> RunCounts {
        RunCounts {
            input: self.input_rows as u64,
            processed: self.unpivoted_rows as u64,
            loaded: if loaded { self.dataset.height() as u64 } else { 0 },
            rejected: self.rejections.len() as u64,
        }
    }
}

#[derive(Debug)]
pub enum SheetOutcome {
    Loaded {
        output: CleanOutput,
        validation: ValidationSummary,
    },
    /// Nothing left after cleaning.
    Empty { output: CleanOutput },
    /// Cleaned, but blocked by the quality gate.
    Gated {
        output: CleanOutput,
        validation: ValidationSummary,
        decision: GatingDecision,
    },
    Failed { error: TransformError },
}

#[derive(Debug)]
pub struct SheetReport {
    pub sheet: String,
    pub counts: RunCounts,
    pub outcome: SheetOutcome,
}

impl SheetReport {
    /// Cleaned rows ready to write, when the sheet was loaded.
    pub fn loaded_dataset(&self) -> Option<&TabularDataset> {
        match &self.outcome {
            SheetOutcome::Loaded { output, .. } => Some(&output.dataset),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, SheetOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransformEngine {
    options: TransformOptions,
    validator: QualityValidator,
}

impl TransformEngine {
    pub fn new(options: TransformOptions, validator: QualityValidator) -> Self {
        Self { options, validator }
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Clean one raw sheet into long format.
    pub fn clean(&self, raw: &TabularDataset) -> Result<CleanOutput> {
        let resolved = resolve_header(raw, &self.options)?;
        let headed = resolved.dataset;
        if headed.is_empty() || headed.width() == 0 {
            return Ok(CleanOutput::empty(
                raw.height(),
                resolved.header_row,
                headed.columns(),
            ));
        }

        let roles = ColumnRoles::classify(headed.columns());
        let long = unpivot(&headed, &roles)?;
        let unpivoted_rows = long.height();
        let normalized = normalize(long)?;

        Ok(CleanOutput {
            dataset: normalized.dataset,
            header_row: resolved.header_row,
            roles,
            input_rows: raw.height(),
            unpivoted_rows,
            dropped_missing: normalized.dropped_missing,
            rejections: normalized.rejections,
        })
    }

    /// Clean, trace, validate, and gate every sheet of one source file.
    ///
    /// Sheet-level failures are reported in the returned list and do not stop
    /// the remaining sheets. Observability failures abort with an error.
    pub fn process_sheets(
        &self,
        tracker: &RunTracker<'_>,
        source_file: &str,
        sheets: &[RawSheet],
    ) -> Result<Vec<SheetReport>> {
        let mut reports = Vec::with_capacity(sheets.len());
        for sheet in sheets {
            let span = info_span!("sheet", sheet = %sheet.name, source_file);
            let _guard = span.enter();
            reports.push(self.process_sheet(tracker, source_file, sheet)?);
        }
        Ok(reports)
    }

    fn process_sheet(
        &self,
        tracker: &RunTracker<'_>,
        source_file: &str,
        sheet: &RawSheet,
    ) -> Result<SheetReport> {
        let output = match self.clean(&sheet.dataset) {
            Ok(output) => output,
            Err(error) if error.is_unit_level() => {
                warn!(error = %error, kind = error.kind(), "sheet failed to clean; skipping");
                return Ok(SheetReport {
                    sheet: sheet.name.clone(),
                    counts: RunCounts {
                        input: sheet.dataset.height() as u64,
                        ..RunCounts::default()
                    },
                    outcome: SheetOutcome::Failed { error },
                });
            }
            Err(error) => return Err(error),
        };

        for rejection in &output.rejections {
            warn!(
                row = rejection.row,
                column = %rejection.column,
                raw_value = %rejection.raw_value,
                reason = %rejection.reason,
                "value rejected"
            );
        }

        if output.dataset.is_empty() {
            info!(input_rows = output.input_rows, "sheet has no values after cleaning");
            return Ok(SheetReport {
                sheet: sheet.name.clone(),
                counts: output.counts(false),
                outcome: SheetOutcome::Empty { output },
            });
        }

        self.record_lineage(tracker, source_file, &sheet.name, &output.roles)?;

        let table = self.options.target_table.as_str();
        let (all_passed, validation) = self.validator.validate_and_record(
            &output.dataset,
            table,
            Some(&sheet.name),
            tracker,
        )?;
        let decision = gate_load(&validation, self.options.fail_on_quality_errors);

        info!(
            input_rows = output.input_rows,
            unpivoted_rows = output.unpivoted_rows,
            output_rows = output.dataset.height(),
            dropped_missing = output.dropped_missing,
            rejected = output.rejections.len(),
            quality_score = validation.overall_score,
            all_passed,
            "sheet cleaned"
        );

        if decision.block_load {
            warn!(blocking_checks = ?decision.blocking_checks, "sheet blocked by quality gate");
            return Ok(SheetReport {
                sheet: sheet.name.clone(),
                counts: output.counts(false),
                outcome: SheetOutcome::Gated {
                    output,
                    validation,
                    decision,
                },
            });
        }

        Ok(SheetReport {
            sheet: sheet.name.clone(),
            counts: output.counts(true),
            outcome: SheetOutcome::Loaded { output, validation },
        })
    }

    fn record_lineage(
        &self,
        tracker: &RunTracker<'_>,
        source_file: &str,
        sheet: &str,
        roles: &ColumnRoles,
    ) -> Result<()> {
        let recorder = LineageRecorder::new(
            tracker,
            self.options.target_table.as_str(),
            source_file,
            Some(sheet.to_string()),
        );
        let targets = roles.output_columns();
        for (source, target) in roles.identifiers.iter().zip(targets.iter()) {
            let logic = if target == INDICATOR_COLUMN {
                "first identifier column, whitespace trimmed"
            } else {
                "identifier column, whitespace trimmed"
            };
            recorder.record(target, source, TransformationType::DirectCopy, logic)?;
        }
        for period in &roles.periods {
            recorder.record(
                PERIOD_COLUMN,
                period,
                TransformationType::Derived,
                "period column header becomes the period label",
            )?;
            recorder.record(
                VALUE_COLUMN,
                period,
                TransformationType::Unpivot,
                "period column cells melted into rows; thousands separators stripped, coerced to number",
            )?;
        }
        Ok(())
    }
}

/// Terminal outcome of a file run from its sheet reports.
///
/// Failed when any sheet failed, success when rows were loaded, skipped when
/// every sheet was empty or gated. Gated sheets are listed in the details
/// whatever the status.
pub fn settle_sheets(reports: &[SheetReport]) -> RunOutcome {
    let mut counts = RunCounts::default();
    for report in reports {
        counts.absorb(report.counts);
    }

    let failed: Vec<_> = reports
        .iter()
        .filter_map(|report| match &report.outcome {
            SheetOutcome::Failed { error } => Some(json!({
                "sheet": report.sheet,
                "error": error.to_string(),
                "kind": error.kind(),
            })),
            _ => None,
        })
        .collect();
    let gated: Vec<_> = reports
        .iter()
        .filter_map(|report| match &report.outcome {
            SheetOutcome::Gated { decision, .. } => Some(json!({
                "sheet": report.sheet,
                "blocking_checks": decision.blocking_checks,
            })),
            _ => None,
        })
        .collect();

    if !failed.is_empty() {
        let kind = if failed.len() == reports.len() {
            "AllUnitsFailed"
        } else {
            "PartialFailure"
        };
        let failure = RunFailure::new(
            kind,
            format!("{} of {} sheets failed", failed.len(), reports.len()),
        )
        .with_details(json!({ "failed_sheets": failed, "gated_sheets": gated }));
        return RunOutcome::failed(counts, failure);
    }

    let mut outcome = if counts.loaded > 0 {
        RunOutcome::success(counts)
    } else {
        RunOutcome::skipped(counts)
    };
    if !gated.is_empty() {
        outcome.failure = Some(
            RunFailure::new(
                "QualityGate",
                format!("{} of {} sheets blocked by quality checks", gated.len(), reports.len()),
            )
            .with_details(json!({ "gated_sheets": gated })),
        );
    }
    outcome
}
