use std::path::PathBuf;

use hsi_model::{PipelineRun, RunCounts, RunId, RunStatus};
use hsi_observe::FileChange;
use hsi_transform::{SheetOutcome, SheetReport};

/// One sheet as shown in the batch summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLine {
    pub sheet: String,
    /// `loaded`, `empty`, `gated`, or `failed`.
    pub outcome: &'static str,
    pub counts: RunCounts,
    pub quality_score: Option<f64>,
    pub detail: Option<String>,
}

impl SheetLine {
    pub fn from_report(report: &SheetReport) -> Self {
        let (outcome, quality_score, detail) = match &report.outcome {
            SheetOutcome::Loaded { validation, .. } => {
                ("loaded", Some(validation.overall_score), None)
            }
            SheetOutcome::Empty { .. } => ("empty", None, None),
            SheetOutcome::Gated {
                validation,
                decision,
                ..
            } => (
                "gated",
                Some(validation.overall_score),
                Some(decision.blocking_checks.join(", ")),
            ),
            SheetOutcome::Failed { error } => ("failed", None, Some(error.to_string())),
        };
        Self {
            sheet: report.sheet.clone(),
            outcome,
            counts: report.counts,
            quality_score,
            detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileResult {
    pub file_name: String,
    pub run_id: Option<RunId>,
    pub status: RunStatus,
    pub counts: RunCounts,
    pub change: Option<FileChange>,
    pub sheets: Vec<SheetLine>,
    pub outputs: Vec<PathBuf>,
    /// Why the whole file failed, when it did.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub batch: PipelineRun,
    pub files: Vec<FileResult>,
    pub clean_dir: PathBuf,
    pub dry_run: bool,
    pub all_failed: bool,
}
