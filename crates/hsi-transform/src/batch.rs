use hsi_model::{RunCounts, RunFailure, RunStatus};
use hsi_observe::RunOutcome;
use serde_json::json;

/// Roll-up of per-file run results into the batch run outcome.
#[derive(Debug, Clone, Default)]
pub struct BatchTally {
    counts: RunCounts,
    succeeded: Vec<String>,
    skipped: Vec<String>,
    failed: Vec<String>,
}

impl BatchTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, unit: impl Into<String>, status: RunStatus, counts: RunCounts) {
        self.counts.absorb(counts);
        let unit = unit.into();
        match status {
            RunStatus::Success => self.succeeded.push(unit),
            RunStatus::Skipped => self.skipped.push(unit),
            // A unit still running when tallied was abandoned.
            RunStatus::Failed | RunStatus::Running => self.failed.push(unit),
        }
    }

    pub fn counts(&self) -> RunCounts {
        self.counts
    }

    pub fn units(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }

    pub fn failed_units(&self) -> &[String] {
        &self.failed
    }

    /// Every unit failed. Drives the non-zero exit code.
    pub fn all_failed(&self) -> bool {
        !self.failed.is_empty() && self.failed.len() == self.units()
    }

    /// Skipped with no units, failed when any unit failed, success otherwise.
    pub fn outcome(&self) -> RunOutcome {
        let units = self.units();
        if units == 0 {
            return RunOutcome::skipped(self.counts);
        }
        if self.failed.is_empty() {
            return RunOutcome::success(self.counts);
        }

        let kind = if self.all_failed() {
            "AllUnitsFailed"
        } else {
            "PartialFailure"
        };
        let failure = RunFailure::new(
            kind,
            format!("{} of {} files failed", self.failed.len(), units),
        )
        .with_details(json!({
            "failed_units": self.failed,
            "succeeded_units": self.succeeded.len(),
            "skipped_units": self.skipped.len(),
        }));
        RunOutcome::failed(self.counts, failure)
    }
}
