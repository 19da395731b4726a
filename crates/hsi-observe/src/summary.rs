use std::collections::BTreeMap;

use hsi_model::{CheckCategory, PipelineRun, QualityCheckRecord, RunId};

use crate::error::{ObserveError, Result};
use crate::store::ObservabilityStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryTally {
    pub total: usize,
    pub passed: usize,
}

impl CategoryTally {
    pub fn failed(&self) -> usize {
        self.total - self.passed
    }
}

/// Rollup of one run: its record, per-category check tallies, the overall
/// quality score, and the failed checks.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run: PipelineRun,
    pub categories: BTreeMap<CheckCategory, CategoryTally>,
    pub quality_score: Option<f64>,
    pub failed_checks: Vec<QualityCheckRecord>,
    pub lineage_count: usize,
}

pub fn summarize_run(store: &dyn ObservabilityStore, run_id: RunId) -> Result<RunSummary> {
    let run = store
        .get_run(run_id)?
        .ok_or(ObserveError::UnknownRun { run_id })?;
    let checks = store.quality_checks(run_id)?;

    let mut categories: BTreeMap<CheckCategory, CategoryTally> = BTreeMap::new();
    for record in &checks {
        let tally = categories.entry(record.check.category).or_default();
        tally.total += 1;
        if record.check.passed() {
            tally.passed += 1;
        }
    }

    let quality_score = store.quality_score(run_id)?;
    let failed_checks = checks
        .into_iter()
        .filter(|record| !record.check.passed())
        .collect();
    let lineage_count = store.lineage(run_id)?.len();

    Ok(RunSummary {
        run,
        categories,
        quality_score,
        failed_checks,
        lineage_count,
    })
}
