//! Run lifecycle tracking.
//!
//! A [`RunTracker`] holds at most one active run. Quality checks and lineage
//! can only be recorded while a run is active, so every fact points at a run
//! that exists. [`RunSession`] scopes a run to a unit of work and guarantees a
//! terminal status on every exit path.

use std::time::Instant;

use chrono::Utc;
use hsi_model::{
    FieldLineage, FieldLineageRecord, PipelineRun, QualityCheck, QualityCheckRecord, RunCounts,
    RunFailure, RunId, RunStatus,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::{ObserveError, Result};
use crate::store::ObservabilityStore;

/// Identity of a run about to start.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSpec {
    pub pipeline_name: String,
    pub pipeline_stage: String,
    pub source_file: Option<String>,
    pub metadata: Option<Value>,
}

impl RunSpec {
    pub fn new(pipeline_name: impl Into<String>, pipeline_stage: impl Into<String>) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            pipeline_stage: pipeline_stage.into(),
            source_file: None,
            metadata: None,
        }
    }

    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub counts: RunCounts,
    pub failure: Option<RunFailure>,
}

impl RunOutcome {
    pub fn success(counts: RunCounts) -> Self {
        Self {
            status: RunStatus::Success,
            counts,
            failure: None,
        }
    }

    pub fn skipped(counts: RunCounts) -> Self {
        Self {
            status: RunStatus::Skipped,
            counts,
            failure: None,
        }
    }

    pub fn failed(counts: RunCounts, failure: RunFailure) -> Self {
        Self {
            status: RunStatus::Failed,
            counts,
            failure: Some(failure),
        }
    }
}

struct ActiveRun {
    run: PipelineRun,
    clock: Instant,
}

pub struct RunTracker<'s> {
    store: &'s dyn ObservabilityStore,
    active: Option<ActiveRun>,
    last_run_id: Option<RunId>,
}

impl<'s> RunTracker<'s> {
    pub fn new(store: &'s dyn ObservabilityStore) -> Self {
        Self {
            store,
            active: None,
            last_run_id: None,
        }
    }

    pub fn store(&self) -> &'s dyn ObservabilityStore {
        self.store
    }

    /// Start a run and persist it in the `running` state.
    pub fn start_run(&mut self, spec: RunSpec) -> Result<RunId> {
        if let Some(active) = &self.active {
            return Err(ObserveError::RunAlreadyActive {
                run_id: active.run.run_id,
            });
        }

        let run = PipelineRun::start(
            spec.pipeline_name,
            spec.pipeline_stage,
            spec.source_file,
            spec.metadata,
        );
        self.store.insert_run(&run)?;

        info!(
            run_id = %run.run_id,
            pipeline = %run.pipeline_name,
            stage = %run.pipeline_stage,
            source_file = run.source_file.as_deref().unwrap_or("-"),
            "run started"
        );

        let run_id = run.run_id;
        self.last_run_id = Some(run_id);
        self.active = Some(ActiveRun {
            run,
            clock: Instant::now(),
        });
        Ok(run_id)
    }

    /// Move the active run to its terminal status and persist it.
    ///
    /// A rejected outcome (a non-terminal status) leaves the run active. Once
    /// the transition is accepted the run is released, even when persisting
    /// fails.
    pub fn complete_run(&mut self, outcome: RunOutcome) -> Result<PipelineRun> {
        const NO_RUN: ObserveError = ObserveError::NoActiveRun {
            operation: "complete_run",
        };
        let active = self.active.as_mut().ok_or(NO_RUN)?;
        let duration = active.clock.elapsed().as_secs_f64();
        active.run.finish(
            outcome.status,
            outcome.counts,
            outcome.failure.as_ref(),
            Utc::now(),
            duration,
        )?;
        let run = self.active.take().map(|active| active.run).ok_or(NO_RUN)?;
        self.store.update_run(&run)?;

        let counts = run.counts;
        match run.status {
            RunStatus::Failed => warn!(
                run_id = %run.run_id,
                status = %run.status,
                duration_seconds = duration,
                error = run.error_message.as_deref().unwrap_or(""),
                "run failed"
            ),
            _ => info!(
                run_id = %run.run_id,
                status = %run.status,
                duration_seconds = duration,
                records_input = counts.input,
                records_loaded = counts.loaded,
                records_rejected = counts.rejected,
                "run completed"
            ),
        }
        Ok(run)
    }

    pub fn active_run_id(&self) -> Option<RunId> {
        self.active.as_ref().map(|active| active.run.run_id)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The most recently started run, active or not.
    pub fn last_run_id(&self) -> Option<RunId> {
        self.last_run_id
    }

    fn require_active(&self, operation: &'static str) -> Result<RunId> {
        self.active_run_id()
            .ok_or(ObserveError::NoActiveRun { operation })
    }

    /// Persist a quality fact against the active run.
    pub fn log_quality_check(&self, check: QualityCheck) -> Result<()> {
        let run_id = self.require_active("log_quality_check")?;
        if !check.passed() {
            warn!(
                run_id = %run_id,
                check = %check.check_name,
                category = %check.category,
                metric = check.metric_value(),
                threshold = check.threshold_value(),
                "quality check failed"
            );
        }
        self.store.insert_quality_check(&QualityCheckRecord {
            run_id,
            recorded_at: Utc::now(),
            check,
        })
    }

    /// Persist a lineage fact against the active run.
    pub fn track_lineage(&self, lineage: FieldLineage) -> Result<()> {
        let run_id = self.require_active("track_lineage")?;
        self.store.insert_lineage(&FieldLineageRecord {
            run_id,
            recorded_at: Utc::now(),
            lineage,
        })
    }

    /// Quality score of the most recent run.
    pub fn quality_score(&self) -> Result<Option<f64>> {
        match self.last_run_id {
            Some(run_id) => self.store.quality_score(run_id),
            None => Ok(None),
        }
    }

    /// Run `work` inside a session; see [`RunSession`].
    ///
    /// On success the run completes with the status the work settled on
    /// (success unless it marked the session otherwise). On error the run is
    /// recorded as failed with the error captured, and the error is returned
    /// unchanged inside [`SessionError::Work`].
    pub fn observe<T, E, F>(
        &mut self,
        spec: RunSpec,
        work: F,
    ) -> std::result::Result<(T, PipelineRun), SessionError<E>>
    where
        E: std::error::Error + 'static,
        F: FnOnce(&mut RunSession<'_, 's>) -> std::result::Result<T, E>,
    {
        let mut session = RunSession::begin(self, spec).map_err(SessionError::Observe)?;
        match work(&mut session) {
            Ok(value) => {
                let run = session.finish().map_err(SessionError::Observe)?;
                Ok((value, run))
            }
            Err(work_error) => {
                let failure = RunFailure::from_error(&work_error);
                if let Err(observe_error) = session.fail(failure) {
                    error!(error = %observe_error, "could not record run failure");
                }
                Err(SessionError::Work(work_error))
            }
        }
    }
}

/// Error from [`RunTracker::observe`]: either the tracked work failed, or
/// observability itself did.
#[derive(Debug, Error)]
pub enum SessionError<E>
where
    E: std::error::Error + 'static,
{
    #[error("observability failure: {0}")]
    Observe(#[source] ObserveError),

    #[error(transparent)]
    Work(E),
}

/// A run scoped to a unit of work.
///
/// Dropping a session that was never finished (early return, panic) records
/// the run as failed with kind `Abandoned`.
pub struct RunSession<'t, 's> {
    tracker: &'t mut RunTracker<'s>,
    run_id: RunId,
    counts: RunCounts,
    settled: Option<RunOutcome>,
    finished: bool,
}

impl<'t, 's> RunSession<'t, 's> {
    pub fn begin(tracker: &'t mut RunTracker<'s>, spec: RunSpec) -> Result<Self> {
        let run_id = tracker.start_run(spec)?;
        Ok(Self {
            tracker,
            run_id,
            counts: RunCounts::default(),
            settled: None,
            finished: false,
        })
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn tracker(&self) -> &RunTracker<'s> {
        &*self.tracker
    }

    pub fn counts(&self) -> RunCounts {
        self.counts
    }

    pub fn counts_mut(&mut self) -> &mut RunCounts {
        &mut self.counts
    }

    /// Choose the terminal status used when the session finishes normally.
    pub fn settle(&mut self, outcome: RunOutcome) {
        self.counts = outcome.counts;
        self.settled = Some(outcome);
    }

    pub fn log_quality_check(&self, check: QualityCheck) -> Result<()> {
        self.tracker.log_quality_check(check)
    }

    pub fn track_lineage(&self, lineage: FieldLineage) -> Result<()> {
        self.tracker.track_lineage(lineage)
    }

    /// Complete with the settled outcome, or success with the session counts.
    pub fn finish(mut self) -> Result<PipelineRun> {
        let outcome = self
            .settled
            .take()
            .unwrap_or_else(|| RunOutcome::success(self.counts));
        self.finished = true;
        self.tracker.complete_run(outcome)
    }

    pub fn fail(mut self, failure: RunFailure) -> Result<PipelineRun> {
        self.finished = true;
        self.tracker
            .complete_run(RunOutcome::failed(self.counts, failure))
    }
}

impl Drop for RunSession<'_, '_> {
    fn drop(&mut self) {
        if self.finished || self.tracker.active_run_id() != Some(self.run_id) {
            return;
        }
        let message = if std::thread::panicking() {
            "run abandoned during a panic"
        } else {
            "run abandoned before completion"
        };
        let outcome = RunOutcome::failed(self.counts, RunFailure::new("Abandoned", message));
        if let Err(observe_error) = self.tracker.complete_run(outcome) {
            error!(run_id = %self.run_id, error = %observe_error, "could not record abandoned run");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use hsi_model::CheckCategory;

    #[derive(Debug, Error)]
    #[error("sheet could not be parsed")]
    struct SheetError;

    #[test]
    fn lifecycle() {
        let store = MemoryStore::new();
        let mut tracker = RunTracker::new(&store);

        let run_id = tracker
            .start_run(RunSpec::new("health_etl", "transform").with_source_file("anc.csv"))
            .unwrap();
        assert_eq!(tracker.active_run_id(), Some(run_id));
        assert_eq!(
            store.get_run(run_id).unwrap().unwrap().status,
            RunStatus::Running
        );

        let counts = RunCounts {
            input: 5,
            processed: 5,
            loaded: 4,
            rejected: 1,
        };
        let run = tracker.complete_run(RunOutcome::success(counts)).unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert!(run.duration_seconds.unwrap() >= 0.0);
        assert!(!tracker.is_active());
        assert_eq!(store.get_run(run_id).unwrap().unwrap().counts, counts);
    }

    #[test]
    fn completing_without_a_run_is_an_error() {
        let store = MemoryStore::new();
        let mut tracker = RunTracker::new(&store);
        let error = tracker
            .complete_run(RunOutcome::success(RunCounts::default()))
            .unwrap_err();
        assert!(error.is_programming_error());
    }

    #[test]
    fn rejected_outcome_keeps_the_run_active() {
        let store = MemoryStore::new();
        let mut tracker = RunTracker::new(&store);
        let run_id = tracker.start_run(RunSpec::new("etl", "transform")).unwrap();

        let still_running = RunOutcome {
            status: RunStatus::Running,
            counts: RunCounts::default(),
            failure: None,
        };
        let error = tracker.complete_run(still_running).unwrap_err();
        assert!(matches!(error, ObserveError::Model(_)));
        assert_eq!(tracker.active_run_id(), Some(run_id));
        assert_eq!(
            store.get_run(run_id).unwrap().unwrap().status,
            RunStatus::Running
        );

        let run = tracker
            .complete_run(RunOutcome::success(RunCounts::default()))
            .unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert!(!tracker.is_active());
    }

    #[test]
    fn second_start_is_rejected() {
        let store = MemoryStore::new();
        let mut tracker = RunTracker::new(&store);
        tracker.start_run(RunSpec::new("etl", "a")).unwrap();
        assert!(matches!(
            tracker.start_run(RunSpec::new("etl", "b")),
            Err(ObserveError::RunAlreadyActive { .. })
        ));
    }

    #[test]
    fn facts_need_an_active_run() {
        let store = MemoryStore::new();
        let tracker = RunTracker::new(&store);
        let error = tracker
            .log_quality_check(QualityCheck::flag("x", CheckCategory::Validity, true))
            .unwrap_err();
        assert!(matches!(
            error,
            ObserveError::NoActiveRun {
                operation: "log_quality_check"
            }
        ));
    }

    #[test]
    fn observe_records_failures_and_returns_the_error() {
        let store = MemoryStore::new();
        let mut tracker = RunTracker::new(&store);

        let result: std::result::Result<((), PipelineRun), _> =
            tracker.observe(RunSpec::new("etl", "transform"), |session| {
                session.counts_mut().input = 3;
                Err(SheetError)
            });

        assert!(matches!(result, Err(SessionError::Work(SheetError))));
        let run_id = tracker.last_run_id().unwrap();
        let run = store.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.counts.input, 3);
        assert_eq!(run.error_message.as_deref(), Some("sheet could not be parsed"));
        assert_eq!(run.error_details.unwrap()["error_kind"], "SheetError");
        assert!(!tracker.is_active());
    }

    #[test]
    fn observe_uses_the_settled_outcome() {
        let store = MemoryStore::new();
        let mut tracker = RunTracker::new(&store);

        let (value, run) = tracker
            .observe(RunSpec::new("etl", "transform"), |session| {
                session.settle(RunOutcome::skipped(RunCounts::default()));
                Ok::<_, SheetError>(7)
            })
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(run.status, RunStatus::Skipped);
    }

    #[test]
    fn dropped_session_is_recorded_as_abandoned() {
        let store = MemoryStore::new();
        let mut tracker = RunTracker::new(&store);
        let run_id = {
            let session = RunSession::begin(&mut tracker, RunSpec::new("etl", "load")).unwrap();
            session.run_id()
        };

        let run = store.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_details.unwrap()["error_kind"], "Abandoned");
        assert!(!tracker.is_active());
    }

    #[test]
    fn quality_score_of_last_run() {
        let store = MemoryStore::new();
        let mut tracker = RunTracker::new(&store);
        assert_eq!(tracker.quality_score().unwrap(), None);

        tracker.start_run(RunSpec::new("etl", "validate")).unwrap();
        tracker
            .log_quality_check(QualityCheck::flag("a", CheckCategory::Validity, true))
            .unwrap();
        tracker
            .log_quality_check(QualityCheck::flag("b", CheckCategory::Validity, false))
            .unwrap();
        tracker
            .complete_run(RunOutcome::success(RunCounts::default()))
            .unwrap();

        assert_eq!(tracker.quality_score().unwrap(), Some(50.0));
    }
}
