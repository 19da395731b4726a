//! Persistence capability for observability facts.
//!
//! Four logical collections: pipeline runs, quality checks, field lineage,
//! and the source-file catalog. Quality and lineage records are append-only
//! and always reference an existing run. Each call is one write and is
//! committed on its own; failures surface to the caller and are never retried.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use hsi_model::{
    FieldLineageRecord, FileId, PipelineRun, QualityCheckRecord, RunId, SourceFileCatalogEntry,
    SourceFileDescriptor,
};

use crate::error::Result;

pub trait ObservabilityStore {
    fn insert_run(&self, run: &PipelineRun) -> Result<()>;

    /// Overwrite a stored run. Fails with `UnknownRun` if it was never inserted.
    fn update_run(&self, run: &PipelineRun) -> Result<()>;

    fn get_run(&self, run_id: RunId) -> Result<Option<PipelineRun>>;

    /// Most recently started runs first.
    fn recent_runs(&self, limit: usize) -> Result<Vec<PipelineRun>>;

    fn insert_quality_check(&self, record: &QualityCheckRecord) -> Result<()>;

    /// Quality checks of a run in recording order.
    fn quality_checks(&self, run_id: RunId) -> Result<Vec<QualityCheckRecord>>;

    fn insert_lineage(&self, record: &FieldLineageRecord) -> Result<()>;

    fn lineage(&self, run_id: RunId) -> Result<Vec<FieldLineageRecord>>;

    fn find_source_file(&self, file_path: &str) -> Result<Option<SourceFileCatalogEntry>>;

    /// Create a catalog entry with `processing_count = 1`.
    fn insert_source_file(
        &self,
        file: &SourceFileDescriptor,
        seen_at: DateTime<Utc>,
    ) -> Result<FileId>;

    /// Bump `last_processed` and `processing_count`, leaving content fields alone.
    fn touch_source_file(&self, file_id: FileId, processed_at: DateTime<Utc>) -> Result<()>;

    /// Overwrite the descriptor and bump `last_processed` and `processing_count`.
    fn replace_source_file(
        &self,
        file_id: FileId,
        file: &SourceFileDescriptor,
        processed_at: DateTime<Utc>,
    ) -> Result<()>;

    fn source_files(&self) -> Result<Vec<SourceFileCatalogEntry>>;

    /// Percentage of a run's quality checks that passed, or `None` when the
    /// run recorded no checks.
    fn quality_score(&self, run_id: RunId) -> Result<Option<f64>> {
        let checks = self.quality_checks(run_id)?;
        if checks.is_empty() {
            return Ok(None);
        }
        let passed = checks.iter().filter(|record| record.check.passed()).count();
        Ok(Some(passed as f64 / checks.len() as f64 * 100.0))
    }
}

#[cfg(test)]
pub(crate) mod conformance {
    //! Behaviour every store implementation must share.

    use super::ObservabilityStore;
    use chrono::{Duration, Utc};
    use hsi_model::{
        CheckCategory, FieldLineage, FieldLineageRecord, FileStatus, PipelineRun, QualityCheck,
        QualityCheckRecord, RunCounts, RunStatus, SourceFileDescriptor, TransformationType,
    };
    use serde_json::json;

    pub fn descriptor(path: &str, fingerprint: &str) -> SourceFileDescriptor {
        SourceFileDescriptor {
            file_path: path.to_string(),
            file_name: path.rsplit('/').next().unwrap_or(path).to_string(),
            fingerprint: fingerprint.to_string(),
            file_size_bytes: 42,
            sheet_count: Some(1),
            row_count: Some(10),
            column_count: Some(3),
            schema_snapshot: Some(json!({ "columns": ["Indicator", "2016/17"] })),
            status: FileStatus::Processed,
        }
    }

    pub fn runs_round_trip(store: &dyn ObservabilityStore) {
        let mut run = PipelineRun::start(
            "health_etl",
            "transform",
            Some("data/raw/anc.csv".to_string()),
            Some(json!({ "sheets": 2 })),
        );
        store.insert_run(&run).unwrap();

        let stored = store.get_run(run.run_id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Running);
        assert_eq!(stored.metadata, Some(json!({ "sheets": 2 })));

        let counts = RunCounts {
            input: 10,
            processed: 10,
            loaded: 8,
            rejected: 2,
        };
        run.finish(RunStatus::Success, counts, None, Utc::now(), 1.5)
            .unwrap();
        store.update_run(&run).unwrap();

        let stored = store.get_run(run.run_id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Success);
        assert_eq!(stored.counts, counts);
        assert_eq!(stored.duration_seconds, Some(1.5));
        assert!(stored.completed_at.is_some());
    }

    pub fn update_of_unknown_run_fails(store: &dyn ObservabilityStore) {
        let run = PipelineRun::start("health_etl", "transform", None, None);
        assert!(store.update_run(&run).is_err());
    }

    pub fn recent_runs_newest_first(store: &dyn ObservabilityStore) {
        let mut older = PipelineRun::start("health_etl", "batch", None, None);
        older.started_at = Utc::now() - Duration::minutes(5);
        let newer = PipelineRun::start("health_etl", "batch", None, None);
        store.insert_run(&older).unwrap();
        store.insert_run(&newer).unwrap();

        let runs = store.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, newer.run_id);
        assert_eq!(store.recent_runs(1).unwrap().len(), 1);
    }

    pub fn quality_checks_and_score(store: &dyn ObservabilityStore) {
        let run = PipelineRun::start("health_etl", "transform", None, None);
        store.insert_run(&run).unwrap();
        assert_eq!(store.quality_score(run.run_id).unwrap(), None);

        for (name, ok) in [("a", true), ("b", true), ("c", true), ("d", false)] {
            let check = QualityCheck::flag(name, CheckCategory::Validity, ok)
                .with_table("anc")
                .with_row_count(4)
                .with_details(json!({ "source": name }));
            store
                .insert_quality_check(&QualityCheckRecord {
                    run_id: run.run_id,
                    recorded_at: Utc::now(),
                    check,
                })
                .unwrap();
        }

        let checks = store.quality_checks(run.run_id).unwrap();
        assert_eq!(checks.len(), 4);
        assert_eq!(checks[0].check.check_name, "a");
        assert!(!checks[3].check.passed());
        assert_eq!(checks[0].check.table_name.as_deref(), Some("anc"));
        assert_eq!(checks[0].check.row_count, Some(4));
        assert_eq!(store.quality_score(run.run_id).unwrap(), Some(75.0));
    }

    pub fn lineage_round_trip(store: &dyn ObservabilityStore) {
        let run = PipelineRun::start("health_etl", "transform", None, None);
        store.insert_run(&run).unwrap();
        let lineage = FieldLineage {
            target_table: "fact_indicator_values".to_string(),
            target_column: "value".to_string(),
            source_file: "anc.csv".to_string(),
            source_sheet: Some("Sheet1".to_string()),
            source_column: "2016/17".to_string(),
            transformation_type: TransformationType::Unpivot,
            transformation_logic: "wide year columns to rows".to_string(),
        };
        store
            .insert_lineage(&FieldLineageRecord {
                run_id: run.run_id,
                recorded_at: Utc::now(),
                lineage: lineage.clone(),
            })
            .unwrap();

        let stored = store.lineage(run.run_id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].lineage, lineage);
    }

    pub fn source_file_lifecycle(store: &dyn ObservabilityStore) {
        let first = Utc::now() - Duration::hours(1);
        let id = store
            .insert_source_file(&descriptor("data/raw/anc.csv", "aaa"), first)
            .unwrap();

        let entry = store.find_source_file("data/raw/anc.csv").unwrap().unwrap();
        assert_eq!(entry.file_id, id);
        assert_eq!(entry.processing_count, 1);

        let later = Utc::now();
        store.touch_source_file(id, later).unwrap();
        let entry = store.find_source_file("data/raw/anc.csv").unwrap().unwrap();
        assert_eq!(entry.processing_count, 2);
        assert_eq!(entry.file.fingerprint, "aaa");

        let mut changed = descriptor("data/raw/anc.csv", "bbb");
        changed.status = FileStatus::Changed;
        store.replace_source_file(id, &changed, later).unwrap();
        let entry = store.find_source_file("data/raw/anc.csv").unwrap().unwrap();
        assert_eq!(entry.processing_count, 3);
        assert_eq!(entry.file.fingerprint, "bbb");
        assert_eq!(entry.file.status, FileStatus::Changed);

        assert!(store.find_source_file("missing.csv").unwrap().is_none());
        assert_eq!(store.source_files().unwrap().len(), 1);
    }
}
