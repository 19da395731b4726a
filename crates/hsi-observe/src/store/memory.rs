use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use hsi_model::{
    FieldLineageRecord, FileId, PipelineRun, QualityCheckRecord, RunId, SourceFileCatalogEntry,
    SourceFileDescriptor,
};

use super::ObservabilityStore;
use crate::error::{ObserveError, Result};

/// Process-local store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    runs: Vec<PipelineRun>,
    checks: Vec<QualityCheckRecord>,
    lineage: Vec<FieldLineageRecord>,
    files: Vec<SourceFileCatalogEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> ObserveError {
    ObserveError::Storage {
        message: "memory store lock poisoned".to_string(),
    }
}

fn missing_file(file_id: FileId) -> ObserveError {
    ObserveError::Storage {
        message: format!("source file {file_id} not found"),
    }
}

impl Tables {
    fn file_mut(&mut self, file_id: FileId) -> Result<&mut SourceFileCatalogEntry> {
        self.files
            .iter_mut()
            .find(|entry| entry.file_id == file_id)
            .ok_or_else(|| missing_file(file_id))
    }

    fn ensure_run(&self, run_id: RunId) -> Result<()> {
        if self.runs.iter().any(|run| run.run_id == run_id) {
            Ok(())
        } else {
            Err(ObserveError::UnknownRun { run_id })
        }
    }
}

impl ObservabilityStore for MemoryStore {
    fn insert_run(&self, run: &PipelineRun) -> Result<()> {
        self.write()?.runs.push(run.clone());
        Ok(())
    }

    fn update_run(&self, run: &PipelineRun) -> Result<()> {
        let mut tables = self.write()?;
        let slot = tables
            .runs
            .iter_mut()
            .find(|stored| stored.run_id == run.run_id)
            .ok_or(ObserveError::UnknownRun { run_id: run.run_id })?;
        *slot = run.clone();
        Ok(())
    }

    fn get_run(&self, run_id: RunId) -> Result<Option<PipelineRun>> {
        Ok(self
            .read()?
            .runs
            .iter()
            .find(|run| run.run_id == run_id)
            .cloned())
    }

    fn recent_runs(&self, limit: usize) -> Result<Vec<PipelineRun>> {
        let mut runs = self.read()?.runs.clone();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }

    fn insert_quality_check(&self, record: &QualityCheckRecord) -> Result<()> {
        let mut tables = self.write()?;
        tables.ensure_run(record.run_id)?;
        tables.checks.push(record.clone());
        Ok(())
    }

    fn quality_checks(&self, run_id: RunId) -> Result<Vec<QualityCheckRecord>> {
        Ok(self
            .read()?
            .checks
            .iter()
            .filter(|record| record.run_id == run_id)
            .cloned()
            .collect())
    }

    fn insert_lineage(&self, record: &FieldLineageRecord) -> Result<()> {
        let mut tables = self.write()?;
        tables.ensure_run(record.run_id)?;
        tables.lineage.push(record.clone());
        Ok(())
    }

    fn lineage(&self, run_id: RunId) -> Result<Vec<FieldLineageRecord>> {
        Ok(self
            .read()?
            .lineage
            .iter()
            .filter(|record| record.run_id == run_id)
            .cloned()
            .collect())
    }

    fn find_source_file(&self, file_path: &str) -> Result<Option<SourceFileCatalogEntry>> {
        Ok(self
            .read()?
            .files
            .iter()
            .find(|entry| entry.file.file_path == file_path)
            .cloned())
    }

    fn insert_source_file(
        &self,
        file: &SourceFileDescriptor,
        seen_at: DateTime<Utc>,
    ) -> Result<FileId> {
        let mut tables = self.write()?;
        if tables
            .files
            .iter()
            .any(|entry| entry.file.file_path == file.file_path)
        {
            return Err(ObserveError::Storage {
                message: format!("source file {} already registered", file.file_path),
            });
        }
        let file_id = FileId(tables.files.len() as i64 + 1);
        tables.files.push(SourceFileCatalogEntry {
            file_id,
            first_seen: seen_at,
            last_processed: seen_at,
            processing_count: 1,
            file: file.clone(),
        });
        Ok(file_id)
    }

    fn touch_source_file(&self, file_id: FileId, processed_at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.write()?;
        let entry = tables.file_mut(file_id)?;
        entry.last_processed = processed_at;
        entry.processing_count += 1;
        Ok(())
    }

    fn replace_source_file(
        &self,
        file_id: FileId,
        file: &SourceFileDescriptor,
        processed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.write()?;
        let entry = tables.file_mut(file_id)?;
        entry.file = file.clone();
        entry.last_processed = processed_at;
        entry.processing_count += 1;
        Ok(())
    }

    fn source_files(&self) -> Result<Vec<SourceFileCatalogEntry>> {
        Ok(self.read()?.files.clone())
    }
}
