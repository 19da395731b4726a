use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use hsi_model::{
    FieldLineage, FieldLineageRecord, FileId, PipelineRun, QualityCheck, QualityCheckRecord,
    RunCounts, RunId, SourceFileCatalogEntry, SourceFileDescriptor,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;
use tracing::debug;

use super::ObservabilityStore;
use crate::error::{ObserveError, Result};

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS pipeline_runs (
        run_id            TEXT PRIMARY KEY,
        pipeline_name     TEXT NOT NULL,
        pipeline_stage    TEXT NOT NULL,
        source_file       TEXT,
        metadata          TEXT,
        status            TEXT NOT NULL,
        started_at        TEXT NOT NULL,
        completed_at      TEXT,
        duration_seconds  REAL,
        records_input     INTEGER NOT NULL DEFAULT 0,
        records_processed INTEGER NOT NULL DEFAULT 0,
        records_loaded    INTEGER NOT NULL DEFAULT 0,
        records_rejected  INTEGER NOT NULL DEFAULT 0,
        error_message     TEXT,
        error_details     TEXT
    );
    CREATE TABLE IF NOT EXISTS data_quality_metrics (
        metric_id        INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id           TEXT NOT NULL REFERENCES pipeline_runs(run_id),
        check_name       TEXT NOT NULL,
        check_category   TEXT NOT NULL,
        table_name       TEXT,
        column_name      TEXT,
        passed           INTEGER NOT NULL,
        metric_value     REAL NOT NULL,
        threshold_value  REAL NOT NULL,
        comparator       TEXT NOT NULL,
        row_count        INTEGER,
        failure_count    INTEGER,
        details          TEXT,
        recorded_at      TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS field_lineage (
        lineage_id           INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id               TEXT NOT NULL REFERENCES pipeline_runs(run_id),
        target_table         TEXT NOT NULL,
        target_column        TEXT NOT NULL,
        source_file          TEXT NOT NULL,
        source_sheet         TEXT,
        source_column        TEXT NOT NULL,
        transformation_type  TEXT NOT NULL,
        transformation_logic TEXT NOT NULL,
        recorded_at          TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS source_files (
        file_id          INTEGER PRIMARY KEY AUTOINCREMENT,
        file_path        TEXT NOT NULL UNIQUE,
        file_name        TEXT NOT NULL,
        file_hash        TEXT NOT NULL,
        file_size_bytes  INTEGER NOT NULL,
        sheet_count      INTEGER,
        row_count        INTEGER,
        column_count     INTEGER,
        schema_snapshot  TEXT,
        status           TEXT NOT NULL,
        first_seen       TEXT NOT NULL,
        last_processed   TEXT NOT NULL,
        processing_count INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_quality_run ON data_quality_metrics(run_id);
    CREATE INDEX IF NOT EXISTS idx_lineage_run ON field_lineage(run_id);
"#;

const RUN_COLUMNS: &str = "run_id, pipeline_name, pipeline_stage, source_file, metadata, status, \
     started_at, completed_at, duration_seconds, records_input, records_processed, \
     records_loaded, records_rejected, error_message, error_details";

const FILE_COLUMNS: &str = "file_id, file_path, file_name, file_hash, file_size_bytes, \
     sheet_count, row_count, column_count, schema_snapshot, status, first_seen, \
     last_processed, processing_count";

/// SQLite-backed store. Timestamps are RFC 3339 text, JSON payloads are text.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file, creating parent directories and
    /// the schema as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ObserveError::io("create directory", parent, e))?;
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened observability database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| ObserveError::Timestamp {
            value: value.to_string(),
        })
}

fn json_text(value: Option<&Value>) -> Result<Option<String>> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map_err(ObserveError::from)
}

fn parse_json(value: Option<String>) -> Result<Option<Value>> {
    value
        .map(|text| serde_json::from_str(&text))
        .transpose()
        .map_err(ObserveError::from)
}

fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Raw `pipeline_runs` row, converted outside the rusqlite row callback.
struct RunRow {
    run_id: String,
    pipeline_name: String,
    pipeline_stage: String,
    source_file: Option<String>,
    metadata: Option<String>,
    status: String,
    started_at: String,
    completed_at: Option<String>,
    duration_seconds: Option<f64>,
    counts: [i64; 4],
    error_message: Option<String>,
    error_details: Option<String>,
}

impl RunRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get(0)?,
            pipeline_name: row.get(1)?,
            pipeline_stage: row.get(2)?,
            source_file: row.get(3)?,
            metadata: row.get(4)?,
            status: row.get(5)?,
            started_at: row.get(6)?,
            completed_at: row.get(7)?,
            duration_seconds: row.get(8)?,
            counts: [row.get(9)?, row.get(10)?, row.get(11)?, row.get(12)?],
            error_message: row.get(13)?,
            error_details: row.get(14)?,
        })
    }

    fn into_run(self) -> Result<PipelineRun> {
        let [input, processed, loaded, rejected] = self.counts.map(from_sql_count);
        Ok(PipelineRun {
            run_id: self.run_id.parse()?,
            pipeline_name: self.pipeline_name,
            pipeline_stage: self.pipeline_stage,
            source_file: self.source_file,
            metadata: parse_json(self.metadata)?,
            status: self.status.parse()?,
            started_at: parse_timestamp(&self.started_at)?,
            completed_at: self
                .completed_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            duration_seconds: self.duration_seconds,
            counts: RunCounts {
                input,
                processed,
                loaded,
                rejected,
            },
            error_message: self.error_message,
            error_details: parse_json(self.error_details)?,
        })
    }
}

struct CheckRow {
    check_name: String,
    category: String,
    table_name: Option<String>,
    column_name: Option<String>,
    metric_value: f64,
    threshold_value: f64,
    comparator: String,
    row_count: Option<i64>,
    failure_count: Option<i64>,
    details: Option<String>,
    recorded_at: String,
}

impl CheckRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            check_name: row.get(0)?,
            category: row.get(1)?,
            table_name: row.get(2)?,
            column_name: row.get(3)?,
            metric_value: row.get(4)?,
            threshold_value: row.get(5)?,
            comparator: row.get(6)?,
            row_count: row.get(7)?,
            failure_count: row.get(8)?,
            details: row.get(9)?,
            recorded_at: row.get(10)?,
        })
    }

    fn into_record(self, run_id: RunId) -> Result<QualityCheckRecord> {
        // Rebuilding through `evaluate` re-derives `passed` from the stored metric.
        let mut check = QualityCheck::evaluate(
            self.check_name,
            self.category.parse()?,
            self.metric_value,
            self.threshold_value,
            self.comparator.parse()?,
        );
        check.table_name = self.table_name;
        check.column_name = self.column_name;
        check.row_count = self.row_count.map(from_sql_count);
        check.failure_count = self.failure_count.map(from_sql_count);
        check.details = parse_json(self.details)?;
        Ok(QualityCheckRecord {
            run_id,
            recorded_at: parse_timestamp(&self.recorded_at)?,
            check,
        })
    }
}

struct LineageRow {
    target_table: String,
    target_column: String,
    source_file: String,
    source_sheet: Option<String>,
    source_column: String,
    transformation_type: String,
    transformation_logic: String,
    recorded_at: String,
}

impl LineageRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            target_table: row.get(0)?,
            target_column: row.get(1)?,
            source_file: row.get(2)?,
            source_sheet: row.get(3)?,
            source_column: row.get(4)?,
            transformation_type: row.get(5)?,
            transformation_logic: row.get(6)?,
            recorded_at: row.get(7)?,
        })
    }

    fn into_record(self, run_id: RunId) -> Result<FieldLineageRecord> {
        Ok(FieldLineageRecord {
            run_id,
            recorded_at: parse_timestamp(&self.recorded_at)?,
            lineage: FieldLineage {
                target_table: self.target_table,
                target_column: self.target_column,
                source_file: self.source_file,
                source_sheet: self.source_sheet,
                source_column: self.source_column,
                transformation_type: self.transformation_type.parse()?,
                transformation_logic: self.transformation_logic,
            },
        })
    }
}

struct FileRow {
    file_id: i64,
    file_path: String,
    file_name: String,
    file_hash: String,
    file_size_bytes: i64,
    sheet_count: Option<i64>,
    row_count: Option<i64>,
    column_count: Option<i64>,
    schema_snapshot: Option<String>,
    status: String,
    first_seen: String,
    last_processed: String,
    processing_count: i64,
}

impl FileRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            file_id: row.get(0)?,
            file_path: row.get(1)?,
            file_name: row.get(2)?,
            file_hash: row.get(3)?,
            file_size_bytes: row.get(4)?,
            sheet_count: row.get(5)?,
            row_count: row.get(6)?,
            column_count: row.get(7)?,
            schema_snapshot: row.get(8)?,
            status: row.get(9)?,
            first_seen: row.get(10)?,
            last_processed: row.get(11)?,
            processing_count: row.get(12)?,
        })
    }

    fn into_entry(self) -> Result<SourceFileCatalogEntry> {
        Ok(SourceFileCatalogEntry {
            file_id: FileId(self.file_id),
            first_seen: parse_timestamp(&self.first_seen)?,
            last_processed: parse_timestamp(&self.last_processed)?,
            processing_count: from_sql_count(self.processing_count),
            file: SourceFileDescriptor {
                file_path: self.file_path,
                file_name: self.file_name,
                fingerprint: self.file_hash,
                file_size_bytes: from_sql_count(self.file_size_bytes),
                sheet_count: self.sheet_count.map(from_sql_count),
                row_count: self.row_count.map(from_sql_count),
                column_count: self.column_count.map(from_sql_count),
                schema_snapshot: parse_json(self.schema_snapshot)?,
                status: self.status.parse()?,
            },
        })
    }
}

impl ObservabilityStore for SqliteStore {
    fn insert_run(&self, run: &PipelineRun) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO pipeline_runs ({RUN_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                run.run_id.to_string(),
                run.pipeline_name,
                run.pipeline_stage,
                run.source_file,
                json_text(run.metadata.as_ref())?,
                run.status.as_str(),
                timestamp(&run.started_at),
                run.completed_at.as_ref().map(timestamp),
                run.duration_seconds,
                to_sql_count(run.counts.input),
                to_sql_count(run.counts.processed),
                to_sql_count(run.counts.loaded),
                to_sql_count(run.counts.rejected),
                run.error_message,
                json_text(run.error_details.as_ref())?,
            ],
        )?;
        Ok(())
    }

    fn update_run(&self, run: &PipelineRun) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE pipeline_runs SET status = ?2, completed_at = ?3, duration_seconds = ?4, \
             records_input = ?5, records_processed = ?6, records_loaded = ?7, \
             records_rejected = ?8, error_message = ?9, error_details = ?10, metadata = ?11 \
             WHERE run_id = ?1",
            params![
                run.run_id.to_string(),
                run.status.as_str(),
                run.completed_at.as_ref().map(timestamp),
                run.duration_seconds,
                to_sql_count(run.counts.input),
                to_sql_count(run.counts.processed),
                to_sql_count(run.counts.loaded),
                to_sql_count(run.counts.rejected),
                run.error_message,
                json_text(run.error_details.as_ref())?,
                json_text(run.metadata.as_ref())?,
            ],
        )?;
        if changed == 0 {
            return Err(ObserveError::UnknownRun { run_id: run.run_id });
        }
        Ok(())
    }

    fn get_run(&self, run_id: RunId) -> Result<Option<PipelineRun>> {
        self.conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM pipeline_runs WHERE run_id = ?1"),
                params![run_id.to_string()],
                RunRow::read,
            )
            .optional()?
            .map(RunRow::into_run)
            .transpose()
    }

    fn recent_runs(&self, limit: usize) -> Result<Vec<PipelineRun>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM pipeline_runs ORDER BY started_at DESC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], RunRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RunRow::into_run).collect()
    }

    fn insert_quality_check(&self, record: &QualityCheckRecord) -> Result<()> {
        let check = &record.check;
        self.conn.execute(
            "INSERT INTO data_quality_metrics (run_id, check_name, check_category, table_name, \
             column_name, passed, metric_value, threshold_value, comparator, row_count, \
             failure_count, details, recorded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                record.run_id.to_string(),
                check.check_name,
                check.category.as_str(),
                check.table_name,
                check.column_name,
                check.passed(),
                check.metric_value(),
                check.threshold_value(),
                check.comparator().as_str(),
                check.row_count.map(to_sql_count),
                check.failure_count.map(to_sql_count),
                json_text(check.details.as_ref())?,
                timestamp(&record.recorded_at),
            ],
        )?;
        Ok(())
    }

    fn quality_checks(&self, run_id: RunId) -> Result<Vec<QualityCheckRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT check_name, check_category, table_name, column_name, metric_value, \
             threshold_value, comparator, row_count, failure_count, details, recorded_at \
             FROM data_quality_metrics WHERE run_id = ?1 ORDER BY metric_id",
        )?;
        let rows = stmt
            .query_map(params![run_id.to_string()], CheckRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|row| row.into_record(run_id))
            .collect()
    }

    fn insert_lineage(&self, record: &FieldLineageRecord) -> Result<()> {
        let lineage = &record.lineage;
        self.conn.execute(
            "INSERT INTO field_lineage (run_id, target_table, target_column, source_file, \
             source_sheet, source_column, transformation_type, transformation_logic, recorded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.run_id.to_string(),
                lineage.target_table,
                lineage.target_column,
                lineage.source_file,
                lineage.source_sheet,
                lineage.source_column,
                lineage.transformation_type.as_str(),
                lineage.transformation_logic,
                timestamp(&record.recorded_at),
            ],
        )?;
        Ok(())
    }

    fn lineage(&self, run_id: RunId) -> Result<Vec<FieldLineageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT target_table, target_column, source_file, source_sheet, source_column, \
             transformation_type, transformation_logic, recorded_at \
             FROM field_lineage WHERE run_id = ?1 ORDER BY lineage_id",
        )?;
        let rows = stmt
            .query_map(params![run_id.to_string()], LineageRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|row| row.into_record(run_id))
            .collect()
    }

    fn find_source_file(&self, file_path: &str) -> Result<Option<SourceFileCatalogEntry>> {
        self.conn
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM source_files WHERE file_path = ?1"),
                params![file_path],
                FileRow::read,
            )
            .optional()?
            .map(FileRow::into_entry)
            .transpose()
    }

    fn insert_source_file(
        &self,
        file: &SourceFileDescriptor,
        seen_at: DateTime<Utc>,
    ) -> Result<FileId> {
        let seen = timestamp(&seen_at);
        self.conn.execute(
            "INSERT INTO source_files (file_path, file_name, file_hash, file_size_bytes, \
             sheet_count, row_count, column_count, schema_snapshot, status, first_seen, \
             last_processed, processing_count) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10, 1)",
            params![
                file.file_path,
                file.file_name,
                file.fingerprint,
                to_sql_count(file.file_size_bytes),
                file.sheet_count.map(to_sql_count),
                file.row_count.map(to_sql_count),
                file.column_count.map(to_sql_count),
                json_text(file.schema_snapshot.as_ref())?,
                file.status.as_str(),
                seen,
            ],
        )?;
        Ok(FileId(self.conn.last_insert_rowid()))
    }

    fn touch_source_file(&self, file_id: FileId, processed_at: DateTime<Utc>) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE source_files SET last_processed = ?2, processing_count = processing_count + 1 \
             WHERE file_id = ?1",
            params![file_id.0, timestamp(&processed_at)],
        )?;
        ensure_file_updated(changed, file_id)
    }

    fn replace_source_file(
        &self,
        file_id: FileId,
        file: &SourceFileDescriptor,
        processed_at: DateTime<Utc>,
    ) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE source_files SET file_path = ?2, file_name = ?3, file_hash = ?4, \
             file_size_bytes = ?5, sheet_count = ?6, row_count = ?7, column_count = ?8, \
             schema_snapshot = ?9, status = ?10, last_processed = ?11, \
             processing_count = processing_count + 1 \
             WHERE file_id = ?1",
            params![
                file_id.0,
                file.file_path,
                file.file_name,
                file.fingerprint,
                to_sql_count(file.file_size_bytes),
                file.sheet_count.map(to_sql_count),
                file.row_count.map(to_sql_count),
                file.column_count.map(to_sql_count),
                json_text(file.schema_snapshot.as_ref())?,
                file.status.as_str(),
                timestamp(&processed_at),
            ],
        )?;
        ensure_file_updated(changed, file_id)
    }

    fn source_files(&self) -> Result<Vec<SourceFileCatalogEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM source_files ORDER BY file_path"
        ))?;
        let rows = stmt
            .query_map([], FileRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(FileRow::into_entry).collect()
    }

    fn quality_score(&self, run_id: RunId) -> Result<Option<f64>> {
        let score: Option<f64> = self.conn.query_row(
            "SELECT AVG(passed) * 100.0 FROM data_quality_metrics WHERE run_id = ?1",
            params![run_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(score)
    }
}

fn ensure_file_updated(changed: usize, file_id: FileId) -> Result<()> {
    if changed == 0 {
        return Err(ObserveError::Storage {
            message: format!("source file {file_id} not found"),
        });
    }
    Ok(())
}
