use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use hsi_ingest::{IngestError, list_csv_files, read_raw_sheet, registration_for, write_clean_csv};
use hsi_model::{RunCounts, RunFailure, RunId, RunStatus};
use hsi_observe::{
    FileChange, ObservabilityStore, ObserveError, RunSession, RunSpec, RunTracker, SessionError,
    SourceFileRegistry, SqliteStore, summarize_run,
};
use hsi_transform::{BatchTally, TransformEngine, TransformError, TransformOptions, settle_sheets};
use hsi_validate::{QualityThresholds, QualityValidator};
use serde_json::json;
use thiserror::Error;
use tracing::{info, info_span, warn};

use crate::cli::{FilesArgs, RunArgs, RunsArgs, SummaryArgs};
use crate::config::PipelineConfig;
use crate::summary::{print_catalog, print_run_summary, print_runs};
use crate::types::{BatchResult, FileResult, SheetLine};

/// Everything one `hsi run` needs, after config and flags are merged.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub pipeline_name: String,
    pub raw_dir: PathBuf,
    pub clean_dir: PathBuf,
    pub database: PathBuf,
    pub dry_run: bool,
    pub transform: TransformOptions,
    pub quality: QualityThresholds,
}

impl RunSettings {
    /// Flags win over the config file.
    pub fn resolve(config: PipelineConfig, args: &RunArgs) -> Self {
        let mut transform = config.transform;
        if args.no_fail_on_quality_errors {
            transform.fail_on_quality_errors = false;
        }
        Self {
            pipeline_name: config.pipeline_name,
            raw_dir: args.raw_dir.clone().unwrap_or(config.raw_dir),
            clean_dir: args.clean_dir.clone().unwrap_or(config.clean_dir),
            database: args.database.clone().unwrap_or(config.database),
            dry_run: args.dry_run,
            transform,
            quality: config.quality,
        }
    }
}

/// Failure confined to one source file.
#[derive(Debug, Error)]
pub enum FileError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    /// The source file could not be read for fingerprinting.
    #[error("fingerprint source: {0}")]
    Source(#[source] ObserveError),

    #[error(transparent)]
    Observe(#[from] ObserveError),
}

impl FileError {
    /// Registry errors reading the file are confined to it; store errors are not.
    fn from_registration(error: ObserveError) -> Self {
        match error {
            ObserveError::Io { .. } => Self::Source(error),
            other => Self::Observe(other),
        }
    }
}

struct FileWork {
    change: FileChange,
    sheets: Vec<SheetLine>,
    outputs: Vec<PathBuf>,
}

pub fn run_pipeline(config: PipelineConfig, args: &RunArgs) -> Result<BatchResult> {
    let settings = RunSettings::resolve(config, args);
    let store = SqliteStore::open(&settings.database)
        .with_context(|| format!("open database: {}", settings.database.display()))?;
    run_batch(&store, &settings)
}

/// Process every raw file under one `batch` run, each file in its own run.
pub fn run_batch(store: &dyn ObservabilityStore, settings: &RunSettings) -> Result<BatchResult> {
    let batch_span = info_span!("batch", pipeline = %settings.pipeline_name);
    let _batch_guard = batch_span.enter();
    let batch_start = Instant::now();

    let mut batch_tracker = RunTracker::new(store);
    let spec = RunSpec::new(&settings.pipeline_name, "batch")
        .with_source_file(settings.raw_dir.display().to_string())
        .with_metadata(json!({
            "raw_dir": settings.raw_dir.display().to_string(),
            "clean_dir": settings.clean_dir.display().to_string(),
            "dry_run": settings.dry_run,
            "fail_on_quality_errors": settings.transform.fail_on_quality_errors,
        }));
    let mut batch = RunSession::begin(&mut batch_tracker, spec).context("start batch run")?;
    let batch_run_id = batch.run_id();

    let files = match list_csv_files(&settings.raw_dir) {
        Ok(files) => files,
        Err(error) => {
            let failure = RunFailure::from_error(&error);
            batch.fail(failure).context("record batch failure")?;
            return Err(error).context("discover raw files");
        }
    };
    info!(file_count = files.len(), raw_dir = %settings.raw_dir.display(), "discovered raw files");

    let engine = TransformEngine::new(
        settings.transform.clone(),
        QualityValidator::new(settings.quality.clone()),
    );
    let mut tally = BatchTally::new();
    let mut results = Vec::with_capacity(files.len());
    for path in &files {
        let result = match process_file(store, &engine, settings, batch_run_id, path) {
            Ok(result) => result,
            Err(error) => {
                let failure = RunFailure::new("Observability", format!("{error:#}"));
                batch.fail(failure).context("record batch failure")?;
                return Err(error);
            }
        };
        tally.record(&result.file_name, result.status, result.counts);
        results.push(result);
    }

    batch.settle(tally.outcome());
    let batch_run = batch.finish().context("complete batch run")?;
    info!(
        run_id = %batch_run.run_id,
        status = %batch_run.status,
        files = results.len(),
        records_loaded = batch_run.counts.loaded,
        duration_ms = batch_start.elapsed().as_millis(),
        "batch complete"
    );

    Ok(BatchResult {
        batch: batch_run,
        files: results,
        clean_dir: settings.clean_dir.clone(),
        dry_run: settings.dry_run,
        all_failed: tally.all_failed(),
    })
}

/// One file in its own observed run. Errors only when observability itself
/// breaks; file-level failures come back as a failed [`FileResult`].
fn process_file(
    store: &dyn ObservabilityStore,
    engine: &TransformEngine,
    settings: &RunSettings,
    batch_run_id: RunId,
    path: &Path,
) -> Result<FileResult> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let file_span = info_span!("file", file = %file_name);
    let _file_guard = file_span.enter();
    let file_start = Instant::now();

    let mut tracker = RunTracker::new(store);
    let spec = RunSpec::new(&settings.pipeline_name, "transform")
        .with_source_file(path.display().to_string())
        .with_metadata(json!({ "batch_run_id": batch_run_id.to_string() }));

    let observed = tracker.observe(spec, |session| -> Result<FileWork, FileError> {
        let sheet = read_raw_sheet(path)?;
        let sheets = vec![sheet];
        let registry = SourceFileRegistry::new(session.tracker().store());
        let registered = registry
            .register(path, registration_for(&sheets))
            .map_err(FileError::from_registration)?;

        let reports = engine.process_sheets(session.tracker(), &file_name, &sheets)?;
        let mut outputs = Vec::new();
        if !settings.dry_run {
            for report in &reports {
                if let Some(dataset) = report.loaded_dataset() {
                    outputs.push(write_clean_csv(&settings.clean_dir, &report.sheet, dataset)?);
                }
            }
        }
        session.settle(settle_sheets(&reports));
        Ok(FileWork {
            change: registered.change,
            sheets: reports.iter().map(SheetLine::from_report).collect(),
            outputs,
        })
    });

    match observed {
        Ok((work, run)) => {
            info!(
                status = %run.status,
                records_loaded = run.counts.loaded,
                records_rejected = run.counts.rejected,
                duration_ms = file_start.elapsed().as_millis(),
                "file complete"
            );
            Ok(FileResult {
                file_name,
                run_id: Some(run.run_id),
                status: run.status,
                counts: run.counts,
                change: Some(work.change),
                sheets: work.sheets,
                outputs: work.outputs,
                error: None,
            })
        }
        Err(SessionError::Work(FileError::Observe(error)))
        | Err(SessionError::Work(FileError::Transform(TransformError::Observe(error))))
        | Err(SessionError::Observe(error)) => {
            Err(anyhow::Error::new(error).context(format!("record observability for {file_name}")))
        }
        Err(SessionError::Work(error)) => {
            warn!(error = %error, "file failed");
            Ok(FileResult {
                file_name,
                run_id: tracker.last_run_id(),
                status: RunStatus::Failed,
                counts: RunCounts::default(),
                change: None,
                sheets: Vec::new(),
                outputs: Vec::new(),
                error: Some(error.to_string()),
            })
        }
    }
}

fn database_path(config: &PipelineConfig, flag: Option<&PathBuf>) -> PathBuf {
    flag.cloned().unwrap_or_else(|| config.database.clone())
}

fn open_existing(path: &Path) -> Result<SqliteStore> {
    if !path.is_file() {
        return Err(anyhow!("database not found: {}", path.display()));
    }
    SqliteStore::open(path).with_context(|| format!("open database: {}", path.display()))
}

pub fn run_summary(config: &PipelineConfig, args: &SummaryArgs) -> Result<()> {
    let store = open_existing(&database_path(config, args.database.as_ref()))?;
    let run_id: RunId = args
        .run_id
        .parse()
        .with_context(|| format!("invalid run id: {}", args.run_id))?;
    let summary = summarize_run(&store, run_id).context("summarize run")?;
    print_run_summary(&summary);
    Ok(())
}

pub fn run_runs(config: &PipelineConfig, args: &RunsArgs) -> Result<()> {
    let store = open_existing(&database_path(config, args.database.as_ref()))?;
    let runs = store.recent_runs(args.limit).context("list runs")?;
    print_runs(&runs);
    Ok(())
}

pub fn run_files(config: &PipelineConfig, args: &FilesArgs) -> Result<()> {
    let store = open_existing(&database_path(config, args.database.as_ref()))?;
    let files = store.source_files().context("list source files")?;
    print_catalog(&files);
    Ok(())
}
