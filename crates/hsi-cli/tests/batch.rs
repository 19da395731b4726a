use std::fs;
use std::path::Path;

use hsi_cli::commands::{RunSettings, run_batch};
use hsi_cli::config::PipelineConfig;
use hsi_model::RunStatus;
use hsi_observe::{FileChange, MemoryStore, ObservabilityStore};
use tempfile::TempDir;

const ANC: &str = "Ministry of Health annual report,,\n\
                   ,,\n\
                   Indicator,2016/17,2017/18\n\
                   ANC 4th visit coverage,38,41\n\
                   Deliveries in health unit,\"1,234\",N/A\n";

fn settings(raw: &Path, clean: &Path) -> RunSettings {
    let config = PipelineConfig::default();
    RunSettings {
        pipeline_name: config.pipeline_name,
        raw_dir: raw.to_path_buf(),
        clean_dir: clean.to_path_buf(),
        database: clean.join("observability.db"),
        dry_run: false,
        transform: config.transform,
        quality: config.quality,
    }
}

fn raw_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in files {
        fs::write(dir.path().join(name), content).unwrap();
    }
    dir
}

#[test]
fn mixed_batch_is_a_partial_failure() {
    let raw = raw_dir(&[
        ("anc.csv", ANC),
        ("blank.csv", ""),
        ("broken.csv", "Indicator,Region\nDeliveries,Central\n"),
    ]);
    let clean = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();

    let result = run_batch(&store, &settings(raw.path(), clean.path())).unwrap();

    let statuses: Vec<_> = result
        .files
        .iter()
        .map(|file| (file.file_name.as_str(), file.status))
        .collect();
    assert_eq!(
        statuses,
        [
            ("anc.csv", RunStatus::Success),
            ("blank.csv", RunStatus::Skipped),
            ("broken.csv", RunStatus::Failed),
        ]
    );
    assert_eq!(result.batch.status, RunStatus::Failed);
    assert_eq!(
        result.batch.error_details.as_ref().unwrap()["error_kind"],
        "PartialFailure"
    );
    assert!(!result.all_failed);
    assert_eq!(result.batch.counts.loaded, 3);
    assert_eq!(result.batch.counts.rejected, 1);

    assert!(clean.path().join("anc_clean.csv").is_file());
    assert!(!clean.path().join("blank_clean.csv").exists());
    assert_eq!(result.files[0].outputs, [clean.path().join("anc_clean.csv")]);

    let runs = store.recent_runs(10).unwrap();
    assert_eq!(runs.len(), 4);
    let batch_id = result.batch.run_id.to_string();
    let file_runs: Vec<_> = runs
        .iter()
        .filter(|run| run.pipeline_stage == "transform")
        .collect();
    assert_eq!(file_runs.len(), 3);
    assert!(
        file_runs
            .iter()
            .all(|run| run.metadata.as_ref().unwrap()["batch_run_id"] == batch_id.as_str())
    );

    let anc_run = result.files[0].run_id.unwrap();
    assert_eq!(store.quality_score(anc_run).unwrap(), Some(100.0));
    assert_eq!(store.source_files().unwrap().len(), 3);
}

#[test]
fn every_file_failing_fails_the_batch() {
    let raw = raw_dir(&[
        ("a.csv", "Indicator,Region\nDeliveries,Central\n"),
        ("b.csv", "Indicator\nANC\n"),
    ]);
    let clean = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();

    let result = run_batch(&store, &settings(raw.path(), clean.path())).unwrap();
    assert!(result.all_failed);
    assert_eq!(
        result.batch.error_details.as_ref().unwrap()["error_kind"],
        "AllUnitsFailed"
    );
}

#[test]
fn empty_raw_directory_is_skipped() {
    let raw = raw_dir(&[]);
    let clean = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();

    let result = run_batch(&store, &settings(raw.path(), clean.path())).unwrap();
    assert_eq!(result.batch.status, RunStatus::Skipped);
    assert!(result.files.is_empty());
    assert!(!result.all_failed);
}

#[test]
fn missing_raw_directory_fails_the_batch_run() {
    let raw = tempfile::tempdir().unwrap();
    let clean = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();

    let error = run_batch(&store, &settings(&raw.path().join("absent"), clean.path())).unwrap_err();
    assert!(format!("{error:#}").contains("directory not found"));

    let runs = store.recent_runs(1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert_eq!(runs[0].pipeline_stage, "batch");
}

#[test]
fn dry_run_writes_nothing() {
    let raw = raw_dir(&[("anc.csv", ANC)]);
    let clean = tempfile::tempdir().unwrap();
    let out = clean.path().join("out");
    let store = MemoryStore::new();

    let mut settings = settings(raw.path(), &out);
    settings.dry_run = true;
    let result = run_batch(&store, &settings).unwrap();
    assert_eq!(result.batch.status, RunStatus::Success);
    assert!(result.files[0].outputs.is_empty());
    assert!(!out.exists());
}

#[test]
fn quality_gate_blocks_and_flag_releases() {
    let raw = raw_dir(&[(
        "stock.csv",
        "Indicator,2016/17,2017/18\nNet change in stock,-4,3\n",
    )]);
    let clean = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();

    let strict = run_batch(&store, &settings(raw.path(), clean.path())).unwrap();
    assert_eq!(strict.files[0].status, RunStatus::Skipped);
    assert_eq!(strict.files[0].sheets[0].outcome, "gated");
    assert!(!clean.path().join("stock_clean.csv").exists());

    let mut permissive = settings(raw.path(), clean.path());
    permissive.transform.fail_on_quality_errors = false;
    let result = run_batch(&store, &permissive).unwrap();
    assert_eq!(result.files[0].status, RunStatus::Success);
    assert!(clean.path().join("stock_clean.csv").is_file());
}

#[test]
fn reruns_detect_source_changes() {
    let raw = raw_dir(&[("anc.csv", ANC)]);
    let clean = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let settings = settings(raw.path(), clean.path());

    let first = run_batch(&store, &settings).unwrap();
    assert_eq!(first.files[0].change, Some(FileChange::New));

    let second = run_batch(&store, &settings).unwrap();
    assert_eq!(second.files[0].change, Some(FileChange::Unchanged));

    fs::write(raw.path().join("anc.csv"), format!("{ANC}Stock-outs,7,9\n")).unwrap();
    let third = run_batch(&store, &settings).unwrap();
    assert_eq!(third.files[0].change, Some(FileChange::Changed));

    let catalog = store.source_files().unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].processing_count, 3);
}

#[test]
fn batch_outcomes_per_sheet() {
    let raw = raw_dir(&[
        ("anc.csv", ANC),
        ("blank.csv", ""),
        ("broken.csv", "Indicator,Region\nDeliveries,Central\n"),
    ]);
    let clean = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let result = run_batch(&store, &settings(raw.path(), clean.path())).unwrap();

    let lines: Vec<String> = result
        .files
        .iter()
        .flat_map(|file| {
            file.sheets.iter().map(move |sheet| {
                format!(
                    "{} [{}] {}: input={} loaded={} rejected={} detail={}",
                    file.file_name,
                    file.status,
                    sheet.outcome,
                    sheet.counts.input,
                    sheet.counts.loaded,
                    sheet.counts.rejected,
                    sheet.detail.as_deref().unwrap_or("-"),
                )
            })
        })
        .collect();
    insta::assert_snapshot!(lines.join("\n"), @r#"
    anc.csv [success] loaded: input=4 loaded=3 rejected=1 detail=-
    blank.csv [skipped] empty: input=0 loaded=0 rejected=0 detail=-
    broken.csv [failed] failed: input=1 loaded=0 rejected=0 detail=no period columns found among ["Indicator", "Region"]
    "#);
}
