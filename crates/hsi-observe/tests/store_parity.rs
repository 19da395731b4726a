//! Both store implementations must agree on derived values.

use chrono::Utc;
use hsi_model::{CheckCategory, Comparator, QualityCheck, RunCounts};
use hsi_observe::{
    MemoryStore, ObservabilityStore, RunOutcome, RunSpec, RunTracker, SqliteStore, summarize_run,
};
use proptest::prelude::*;

fn record_checks(store: &dyn ObservabilityStore, metrics: &[f64]) -> Option<f64> {
    let mut tracker = RunTracker::new(store);
    let run_id = tracker
        .start_run(RunSpec::new("health_etl", "validate"))
        .unwrap();
    for (i, metric) in metrics.iter().enumerate() {
        let check = QualityCheck::evaluate(
            format!("check_{i}"),
            CheckCategory::Validity,
            *metric,
            0.95,
            Comparator::GreaterThan,
        );
        tracker.log_quality_check(check).unwrap();
    }
    tracker
        .complete_run(RunOutcome::success(RunCounts::default()))
        .unwrap();
    store.quality_score(run_id).unwrap()
}

proptest! {
    #[test]
    fn quality_score_matches_pass_share(metrics in prop::collection::vec(0.0f64..=1.0, 0..20)) {
        let expected = if metrics.is_empty() {
            None
        } else {
            let passed = metrics.iter().filter(|m| **m > 0.95).count();
            Some(passed as f64 / metrics.len() as f64 * 100.0)
        };

        let memory = record_checks(&MemoryStore::new(), &metrics);
        let sqlite = record_checks(&SqliteStore::open_in_memory().unwrap(), &metrics);

        match (expected, memory, sqlite) {
            (None, None, None) => {}
            (Some(e), Some(m), Some(s)) => {
                prop_assert!((e - m).abs() < 1e-9);
                prop_assert!((e - s).abs() < 1e-9);
            }
            other => prop_assert!(false, "stores disagree: {:?}", other),
        }
    }
}

#[test]
fn failed_runs_survive_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("observability.db");

    let run_id = {
        let store = SqliteStore::open(&path).unwrap();
        let mut tracker = RunTracker::new(&store);
        let run_id = tracker
            .start_run(RunSpec::new("health_etl", "batch").with_source_file("data/raw"))
            .unwrap();
        tracker
            .complete_run(RunOutcome::failed(
                RunCounts::default(),
                hsi_model::RunFailure::new("AllUnitsFailed", "every file failed")
                    .with_details(serde_json::json!({ "failed_units": ["a.csv", "b.csv"] })),
            ))
            .unwrap();
        run_id
    };

    let store = SqliteStore::open(&path).unwrap();
    let summary = summarize_run(&store, run_id).unwrap();
    assert_eq!(summary.run.status, hsi_model::RunStatus::Failed);
    let details = summary.run.error_details.unwrap();
    assert_eq!(details["error_kind"], "AllUnitsFailed");
    assert_eq!(details["failed_units"][1], "b.csv");
    assert!(summary.run.completed_at.unwrap() <= Utc::now());
    assert_eq!(summary.quality_score, None);
}
