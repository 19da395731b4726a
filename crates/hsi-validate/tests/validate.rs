use hsi_model::{CellValue, CheckCategory, RunCounts, TabularDataset};
use hsi_observe::{MemoryStore, ObservabilityStore, RunOutcome, RunSpec, RunTracker};
use hsi_validate::{CheckKind, QualityThresholds, QualityValidator, check_completeness};
use proptest::prelude::*;

fn cell_strategy() -> impl Strategy<Value = CellValue> {
    prop_oneof![
        Just(CellValue::Missing),
        (-10.0f64..1e4).prop_map(CellValue::Number),
        "[A-Za-z ]{0,12}".prop_map(CellValue::Text),
    ]
}

fn dataset_strategy() -> impl Strategy<Value = TabularDataset> {
    (1usize..5).prop_flat_map(|width| {
        prop::collection::vec(prop::collection::vec(cell_strategy(), width), 0..30).prop_map(
            move |rows| {
                let mut columns: Vec<String> = (0..width).map(|i| format!("col_{i}")).collect();
                columns[0] = "value".to_string();
                TabularDataset::from_rows(columns, rows).expect("rectangular rows")
            },
        )
    })
}

fn filled_cell_strategy() -> impl Strategy<Value = CellValue> + Clone {
    prop_oneof![
        (-10.0f64..1e4).prop_map(CellValue::Number),
        "[A-Za-z]{1,12}".prop_map(CellValue::Text),
    ]
}

fn sized_dataset<S>(cells: S) -> impl Strategy<Value = TabularDataset>
where
    S: Strategy<Value = CellValue> + Clone + 'static,
{
    (1usize..5).prop_flat_map(move |width| {
        prop::collection::vec(prop::collection::vec(cells.clone(), width), 1..30).prop_map(
            move |rows| {
                let columns: Vec<String> = (0..width).map(|i| format!("col_{i}")).collect();
                TabularDataset::from_rows(columns, rows).expect("rectangular rows")
            },
        )
    })
}

proptest! {
    #[test]
    fn completeness_is_perfect_without_nulls(dataset in sized_dataset(filled_cell_strategy())) {
        let columns = dataset.columns().to_vec();
        let outcome = check_completeness(&dataset, "t", &columns, &QualityThresholds::default());
        prop_assert_eq!(outcome.score, 1.0);
        prop_assert!(outcome.passed);
        prop_assert!(outcome.facts.iter().all(|fact| fact.passed()));
    }

    #[test]
    fn completeness_is_zero_when_every_cell_is_null(
        dataset in sized_dataset(Just(CellValue::Missing)),
    ) {
        let columns = dataset.columns().to_vec();
        let outcome = check_completeness(&dataset, "t", &columns, &QualityThresholds::default());
        prop_assert_eq!(outcome.score, 0.0);
        prop_assert!(!outcome.passed);
        prop_assert!(outcome.facts.iter().all(|fact| !fact.passed()));
    }

    #[test]
    fn completeness_score_is_bounded(dataset in dataset_strategy()) {
        let columns = dataset.columns().to_vec();
        let outcome = check_completeness(&dataset, "t", &columns, &QualityThresholds::default());
        prop_assert!((0.0..=1.0).contains(&outcome.score));
        if dataset.is_empty() {
            prop_assert!(outcome.passed);
        }
    }

    #[test]
    fn all_passed_is_the_conjunction(dataset in dataset_strategy()) {
        let (all_passed, summary) = QualityValidator::default().run_checks(&dataset, "t", None);
        prop_assert_eq!(all_passed, summary.outcomes.iter().all(|o| o.passed));
        prop_assert_eq!(summary.outcomes.len(), 5);
        prop_assert!((0.0..=100.0).contains(&summary.overall_score));
        for outcome in &summary.outcomes {
            prop_assert!((0.0..=1.0).contains(&outcome.score), "{} scored {}", outcome.kind, outcome.score);
        }
    }
}

#[test]
fn facts_are_recorded_against_the_active_run() {
    let dataset = TabularDataset::from_rows(
        vec!["indicator".into(), "period_label".into(), "value".into()],
        vec![
            vec![
                CellValue::text("Deliveries in unit"),
                CellValue::text("2016/17"),
                CellValue::Number(120.0),
            ],
            vec![
                CellValue::text("Deliveries in unit"),
                CellValue::text("2017/18"),
                CellValue::Number(-3.0),
            ],
        ],
    )
    .unwrap();

    let store = MemoryStore::new();
    let mut tracker = RunTracker::new(&store);
    let run_id = tracker
        .start_run(RunSpec::new("health_etl", "validate"))
        .unwrap();
    let (all_passed, summary) = QualityValidator::default()
        .validate_and_record(&dataset, "fact_indicator_values", None, &tracker)
        .unwrap();
    tracker
        .complete_run(RunOutcome::success(RunCounts::default()))
        .unwrap();

    assert!(!all_passed);
    assert!(!summary.outcome(CheckKind::Validity).unwrap().passed);

    let stored = store.quality_checks(run_id).unwrap();
    assert_eq!(stored.len(), summary.facts().count());
    assert!(
        stored
            .iter()
            .any(|r| r.check.check_name == "health_year_range_valid")
    );
    let failed: Vec<_> = stored
        .iter()
        .filter(|r| !r.check.passed())
        .map(|r| r.check.category)
        .collect();
    assert!(failed.contains(&CheckCategory::Validity));
}

#[test]
fn recording_needs_an_active_run() {
    let dataset = TabularDataset::new(vec!["value".into()]).unwrap();
    let store = MemoryStore::new();
    let tracker = RunTracker::new(&store);
    assert!(
        QualityValidator::default()
            .validate_and_record(&dataset, "t", None, &tracker)
            .is_err()
    );
}

#[test]
fn facts_recorded_for_a_unit_carry_its_name() {
    let dataset = TabularDataset::from_rows(
        vec!["indicator".into(), "period_label".into(), "value".into()],
        vec![vec![
            CellValue::text("Deliveries in unit"),
            CellValue::text("2016/17"),
            CellValue::Number(120.0),
        ]],
    )
    .unwrap();

    let store = MemoryStore::new();
    let mut tracker = RunTracker::new(&store);
    let run_id = tracker
        .start_run(RunSpec::new("health_etl", "validate"))
        .unwrap();
    let (_, summary) = QualityValidator::default()
        .validate_and_record(&dataset, "t", Some("central"), &tracker)
        .unwrap();

    let stored = store.quality_checks(run_id).unwrap();
    assert_eq!(stored.len(), summary.facts().count());
    assert!(
        stored
            .iter()
            .all(|r| r.check.check_name.starts_with("central."))
    );
    assert!(
        stored
            .iter()
            .any(|r| r.check.check_name == "central.completeness_value")
    );
}
