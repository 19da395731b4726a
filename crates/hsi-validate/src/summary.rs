use std::collections::BTreeSet;
use std::fmt;

use hsi_model::{CheckCategory, QualityCheck};
use hsi_observe::RunTracker;
use serde::Serialize;
use serde_json::Value;

/// The five composite checks that make up the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Completeness,
    Validity,
    Consistency,
    Uniqueness,
    DataTypes,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completeness => "completeness",
            Self::Validity => "validity",
            Self::Consistency => "consistency",
            Self::Uniqueness => "uniqueness",
            Self::DataTypes => "data_types",
        }
    }

    /// Kinds whose failure can block loading.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Completeness | Self::Validity)
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one composite check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub kind: CheckKind,
    pub passed: bool,
    /// Always within `[0, 1]`.
    pub score: f64,
    pub details: Value,
    /// The individual facts this outcome was built from.
    pub facts: Vec<QualityCheck>,
}

impl CheckOutcome {
    /// Composite over boolean sub-facts: passes when all pass, scores the
    /// passing share, and is vacuously perfect when there are none.
    pub(crate) fn from_facts(kind: CheckKind, facts: Vec<QualityCheck>, mut details: Value) -> Self {
        let run = facts.len();
        let passed_count = facts.iter().filter(|fact| fact.passed()).count();
        if let Value::Object(map) = &mut details {
            map.insert("checks_run".to_string(), run.into());
            map.insert("checks_passed".to_string(), passed_count.into());
        }
        Self {
            kind,
            passed: passed_count == run,
            score: if run == 0 {
                1.0
            } else {
                passed_count as f64 / run as f64
            },
            details,
            facts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub table_name: String,
    pub all_passed: bool,
    /// Mean composite score, 0-100.
    pub overall_score: f64,
    pub outcomes: Vec<CheckOutcome>,
    /// Extra facts recorded alongside the composites but not scored.
    pub supplementary: Vec<QualityCheck>,
}

impl ValidationSummary {
    pub(crate) fn new(table_name: &str, outcomes: Vec<CheckOutcome>) -> Self {
        let all_passed = outcomes.iter().all(|outcome| outcome.passed);
        let overall_score = if outcomes.is_empty() {
            100.0
        } else {
            outcomes.iter().map(|outcome| outcome.score).sum::<f64>() / outcomes.len() as f64
                * 100.0
        };
        Self {
            table_name: table_name.to_string(),
            all_passed,
            overall_score,
            outcomes,
            supplementary: Vec::new(),
        }
    }

    pub fn checks_run(&self) -> usize {
        self.outcomes.len()
    }

    pub fn checks_passed(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.passed).count()
    }

    pub fn checks_failed(&self) -> usize {
        self.checks_run() - self.checks_passed()
    }

    pub fn outcome(&self, kind: CheckKind) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|outcome| outcome.kind == kind)
    }

    /// Every fact in recording order: composites first, then supplementary.
    pub fn facts(&self) -> impl Iterator<Item = &QualityCheck> {
        self.outcomes
            .iter()
            .flat_map(|outcome| outcome.facts.iter())
            .chain(self.supplementary.iter())
    }

    pub fn failed_facts(&self) -> impl Iterator<Item = &QualityCheck> {
        self.facts().filter(|fact| !fact.passed())
    }

    pub fn failed_categories(&self) -> BTreeSet<CheckCategory> {
        self.failed_facts().map(|fact| fact.category).collect()
    }

    /// Persist every fact against the tracker's active run.
    ///
    /// With a `unit`, check names are recorded as `{unit}.{check_name}` so
    /// several units validated in one run keep distinct facts.
    pub fn record(&self, tracker: &RunTracker<'_>, unit: Option<&str>) -> hsi_observe::Result<()> {
        for fact in self.facts() {
            let mut fact = fact.clone();
            if let Some(unit) = unit {
                fact.check_name = format!("{unit}.{}", fact.check_name);
            }
            tracker.log_quality_check(fact)?;
        }
        Ok(())
    }
}
