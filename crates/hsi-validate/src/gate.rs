use serde::Serialize;

use crate::summary::ValidationSummary;

/// Whether a validated dataset may be promoted to loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GatingDecision {
    pub block_load: bool,
    /// Names of the failed facts behind the block.
    pub blocking_checks: Vec<String>,
}

/// Block loading when a critical composite check (completeness or validity)
/// failed and gating is enabled.
pub fn gate_load(summary: &ValidationSummary, fail_on_quality_errors: bool) -> GatingDecision {
    if !fail_on_quality_errors {
        return GatingDecision::default();
    }
    let blocking: Vec<String> = summary
        .outcomes
        .iter()
        .filter(|outcome| outcome.kind.is_critical() && !outcome.passed)
        .flat_map(|outcome| {
            let failed: Vec<String> = outcome
                .facts
                .iter()
                .filter(|fact| !fact.passed())
                .map(|fact| fact.check_name.clone())
                .collect();
            if failed.is_empty() {
                vec![outcome.kind.as_str().to_string()]
            } else {
                failed
            }
        })
        .collect();
    GatingDecision {
        block_load: !blocking.is_empty(),
        blocking_checks: blocking,
    }
}
