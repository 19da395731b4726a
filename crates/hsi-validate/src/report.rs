use std::fmt::Write;

use crate::summary::ValidationSummary;

fn status(passed: bool) -> &'static str {
    if passed { "[PASS]" } else { "[FAIL]" }
}

/// Human-readable validation report.
pub fn render_report(summary: &ValidationSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "DATA QUALITY VALIDATION REPORT: {}", summary.table_name);
    let _ = writeln!(
        out,
        "Checks run: {} | passed: {} | failed: {}",
        summary.checks_run(),
        summary.checks_passed(),
        summary.checks_failed()
    );
    let _ = writeln!(out, "Overall score: {:.1}/100", summary.overall_score);
    let _ = writeln!(
        out,
        "Status: {}",
        if summary.all_passed { "PASS" } else { "FAIL" }
    );

    out.push('\n');
    for outcome in &summary.outcomes {
        let _ = writeln!(
            out,
            "{} {}: {:.1}%",
            status(outcome.passed),
            outcome.kind,
            outcome.score * 100.0
        );
    }

    if !summary.supplementary.is_empty() {
        out.push('\n');
        for fact in &summary.supplementary {
            let _ = writeln!(out, "{} {}", status(fact.passed()), fact.check_name);
        }
    }

    let failed: Vec<_> = summary.failed_facts().collect();
    if !failed.is_empty() {
        out.push_str("\nFailed checks:\n");
        for fact in failed {
            let _ = writeln!(
                out,
                "  {} ({}): {:.3} vs {} {:.3}",
                fact.check_name,
                fact.category,
                fact.metric_value(),
                fact.comparator().as_str(),
                fact.threshold_value()
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::long_dataset;
    use crate::validator::QualityValidator;

    #[test]
    fn report_lists_composites_and_failed_facts() {
        let dataset = long_dataset(&[
            ("Deliveries in unit", "2016/17", Some(-5.0)),
            ("Deliveries in unit", "2017/18", Some(10.0)),
        ]);
        let (_, summary) = QualityValidator::default().run_checks(&dataset, "anc", None);

        insta::assert_snapshot!(render_report(&summary), @r"
        DATA QUALITY VALIDATION REPORT: anc
        Checks run: 5 | passed: 4 | failed: 1
        Overall score: 86.7/100
        Status: FAIL

        [PASS] completeness: 100.0%
        [FAIL] validity: 33.3%
        [PASS] consistency: 100.0%
        [PASS] uniqueness: 100.0%
        [PASS] data_types: 100.0%

        Failed checks:
          validity_no_negatives (validity): 0.500 vs >= 1.000
          validity_value_range (validity): 0.500 vs > 0.990
        ");
    }
}
