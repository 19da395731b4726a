//! Period label shapes.
//!
//! Spreadsheet exports label reporting periods as fiscal-year spans such as
//! `2016/17`, occasionally as plain years such as `2016`. These predicates are
//! shared by header detection, unpivoting, and the quality checks.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static FISCAL_YEAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}/\d{2}$").expect("Invalid fiscal year regex"));

static LEADING_YEAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})").expect("Invalid leading year regex"));

/// Loose period-label shape: contains a `/` separator and at least one digit.
pub fn is_period_label_shape(value: &str) -> bool {
    value.contains('/') && contains_digit(value)
}

/// A label made only of ASCII digits once surrounding whitespace is removed.
pub fn is_digit_label(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.chars().all(|ch| ch.is_ascii_digit())
}

pub fn contains_digit(value: &str) -> bool {
    value.chars().any(|ch| ch.is_ascii_digit())
}

/// Strict `YYYY/YY` fiscal-year label.
pub fn is_fiscal_year_label(value: &str) -> bool {
    FISCAL_YEAR_REGEX.is_match(value)
}

/// The four-digit year a label starts with, if any.
pub fn leading_year(value: &str) -> Option<i32> {
    LEADING_YEAR_REGEX
        .captures(value.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|year| year.as_str().parse().ok())
}

/// Canonical date for a period label.
///
/// Fiscal spans start on 1 July of their first year; plain years map to
/// 1 January.
pub fn period_start_date(label: &str) -> Option<NaiveDate> {
    let trimmed = label.trim();
    if trimmed.contains('/') {
        let start: i32 = trimmed.split('/').next()?.trim().parse().ok()?;
        NaiveDate::from_ymd_opt(start, 7, 1)
    } else {
        let year: i32 = trimmed.parse().ok()?;
        NaiveDate::from_ymd_opt(year, 1, 1)
    }
}
