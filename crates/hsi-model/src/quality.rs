#![deny(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::run::RunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckCategory {
    Completeness,
    Validity,
    Consistency,
    Timeliness,
}

impl CheckCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completeness => "completeness",
            Self::Validity => "validity",
            Self::Consistency => "consistency",
            Self::Timeliness => "timeliness",
        }
    }
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckCategory {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "completeness" => Ok(Self::Completeness),
            "validity" => Ok(Self::Validity),
            "consistency" => Ok(Self::Consistency),
            "timeliness" => Ok(Self::Timeliness),
            other => Err(ModelError::InvalidEnum {
                field: "check category",
                value: other.to_string(),
            }),
        }
    }
}

/// How a check's metric is compared against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Comparator {
    /// `metric > threshold`
    #[serde(rename = ">")]
    GreaterThan,
    /// `metric >= threshold`
    #[serde(rename = ">=")]
    AtLeast,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::AtLeast => ">=",
        }
    }

    /// NaN metrics never pass.
    pub fn holds(&self, metric: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => metric > threshold,
            Self::AtLeast => metric >= threshold,
        }
    }
}

impl FromStr for Comparator {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            ">" => Ok(Self::GreaterThan),
            ">=" => Ok(Self::AtLeast),
            other => Err(ModelError::InvalidEnum {
                field: "comparator",
                value: other.to_string(),
            }),
        }
    }
}

/// One checked data-quality fact.
///
/// `passed` is computed from the metric, threshold, and comparator when the
/// fact is built and cannot be set on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityCheck {
    pub check_name: String,
    pub category: CheckCategory,
    pub table_name: Option<String>,
    pub column_name: Option<String>,
    metric_value: f64,
    threshold_value: f64,
    comparator: Comparator,
    passed: bool,
    pub row_count: Option<u64>,
    pub failure_count: Option<u64>,
    pub details: Option<Value>,
}

impl QualityCheck {
    pub fn evaluate(
        check_name: impl Into<String>,
        category: CheckCategory,
        metric_value: f64,
        threshold_value: f64,
        comparator: Comparator,
    ) -> Self {
        Self {
            check_name: check_name.into(),
            category,
            table_name: None,
            column_name: None,
            metric_value,
            threshold_value,
            comparator,
            passed: comparator.holds(metric_value, threshold_value),
            row_count: None,
            failure_count: None,
            details: None,
        }
    }

    /// A boolean fact expressed as metric 1.0 / 0.0 against threshold 1.0.
    pub fn flag(check_name: impl Into<String>, category: CheckCategory, ok: bool) -> Self {
        Self::evaluate(
            check_name,
            category,
            if ok { 1.0 } else { 0.0 },
            1.0,
            Comparator::AtLeast,
        )
    }

    pub fn with_table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn with_column(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = Some(column_name.into());
        self
    }

    pub fn with_row_count(mut self, rows: usize) -> Self {
        self.row_count = Some(rows as u64);
        self
    }

    pub fn with_failure_count(mut self, failures: usize) -> Self {
        self.failure_count = Some(failures as u64);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn metric_value(&self) -> f64 {
        self.metric_value
    }

    pub fn threshold_value(&self) -> f64 {
        self.threshold_value
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn passed(&self) -> bool {
        self.passed
    }
}

/// A quality fact as persisted against a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityCheckRecord {
    pub run_id: RunId,
    pub recorded_at: DateTime<Utc>,
    pub check: QualityCheck,
}
