use serde::{Deserialize, Serialize};

/// Pass/fail limits for the quality checks.
///
/// Rates are fractions in `[0, 1]`. Loaded from the `[quality]` table of the
/// pipeline config; omitted keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Completeness fails at or above this null rate.
    pub max_null_rate: f64,
    pub min_value: f64,
    pub max_value: f64,
    /// Share of values allowed outside `[min_value, max_value]`.
    pub max_outlier_rate: f64,
    pub max_duplicate_rate: f64,
    /// Share of period labels that must be strict `YYYY/YY`.
    pub min_period_format_rate: f64,
    pub indicator_name_min_len: usize,
    pub indicator_name_max_len: usize,
    pub min_indicator_name_rate: f64,
    pub min_year: i32,
    pub max_year: i32,
    pub min_year_range_rate: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            max_null_rate: 0.05,
            min_value: 0.0,
            max_value: 1e9,
            max_outlier_rate: 0.01,
            max_duplicate_rate: 0.01,
            min_period_format_rate: 0.95,
            indicator_name_min_len: 5,
            indicator_name_max_len: 500,
            min_indicator_name_rate: 0.95,
            min_year: 2010,
            max_year: 2030,
            min_year_range_rate: 0.99,
        }
    }
}
