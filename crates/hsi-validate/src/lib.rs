//! Data quality validation for long-format indicator datasets.
//!
//! [`QualityValidator::run_checks`] runs five composite checks (completeness,
//! validity, consistency, uniqueness, data types). Each composite is made of
//! one or more [`QualityCheck`](hsi_model::QualityCheck) facts; every fact is
//! recorded against the active run when a tracker is supplied. The overall
//! score is the mean of the five composite scores on a 0-100 scale.

mod checks;
mod gate;
mod health;
mod report;
mod summary;
mod thresholds;
mod validator;

pub use checks::{
    KEY_COLUMN_CANDIDATES, PERIOD_COLUMNS, VALUE_COLUMN, check_completeness, check_consistency,
    check_data_types, check_uniqueness, check_validity, period_column,
};
pub use gate::{GatingDecision, gate_load};
pub use health::{check_indicator_names, check_year_range};
pub use report::render_report;
pub use summary::{CheckKind, CheckOutcome, ValidationSummary};
pub use thresholds::QualityThresholds;
pub use validator::QualityValidator;
