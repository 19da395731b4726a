use thiserror::Error;

use crate::run::RunStatus;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("row has {found} cells but the dataset has {expected} columns")]
    RowWidth { expected: usize, found: usize },

    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("invalid run id '{value}': {message}")]
    InvalidRunId { value: String, message: String },

    #[error("invalid {field} value: {value}")]
    InvalidEnum { field: &'static str, value: String },

    #[error("run {run_id} cannot move from {from} to {to}")]
    InvalidTransition {
        run_id: String,
        from: RunStatus,
        to: RunStatus,
    },
}

pub type Result<T> = std::result::Result<T, ModelError>;
