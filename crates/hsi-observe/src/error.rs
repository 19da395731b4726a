//! Observability error types.

use std::path::PathBuf;

use hsi_model::{ModelError, RunId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObserveError {
    /// An observability call needs an active run and there is none.
    #[error("no active run for {operation}; call start_run first")]
    NoActiveRun { operation: &'static str },

    #[error("run {run_id} is still active; complete it before starting another")]
    RunAlreadyActive { run_id: RunId },

    #[error("run {run_id} not found in the store")]
    UnknownRun { run_id: RunId },

    #[error("failed to {operation} file {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid stored timestamp '{value}'")]
    Timestamp { value: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("store unavailable: {message}")]
    Storage { message: String },
}

impl ObserveError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// True for calls made in the wrong lifecycle state, which are caller bugs.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Self::NoActiveRun { .. } | Self::RunAlreadyActive { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ObserveError>;
