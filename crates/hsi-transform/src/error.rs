use hsi_model::ModelError;
use hsi_observe::ObserveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("no period columns found among {columns:?}")]
    NoPeriodColumns { columns: Vec<String> },

    #[error("invalid sheet shape: {0}")]
    Dataset(#[from] ModelError),

    #[error(transparent)]
    Observe(#[from] ObserveError),
}

impl TransformError {
    /// Failures confined to one sheet; siblings keep processing.
    pub fn is_unit_level(&self) -> bool {
        !matches!(self, Self::Observe(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoPeriodColumns { .. } => "NoPeriodColumns",
            Self::Dataset(_) => "InvalidSheet",
            Self::Observe(_) => "Observability",
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;
