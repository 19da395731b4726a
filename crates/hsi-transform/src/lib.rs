//! Wide-to-long transformation of indicator sheets.
//!
//! Raw sheets arrive as untyped text grids with title rows above the real
//! header and one column per reporting period. [`TransformEngine::clean`]
//! finds the header, unpivots the period columns into
//! `(indicator, ..., period_label, value)` rows, and coerces values to numbers.
//! [`TransformEngine::process_sheets`] does that for every sheet of a source
//! file inside an observed run, recording lineage and quality facts and
//! applying the load gate.

mod batch;
mod engine;
mod error;
pub mod header;
pub mod normalize;
mod options;
pub mod predicates;
pub mod unpivot;

pub use batch::BatchTally;
pub use engine::{CleanOutput, RawSheet, SheetOutcome, SheetReport, TransformEngine, settle_sheets};
pub use error::{Result, TransformError};
pub use normalize::{RejectReason, Rejection};
pub use options::TransformOptions;
pub use unpivot::ColumnRoles;
