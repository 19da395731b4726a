//! Observability for pipeline runs.
//!
//! Every pipeline stage records what it did through this crate:
//!
//! - **tracker**: [`RunTracker`] owns the lifecycle of a [`PipelineRun`] and is
//!   the anchor every quality and lineage record attaches to
//! - **lineage**: [`LineageRecorder`] appends field-level lineage facts
//! - **registry**: [`SourceFileRegistry`] catalogs source files by content
//!   fingerprint so unchanged re-runs are cheap
//! - **store**: the [`ObservabilityStore`] capability, with in-memory and
//!   SQLite implementations
//! - **summary**: per-run rollups for reporting
//!
//! Components receive the store at construction; there is no process-wide
//! connection.
//!
//! [`PipelineRun`]: hsi_model::PipelineRun

mod error;
mod lineage;
mod registry;
mod store;
mod summary;
mod tracker;

pub use error::{ObserveError, Result};
pub use lineage::LineageRecorder;
pub use registry::{
    FileChange, FileRegistration, RegistrationOutcome, SourceFileRegistry, fingerprint_file,
};
pub use store::{MemoryStore, ObservabilityStore, SqliteStore};
pub use summary::{CategoryTally, RunSummary, summarize_run};
pub use tracker::{RunOutcome, RunSession, RunSpec, RunTracker, SessionError};
