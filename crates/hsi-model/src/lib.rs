//! Data model for the health sector indicator pipeline.
//!
//! - **dataset**: the in-memory [`TabularDataset`] shared by every stage
//! - **period**: fiscal-period label shapes and date mapping
//! - **run**: [`PipelineRun`] lifecycle and counters
//! - **quality**: [`QualityCheck`] facts with derived pass/fail
//! - **lineage**: field-level [`FieldLineage`] facts
//! - **catalog**: [`SourceFileCatalogEntry`] for source change detection

#![deny(unsafe_code)]

pub mod catalog;
pub mod dataset;
pub mod error;
pub mod lineage;
pub mod period;
pub mod quality;
pub mod run;

pub use catalog::{FileId, FileStatus, SourceFileCatalogEntry, SourceFileDescriptor};
pub use dataset::{CellKey, CellValue, TabularDataset, ValueKind};
pub use error::{ModelError, Result};
pub use lineage::{FieldLineage, FieldLineageRecord, TransformationType};
pub use quality::{CheckCategory, Comparator, QualityCheck, QualityCheckRecord};
pub use run::{PipelineRun, RunCounts, RunFailure, RunId, RunStatus};
