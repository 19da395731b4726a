//! Edge I/O for the pipeline.
//!
//! Raw sheets arrive as CSV extracts, one file per sheet. This crate finds
//! them, reads them into untyped [`hsi_model::TabularDataset`]s, and writes
//! cleaned datasets back out through a Polars DataFrame.

mod discovery;
mod error;
mod reader;
mod writer;

pub use discovery::list_csv_files;
pub use error::{IngestError, Result};
pub use reader::{read_raw_sheet, registration_for, sheet_name};
pub use writer::{clean_file_name, to_dataframe, write_clean_csv};
