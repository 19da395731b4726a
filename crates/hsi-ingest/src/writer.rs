use std::fs::File;
use std::path::{Path, PathBuf};

use hsi_model::{CellValue, TabularDataset};
use polars::prelude::*;
use tracing::info;

use crate::error::{IngestError, Result};

/// `<stem>_clean.csv`
pub fn clean_file_name(stem: &str) -> String {
    format!("{stem}_clean.csv")
}

/// Convert a cleaned dataset into a DataFrame.
///
/// Columns holding only numbers (or nothing) become `f64`; everything else is
/// a string column. Missing cells are nulls.
pub fn to_dataframe(dataset: &TabularDataset) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(dataset.width());
    for name in dataset.columns() {
        let numeric = dataset.is_numeric_column(name).map_err(|e| IngestError::DataFrame {
            message: e.to_string(),
        })?;
        let cells = dataset
            .column_values(name)
            .map_err(|e| IngestError::DataFrame {
                message: e.to_string(),
            })?;
        let column = if numeric {
            let values: Vec<Option<f64>> = cells.map(CellValue::as_number).collect();
            Column::new(name.as_str().into(), values)
        } else {
            let values: Vec<Option<String>> = cells
                .map(|cell| (!cell.is_missing()).then(|| cell.render().into_owned()))
                .collect();
            Column::new(name.as_str().into(), values)
        };
        columns.push(column);
    }
    Ok(DataFrame::new(columns)?)
}

/// Write a cleaned dataset to `dir/<stem>_clean.csv`, creating `dir`.
pub fn write_clean_csv(dir: &Path, stem: &str, dataset: &TabularDataset) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| IngestError::Write {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;
    let path = dir.join(clean_file_name(stem));
    let mut df = to_dataframe(dataset)?;
    let mut file = File::create(&path).map_err(|e| IngestError::Write {
        path: path.clone(),
        message: e.to_string(),
    })?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .map_err(|e| IngestError::Write {
            path: path.clone(),
            message: e.to_string(),
        })?;
    info!(path = %path.display(), rows = df.height(), "wrote clean output");
    Ok(path)
}
