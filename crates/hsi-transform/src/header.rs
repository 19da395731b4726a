//! Locating the real header of a sheet.
//!
//! Exports typically carry title and note rows above the header, and only the
//! header row has several period labels. Without such a row the sheet's own
//! column names stand.

use std::collections::{BTreeMap, BTreeSet};

use hsi_model::{CellValue, TabularDataset};

use crate::error::Result;
use crate::options::TransformOptions;
use crate::predicates::is_period_cell;

fn period_cell_count(row: &[CellValue]) -> usize {
    row.iter().filter(|cell| is_period_cell(cell)).count()
}

/// Index of the first scanned row with enough period-shaped cells.
pub fn detect_header_row(rows: &[Vec<CellValue>], options: &TransformOptions) -> Option<usize> {
    rows.iter()
        .take(options.header_scan_rows)
        .position(|row| period_cell_count(row) >= options.min_period_cells)
}

/// Make names unique: repeats get `_1`, `_2`, ... per name, skipping any
/// suffix that is already taken.
pub fn unique_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let names: Vec<String> = names.into_iter().collect();
    let mut taken: BTreeSet<String> = BTreeSet::new();
    let mut counters: BTreeMap<String, usize> = BTreeMap::new();
    let mut out = Vec::with_capacity(names.len());

    for name in names {
        if taken.insert(name.clone()) {
            out.push(name);
            continue;
        }
        let counter = counters.entry(name.clone()).or_insert(0);
        let unique = loop {
            *counter += 1;
            let candidate = format!("{name}_{counter}");
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        taken.insert(unique.clone());
        out.push(unique);
    }
    out
}

/// Column names from a header row: trimmed cell text, `col_{index}` for blanks.
pub fn header_names(row: &[CellValue]) -> Vec<String> {
    unique_names(row.iter().enumerate().map(|(idx, cell)| {
        let name = cell.render().trim().to_string();
        if name.is_empty() {
            format!("col_{idx}")
        } else {
            name
        }
    }))
}

/// A sheet with its header resolved and empty rows and columns removed.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderResolution {
    /// Data row promoted to header, if one was found.
    pub header_row: Option<usize>,
    pub dataset: TabularDataset,
}

pub fn resolve_header(raw: &TabularDataset, options: &TransformOptions) -> Result<HeaderResolution> {
    let header_row = detect_header_row(raw.rows(), options);

    let (columns, body): (Vec<String>, &[Vec<CellValue>]) = match header_row {
        Some(idx) => (header_names(&raw.rows()[idx]), &raw.rows()[idx + 1..]),
        None => (raw.columns().to_vec(), raw.rows()),
    };

    let keep: Vec<usize> = (0..columns.len())
        .filter(|idx| body.iter().any(|row| !row[*idx].is_missing()))
        .collect();

    let names = unique_names(keep.iter().map(|idx| columns[*idx].trim().to_string()));
    let rows = body
        .iter()
        .filter(|row| keep.iter().any(|idx| !row[*idx].is_missing()))
        .map(|row| keep.iter().map(|idx| row[*idx].clone()).collect())
        .collect();

    Ok(HeaderResolution {
        header_row,
        dataset: TabularDataset::from_rows(names, rows)?,
    })
}
