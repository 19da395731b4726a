use std::borrow::Cow;
use std::path::Path;

use csv::ReaderBuilder;
use encoding_rs::WINDOWS_1252;
use hsi_model::{CellValue, TabularDataset};
use hsi_observe::FileRegistration;
use hsi_transform::RawSheet;
use hsi_transform::header::header_names;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{IngestError, Result};

fn normalize_cell(raw: &str) -> &str {
    raw.trim_start_matches('\u{feff}')
}

/// Sheet name for an extract: the file stem.
pub fn sheet_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// UTF-8 when valid, otherwise Windows-1252 (the latin1 superset Excel writes).
fn decode_text<'a>(path: &Path, bytes: &'a [u8]) -> Cow<'a, str> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Cow::Borrowed(text);
    }
    warn!(path = %path.display(), "file is not valid UTF-8, decoding as Windows-1252");
    let (text, _, _) = WINDOWS_1252.decode(bytes);
    text
}

/// Read one extracted sheet.
///
/// The first record names the columns; blank names become `col_{index}` and
/// repeats are suffixed. Short rows are padded with missing cells and a long
/// row widens the sheet. Blank cells are missing; everything else stays text.
pub fn read_raw_sheet(path: &Path) -> Result<RawSheet> {
    let bytes = std::fs::read(path).map_err(|source| IngestError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let text = decode_text(path, &bytes);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records: Vec<Vec<CellValue>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| IngestError::CsvParse {
            path: path.to_path_buf(),
            source,
        })?;
        records.push(
            record
                .iter()
                .map(|cell| CellValue::from_raw(normalize_cell(cell)))
                .collect(),
        );
    }

    let mut records = records.into_iter();
    let Some(mut header) = records.next() else {
        return Ok(RawSheet::new(sheet_name(path), TabularDataset::default()));
    };
    let mut rows: Vec<Vec<CellValue>> = records.collect();

    let width = rows.iter().map(Vec::len).fold(header.len(), usize::max);
    header.resize(width, CellValue::Missing);
    for row in &mut rows {
        row.resize(width, CellValue::Missing);
    }

    let dataset = TabularDataset::from_rows(header_names(&header), rows).map_err(|source| {
        IngestError::Sheet {
            path: path.to_path_buf(),
            source,
        }
    })?;
    debug!(
        path = %path.display(),
        rows = dataset.height(),
        columns = dataset.width(),
        "read raw sheet"
    );
    Ok(RawSheet::new(sheet_name(path), dataset))
}

/// Catalog shape for a source file holding the given sheets.
pub fn registration_for(sheets: &[RawSheet]) -> FileRegistration {
    let row_count: usize = sheets.iter().map(|sheet| sheet.dataset.height()).sum();
    let column_count = sheets
        .iter()
        .map(|sheet| sheet.dataset.width())
        .max()
        .unwrap_or(0);
    let snapshot: serde_json::Map<String, serde_json::Value> = sheets
        .iter()
        .map(|sheet| (sheet.name.clone(), json!(sheet.dataset.columns())))
        .collect();
    FileRegistration {
        sheet_count: Some(sheets.len() as u64),
        row_count: Some(row_count as u64),
        column_count: Some(column_count as u64),
        schema_snapshot: Some(serde_json::Value::Object(snapshot)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_csv(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn first_record_names_columns() {
        let file = temp_csv("\u{feff}Indicator,2016/17,,2016/17\nANC,38,,40\n");
        let sheet = read_raw_sheet(file.path()).unwrap();
        assert_eq!(
            sheet.dataset.columns(),
            ["Indicator", "2016/17", "col_2", "2016/17_1"]
        );
        assert_eq!(
            sheet.dataset.row(0).unwrap(),
            [
                CellValue::text("ANC"),
                CellValue::text("38"),
                CellValue::Missing,
                CellValue::text("40"),
            ]
        );
    }

    #[test]
    fn ragged_rows_are_padded() {
        let file = temp_csv("Title\nIndicator,2016/17,2017/18\nANC,38\n");
        let sheet = read_raw_sheet(file.path()).unwrap();
        assert_eq!(sheet.dataset.columns(), ["Title", "col_1", "col_2"]);
        assert_eq!(sheet.dataset.height(), 2);
        assert_eq!(sheet.dataset.cell(1, "col_2"), Some(&CellValue::Missing));
    }

    #[test]
    fn empty_file_is_an_empty_sheet() {
        let file = temp_csv("");
        let sheet = read_raw_sheet(file.path()).unwrap();
        assert!(sheet.dataset.is_empty());
        assert_eq!(sheet.dataset.width(), 0);
    }

    #[test]
    fn latin1_export_is_decoded() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"Indicator,Province,2016/17\nANC,Cura\xe7ao,38\n")
            .unwrap();
        file.flush().unwrap();

        let sheet = read_raw_sheet(file.path()).unwrap();
        assert_eq!(sheet.dataset.height(), 1);
        assert_eq!(
            sheet.dataset.cell(0, "Province"),
            Some(&CellValue::text("Cura\u{e7}ao"))
        );
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let error = read_raw_sheet(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(error, IngestError::FileRead { .. }));
    }

    #[test]
    fn sheet_names_are_file_stems() {
        assert_eq!(sheet_name(Path::new("/raw/anc_coverage.csv")), "anc_coverage");
    }

    #[test]
    fn registration_captures_shape() {
        let file = temp_csv("Indicator,2016/17\nANC,38\nDeliveries,12\n");
        let sheet = read_raw_sheet(file.path()).unwrap();
        let registration = registration_for(std::slice::from_ref(&sheet));
        assert_eq!(registration.sheet_count, Some(1));
        assert_eq!(registration.row_count, Some(2));
        assert_eq!(registration.column_count, Some(2));
        assert_eq!(
            registration.schema_snapshot.unwrap()[&sheet.name],
            json!(["Indicator", "2016/17"])
        );
    }
}
