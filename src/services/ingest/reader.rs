// src/services/ingest/reader.rs

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, Xlsx};

use crate::error::UploadError;

/// One data row of an uploaded sheet, keyed by header name.
/// Columns missing from a short row are absent, not empty.
pub type UploadRow = HashMap<String, String>;

/// The two tabular formats accepted by the bulk upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Csv,
    Xlsx,
}

impl UploadFormat {
    /// Picks the format from the declared file name's extension (case-insensitive).
    pub fn from_filename(name: &str) -> Result<Self, UploadError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("csv") => Ok(UploadFormat::Csv),
            Some("xlsx") => Ok(UploadFormat::Xlsx),
            _ => Err(UploadError::UnsupportedFormat),
        }
    }
}

/// Decodes `bytes` as `format`. The first row names the columns; every later
/// row is mapped positionally onto those names, in source order.
pub fn read_rows(format: UploadFormat, bytes: &[u8]) -> Result<Vec<UploadRow>, UploadError> {
    match format {
        UploadFormat::Csv => read_csv(bytes),
        UploadFormat::Xlsx => read_xlsx(bytes),
    }
}

fn read_csv(bytes: &[u8]) -> Result<Vec<UploadRow>, UploadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| UploadError::DecodeFailure(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| UploadError::DecodeFailure(e.to_string()))?;
        records.push(record.iter().map(str::to_string).collect());
    }

    Ok(rows_from_table(headers, records))
}

fn read_xlsx(bytes: &[u8]) -> Result<Vec<UploadRow>, UploadError> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| UploadError::DecodeFailure(e.to_string()))?;

    let first_sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| UploadError::DecodeFailure("workbook has no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&first_sheet)
        .map_err(|e| UploadError::DecodeFailure(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(cell_text).collect(),
        None => return Ok(Vec::new()),
    };

    // Spreadsheet exports commonly carry formatted but empty trailing rows.
    let records = rows
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
        .filter(|record| record.iter().any(|text| !text.trim().is_empty()))
        .collect();

    Ok(rows_from_table(headers, records))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Zips each record with the header names. A leading byte-order mark on the
/// first header is dropped so `question` still matches.
fn rows_from_table(mut headers: Vec<String>, records: Vec<Vec<String>>) -> Vec<UploadRow> {
    if let Some(first) = headers.first_mut() {
        if let Some(stripped) = first.strip_prefix('\u{feff}') {
            *first = stripped.to_string();
        }
    }

    records
        .into_iter()
        .map(|record| {
            headers
                .iter()
                .zip(record)
                .map(|(name, value)| (name.clone(), value))
                .collect()
        })
        .collect()
}
