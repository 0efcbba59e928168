// src/services/ingest/validator.rs

use serde::Serialize;

use super::reader::UploadRow;
use crate::models::mcq::NewMcq;

/// Reported row number = index in the parsed sequence + this offset,
/// i.e. the line in the original file counting the header.
pub const ROW_NUMBER_OFFSET: usize = 2;

pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields";

/// A rejected upload row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

/// Rows split into insertable entries and per-row errors, both in input order.
#[derive(Debug, Default)]
pub struct ValidatedRows {
    pub entries: Vec<NewMcq>,
    pub errors: Vec<RowError>,
}

/// Checks every row for the six required columns.
///
/// A row is valid iff `question`, `option1`..`option4` and `correct_option`
/// are all present and non-empty. The store is not consulted here.
pub fn validate_rows(course_id: i64, rows: &[UploadRow]) -> ValidatedRows {
    let mut validated = ValidatedRows::default();

    for (index, row) in rows.iter().enumerate() {
        match project_row(course_id, row) {
            Some(entry) => validated.entries.push(entry),
            None => validated.errors.push(RowError {
                row: index + ROW_NUMBER_OFFSET,
                message: MISSING_FIELDS_MESSAGE.to_string(),
            }),
        }
    }

    validated
}

fn project_row(course_id: i64, row: &UploadRow) -> Option<NewMcq> {
    let field = |name: &str| row.get(name).filter(|v| !v.is_empty()).cloned();

    Some(NewMcq {
        course_id,
        question: field("question")?,
        option1: field("option1")?,
        option2: field("option2")?,
        option3: field("option3")?,
        option4: field("option4")?,
        correct_option: field("correct_option")?,
    })
}
