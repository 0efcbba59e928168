// src/services/ingest/mod.rs

//! Bulk MCQ ingestion: decode the sheet, validate rows, drop duplicates
//! (within the upload, then against the store) and insert the survivors in
//! one batched write.

pub mod dedup;
pub mod reader;
pub mod validator;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;

use crate::{
    error::UploadError,
    models::mcq::{McqKey, NewMcq},
};

pub use reader::{UploadFormat, UploadRow, read_rows};
pub use validator::{RowError, validate_rows};

/// Question storage as seen by the upload pipeline.
#[async_trait]
pub trait McqStore: Send + Sync {
    /// Every (course, question) pair already stored for `course_id`, in one read.
    async fn existing_keys(&self, course_id: i64) -> Result<Vec<McqKey>, sqlx::Error>;

    /// Inserts all entries as one batch. Returns the number of rows written.
    async fn insert_batch(&self, entries: &[NewMcq]) -> Result<u64, sqlx::Error>;
}

/// Result of a successful insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub message: &'static str,
    pub inserted: usize,

    /// Valid rows not inserted: `skipped_in_batch + skipped_existing`.
    pub skipped: usize,
    pub skipped_in_batch: usize,
    pub skipped_existing: usize,
    pub invalid: usize,
    pub errors: Vec<RowError>,
}

/// Every valid row was already known; nothing was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NothingNew {
    pub message: &'static str,

    /// Unique rows of the upload that already exist in the store.
    pub duplicates: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub invalid: usize,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Inserted(BatchSummary),
    NothingNew(NothingNew),
}

/// Runs the whole pipeline for one uploaded file.
///
/// Row-level validation errors are reported next to a partial insert; every
/// other failure aborts the upload without writing anything.
pub async fn ingest<S>(
    store: &S,
    course_id: i64,
    format: UploadFormat,
    bytes: &[u8],
) -> Result<UploadOutcome, UploadError>
where
    S: McqStore + ?Sized,
{
    let rows = read_rows(format, bytes)?;
    let total_rows = rows.len();

    let validated = validate_rows(course_id, &rows);
    let invalid = validated.errors.len();
    if validated.entries.is_empty() {
        return Err(UploadError::ValidationExhausted {
            errors: validated.errors,
        });
    }
    let valid = validated.entries.len();

    let (unique, skipped_in_batch) = dedup::dedup_within_batch(validated.entries);

    let existing: HashSet<McqKey> = store
        .existing_keys(course_id)
        .await
        .map_err(|e| UploadError::StoreUnavailable(e.to_string()))?
        .into_iter()
        .collect();

    let unique_count = unique.len();
    let (fresh, _) = dedup::drop_existing(unique, &existing);

    if fresh.is_empty() {
        tracing::info!(
            course_id,
            total_rows,
            duplicates = unique_count,
            "Bulk upload contained no new questions"
        );
        return Ok(UploadOutcome::NothingNew(NothingNew {
            message: "No new unique MCQs to insert",
            duplicates: unique_count,
            inserted: 0,
            skipped: valid,
            invalid,
            errors: validated.errors,
        }));
    }

    let inserted = store
        .insert_batch(&fresh)
        .await
        .map_err(|e| UploadError::InsertFailure(e.to_string()))? as usize;

    // Rows lost to a concurrent upload hit the unique constraint and were
    // not written; they count as already existing.
    let skipped = valid.saturating_sub(inserted);
    let skipped_existing = skipped.saturating_sub(skipped_in_batch);

    tracing::info!(
        course_id,
        total_rows,
        inserted,
        skipped,
        invalid,
        "Bulk upload finished"
    );

    Ok(UploadOutcome::Inserted(BatchSummary {
        message: "Bulk upload successful",
        inserted,
        skipped,
        skipped_in_batch,
        skipped_existing,
        invalid,
        errors: validated.errors,
    }))
}
