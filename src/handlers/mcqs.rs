// src/handlers/mcqs.rs

use axum::{
    Json,
    extract::{Multipart, Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tokio::io::AsyncWriteExt;
use validator::Validate;

use super::courses::conflict_or_internal;
use crate::{
    config::Config,
    error::{AppError, UploadError},
    models::mcq::{CorrectOptionRequest, McqInput},
    repositories::mcqs,
    services::{
        ai_drafts::AiClient,
        ingest::{self, UploadFormat, UploadOutcome},
    },
    utils::upload::StagedFile,
};

/// Edits one question.
/// Admin only.
pub async fn update_mcq(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<McqInput>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut conn = pool.acquire().await?;
    // The course is kept; only the text and answer key change.
    let mcq = payload.into_new(0);
    let updated = mcqs::update(&mut conn, id, None, &mcq)
        .await
        .map_err(|e| conflict_or_internal(e, &mcq.question))?
        .ok_or(AppError::NotFound("MCQ not found".to_string()))?;

    Ok(Json(json!({ "message": "MCQ updated successfully!", "mcq": updated })))
}

/// Admin only.
pub async fn delete_mcq(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if mcqs::delete(&pool, id).await? == 0 {
        return Err(AppError::NotFound("MCQ not found".to_string()));
    }
    Ok(Json(json!({ "message": "MCQ deleted successfully" })))
}

/// Corrects the answer key after a review showed it was wrong.
/// Admin only.
pub async fn set_correct_option(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<CorrectOptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mcq = mcqs::set_correct_option(&pool, id, &payload.correct_option)
        .await?
        .ok_or(AppError::NotFound("MCQ not found".to_string()))?;

    tracing::info!(mcq_id = id, correct_option = %mcq.correct_option, "Correct option updated");
    Ok(Json(json!({ "message": "Correct option updated.", "mcq": mcq })))
}

/// Bulk MCQ upload: multipart `course_id` and `file` (.csv or .xlsx).
///
/// The file is streamed to the staging directory and removed again on
/// every exit path before the response is sent.
/// Admin only.
pub async fn bulk_upload(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    mut multipart: Multipart,
) -> Result<Response, UploadError> {
    let mut course_id: Option<String> = None;
    let mut staged: Option<StagedFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::DecodeFailure(e.to_string()))?
    {
        match field.name() {
            Some("course_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| UploadError::DecodeFailure(e.to_string()))?;
                course_id = Some(text);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let (file, mut out) = StagedFile::create(&config.upload_dir, &file_name)
                    .await
                    .map_err(|e| UploadError::DecodeFailure(e.to_string()))?;
                // A repeated part replaces (and removes) the earlier one.
                staged = Some(file);

                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| UploadError::DecodeFailure(e.to_string()))?
                {
                    out.write_all(&chunk)
                        .await
                        .map_err(|e| UploadError::DecodeFailure(e.to_string()))?;
                }
                out.flush()
                    .await
                    .map_err(|e| UploadError::DecodeFailure(e.to_string()))?;
            }
            _ => {}
        }
    }

    let staged = staged.ok_or(UploadError::MissingField("file"))?;
    let result = ingest_staged(&pool, course_id.as_deref(), &staged).await;
    staged.release().await;

    Ok(match result? {
        UploadOutcome::Inserted(summary) => Json(summary).into_response(),
        UploadOutcome::NothingNew(nothing) => Json(nothing).into_response(),
    })
}

async fn ingest_staged(
    pool: &PgPool,
    course_id: Option<&str>,
    staged: &StagedFile,
) -> Result<UploadOutcome, UploadError> {
    // Checked before anything else is looked at.
    let format = UploadFormat::from_filename(staged.file_name())?;

    let course_id: i64 = course_id
        .and_then(|raw| raw.trim().parse().ok())
        .ok_or(UploadError::MissingField("course_id"))?;
    let bytes = staged
        .read()
        .await
        .map_err(|e| UploadError::DecodeFailure(e.to_string()))?;

    ingest::ingest(pool, course_id, format, &bytes).await
}

#[derive(Debug, Deserialize)]
pub struct GenerateMcqsRequest {
    #[serde(default)]
    pub course_name: String,
}

/// Drafts MCQs for a course with the configured AI provider.
/// Nothing is stored; the admin reviews the drafts in the course editor.
/// Admin only.
pub async fn generate_mcqs(
    State(ai): State<AiClient>,
    Json(payload): Json<GenerateMcqsRequest>,
) -> Result<impl IntoResponse, Response> {
    let course_name = payload.course_name.trim();
    if course_name.is_empty() {
        return Err(AppError::BadRequest("Course name is required".to_string()).into_response());
    }

    let drafts = ai
        .draft_mcqs(course_name)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok(Json(json!({ "mcqs": drafts })))
}
