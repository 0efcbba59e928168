// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::services::{ingest::RowError, test_session::SessionError};

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., already registered, session already finished)
    Conflict(String),

    // 503 Service Unavailable (e.g., AI provider not configured)
    ServiceUnavailable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidState(_) | SessionError::DeadlinePassed => {
                AppError::Conflict(err.to_string())
            }
            SessionError::InstructionsNotAccepted
            | SessionError::UnknownQuestion(_)
            | SessionError::InvalidOption(_) => AppError::BadRequest(err.to_string()),
        }
    }
}

/// Failures of the bulk MCQ upload pipeline.
///
/// Each variant renders the exact body the upload form expects. Running out
/// of new rows after deduplication is not an error; see `UploadOutcome`.
#[derive(Debug)]
pub enum UploadError {
    /// The multipart form lacked a required part.
    MissingField(&'static str),

    /// File extension is neither `.csv` nor `.xlsx`.
    UnsupportedFormat,

    /// The file could not be decoded as its declared format.
    DecodeFailure(String),

    /// Not a single row passed validation.
    ValidationExhausted { errors: Vec<RowError> },

    /// Reading existing questions for deduplication failed.
    StoreUnavailable(String),

    /// The batched insert failed; nothing is retried.
    InsertFailure(String),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for UploadError {}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            UploadError::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("{} is required", field) }),
            ),
            UploadError::UnsupportedFormat => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Only .csv or .xlsx files allowed" }),
            ),
            UploadError::DecodeFailure(msg) => {
                tracing::error!("Failed to decode upload: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to read file" }),
                )
            }
            UploadError::ValidationExhausted { errors } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "No valid entries to insert", "errors": errors }),
            ),
            UploadError::StoreUnavailable(msg) => {
                tracing::error!("Duplicate check failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "DB check failed" }),
                )
            }
            UploadError::InsertFailure(msg) => {
                tracing::error!("Bulk insert failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Insert failed" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Failures of AI-assisted MCQ drafting.
#[derive(Debug)]
pub enum DraftError {
    /// No API key configured.
    NotConfigured,

    /// The provider could not be reached or answered with an error status.
    Transport(String),

    /// The reply was not a JSON array of MCQs.
    Parse(String),
}

impl fmt::Display for DraftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for DraftError {}

impl IntoResponse for DraftError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            DraftError::NotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "AI drafting is not configured",
            ),
            DraftError::Transport(msg) => {
                tracing::error!("Error generating MCQs: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate AI MCQs")
            }
            DraftError::Parse(msg) => {
                tracing::error!("AI response was not valid MCQ JSON: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to parse AI response")
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
