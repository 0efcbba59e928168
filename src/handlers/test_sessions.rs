// src/handlers/test_sessions.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::AppError,
    models::{
        review::SubmitReviewsRequest,
        test_session::{AnswerRequest, StartTestRequest},
    },
    services::session_manager::SessionManager,
    utils::jwt::Claims,
};

/// Opens (or refreshes) the caller's test for a course.
pub async fn open(
    State(sessions): State<SessionManager>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions.open(claims.user_id()?, course_id).await?;
    Ok(Json(view))
}

pub async fn start(
    State(sessions): State<SessionManager>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
    Json(payload): Json<StartTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions
        .start(claims.user_id()?, course_id, &payload.acknowledgements)
        .await?;
    Ok(Json(view))
}

pub async fn answer(
    State(sessions): State<SessionManager>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions
        .answer(claims.user_id()?, course_id, payload.question_id, &payload.option)
        .await?;
    Ok(Json(view))
}

pub async fn finish(
    State(sessions): State<SessionManager>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions.finish(claims.user_id()?, course_id).await?;
    Ok(Json(view))
}

/// Files review requests about questions of the finished attempt.
pub async fn submit_reviews(
    State(sessions): State<SessionManager>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
    Json(payload): Json<SubmitReviewsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let filed = sessions
        .submit_reviews(claims.user_id()?, course_id, &payload.requests)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Review submitted", "count": filed })),
    ))
}
