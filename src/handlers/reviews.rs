// src/handlers/reviews.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::review::UpdateReviewRequest,
    repositories::reviews,
    utils::html::clean_html,
};

/// Pending review requests with the disputed question and the latest attempt.
/// Admin only.
pub async fn list_pending(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let pending = reviews::list_pending(&pool).await.map_err(|e| {
        tracing::error!("Error fetching admin reviews: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(pending))
}

/// Closes a review with the admin's feedback.
/// Admin only.
pub async fn update_review(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let feedback = clean_html(payload.admin_feedback.trim());
    if reviews::mark_reviewed(&pool, id, &feedback).await? == 0 {
        return Err(AppError::NotFound("Review not found".to_string()));
    }

    Ok(Json(json!({ "message": "Review updated." })))
}
