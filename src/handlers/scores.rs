// src/handlers/scores.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{error::AppError, models::score::StoreScoreRequest, repositories::scores};

/// Appends a score row. Every call adds a new row.
/// Admin only.
pub async fn store_score(
    State(pool): State<PgPool>,
    Json(payload): Json<StoreScoreRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.score < 0 {
        return Err(AppError::BadRequest("Score cannot be negative".to_string()));
    }

    let mut conn = pool.acquire().await?;
    let record = scores::insert(&mut conn, payload.user_id, payload.course_id, payload.score)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store score: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Score saved successfully", "score": record })),
    ))
}

/// Adds one point after an upheld review.
/// Admin only.
pub async fn increment_score(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let record = scores::increment(&pool, id)
        .await?
        .ok_or(AppError::NotFound("Score not found".to_string()))?;

    Ok(Json(json!({ "message": "Score updated.", "score": record })))
}
