// src/handlers/profile.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    error::AppError,
    repositories::{bookings, reviews},
    services::session_manager::SessionManager,
    utils::jwt::Claims,
};

/// Scheduled bookings of the caller.
///
/// Slots whose window has already closed are swept first: each gets a score
/// row and disappears from the list.
pub async fn list_bookings(
    State(pool): State<PgPool>,
    State(sessions): State<SessionManager>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let swept = sessions.reconcile(user_id).await?;
    let scheduled = bookings::list_scheduled_with_course(&pool, user_id).await?;

    Ok(Json(json!({ "swept": swept, "bookings": scheduled })))
}

/// Review requests filed by the caller, newest first.
pub async fn list_reviews(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let filed = reviews::list_by_user(&pool, claims.user_id()?).await?;
    Ok(Json(filed))
}
