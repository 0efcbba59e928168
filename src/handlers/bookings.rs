// src/handlers/bookings.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::booking::BookSlotRequest,
    repositories::bookings,
    services::session_manager::SessionManager,
    utils::jwt::Claims,
};

/// Registrations still waiting for a slot, with attempt counts.
pub async fn list_registered(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let registered = bookings::list_registered(&pool, claims.user_id()?).await?;
    Ok(Json(registered))
}

/// Turns the caller's registration for a course into a booked slot.
pub async fn book_slot(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<BookSlotRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    if payload.slot_time <= Utc::now() {
        return Err(AppError::BadRequest(
            "Slot time must be in the future".to_string(),
        ));
    }

    let user_id = claims.user_id()?;
    let booking = bookings::book_slot(
        &pool,
        user_id,
        payload.course_id,
        payload.venue.trim(),
        payload.slot_time,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to book slot: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or(AppError::NotFound(
        "Register for the course before booking a slot".to_string(),
    ))?;

    tracing::info!(user_id, course_id = payload.course_id, slot_time = %payload.slot_time, "Slot booked");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Slot booked successfully!", "booking": booking })),
    ))
}

/// Deletes one of the caller's bookings. Repeating the call is harmless.
/// A test session opened on the booking is dropped with it.
pub async fn delete_booking(
    State(pool): State<PgPool>,
    State(sessions): State<SessionManager>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let removed = bookings::delete_owned(&pool, id, user_id).await?;
    if removed > 0 {
        sessions.discard_booking(user_id, id).await;
    }
    Ok(Json(json!({ "message": "Booking deleted", "removed": removed })))
}
