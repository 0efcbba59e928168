// src/handlers/courses.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        course::{CourseWithMcqs, CreateCourseRequest, UpdateCourseRequest},
        mcq::NewMcq,
    },
    repositories::{
        bookings,
        courses::{self, CourseFields},
        is_unique_violation, mcqs, scores, users,
    },
    utils::jwt::Claims,
};

/// Courses offered to the caller's department and year.
/// Question banks are not included.
pub async fn list_offered(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let user = users::find_by_id(&pool, user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let offered: Vec<_> = courses::list(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list courses: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?
        .into_iter()
        .filter(|course| course.is_offered_to(user.department.as_deref(), user.year))
        .collect();

    Ok(Json(offered))
}

/// Registers the caller for a course without a slot.
pub async fn register(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    courses::find_by_id(&pool, course_id)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    let booking = bookings::register(&pool, user_id, course_id)
        .await?
        .ok_or(AppError::Conflict(
            "You are already registered for this course!".to_string(),
        ))?;

    tracing::info!(user_id, course_id, "Course registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Course registered successfully!", "booking": booking })),
    ))
}

pub async fn completion(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let completed = scores::has_completed(&pool, claims.user_id()?, course_id).await?;
    Ok(Json(json!({ "completed": completed })))
}

/// Every course with its full question bank.
/// Admin only.
pub async fn list_with_mcqs(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let all_courses = courses::list(&pool).await?;
    let mut banks: HashMap<i64, Vec<_>> = HashMap::new();
    for mcq in mcqs::list_all(&pool).await? {
        banks.entry(mcq.course_id).or_default().push(mcq);
    }

    let courses: Vec<CourseWithMcqs> = all_courses
        .into_iter()
        .map(|course| CourseWithMcqs {
            mcqs: banks.remove(&course.id).unwrap_or_default(),
            course,
        })
        .collect();

    Ok(Json(courses))
}

/// Creates a course with an optional initial question bank.
/// Questions repeating one already in the bank are skipped.
/// Admin only.
pub async fn create_course(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let fields = CourseFields {
        name: &payload.name,
        level: &payload.level,
        thumbnail: payload.thumbnail.as_deref(),
        material: payload.material.as_deref(),
        years: &payload.years,
        departments: &payload.departments,
    };

    let mut tx = pool.begin().await?;
    let course = courses::insert(&mut tx, &fields).await?;

    let new_mcqs: Vec<NewMcq> = payload
        .mcqs
        .iter()
        .cloned()
        .map(|mcq| mcq.into_new(course.id))
        .collect();
    let inserted = mcqs::insert_rows(&mut tx, &new_mcqs).await?;
    tx.commit().await?;

    tracing::info!(course_id = course.id, inserted, "Course created");

    let message = if new_mcqs.is_empty() {
        "Course added successfully, no MCQs provided."
    } else {
        "Course and MCQs added successfully!"
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": message, "course": course, "mcqs_inserted": inserted })),
    ))
}

/// Updates a course. MCQs carrying an `id` are edited in place, the rest
/// are appended. All changes commit together.
/// Admin only.
pub async fn update_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let fields = CourseFields {
        name: &payload.name,
        level: &payload.level,
        thumbnail: payload.thumbnail.as_deref(),
        material: payload.material.as_deref(),
        years: &payload.years,
        departments: &payload.departments,
    };

    let mut tx = pool.begin().await?;
    let course = courses::update(&mut tx, id, &fields)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    let mut appended = Vec::new();
    for input in payload.mcqs.iter().cloned() {
        let existing_id = input.id;
        let mcq = input.into_new(id);
        match existing_id {
            Some(mcq_id) => {
                mcqs::update(&mut tx, mcq_id, Some(id), &mcq)
                    .await
                    .map_err(|e| conflict_or_internal(e, &mcq.question))?
                    .ok_or_else(|| AppError::NotFound(format!("MCQ {} not found in this course", mcq_id)))?;
            }
            None => appended.push(mcq),
        }
    }
    let inserted = mcqs::insert_rows(&mut tx, &appended).await?;
    tx.commit().await?;

    tracing::info!(course_id = id, inserted, "Course updated");

    Ok(Json(json!({
        "message": "Course and MCQs updated successfully!",
        "course": course,
        "mcqs_inserted": inserted,
    })))
}

/// Deletes a course. Its MCQs, bookings and reviews go with it.
/// Admin only.
pub async fn delete_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if courses::delete(&pool, id).await? == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    tracing::info!(course_id = id, "Course deleted");
    Ok(Json(json!({ "message": "Course and its MCQs deleted successfully!" })))
}

pub(crate) fn conflict_or_internal(e: sqlx::Error, question: &str) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict(format!("The course already has the question '{}'", question))
    } else {
        tracing::error!("Failed to write MCQ: {:?}", e);
        AppError::InternalServerError(e.to_string())
    }
}
