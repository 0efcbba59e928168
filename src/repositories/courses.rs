// src/repositories/courses.rs

use sqlx::{PgConnection, PgPool, types::Json};

use crate::models::course::Course;

pub(crate) const COLUMNS: &str = "id, name, level, thumbnail, material, years, departments";

/// Course fields as written by the admin editor.
pub struct CourseFields<'a> {
    pub name: &'a str,
    pub level: &'a str,
    pub thumbnail: Option<&'a str>,
    pub material: Option<&'a str>,
    pub years: &'a [i32],
    pub departments: &'a [String],
}

pub async fn list(pool: &PgPool) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COLUMNS} FROM courses ORDER BY id"))
        .fetch_all(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COLUMNS} FROM courses WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert(conn: &mut PgConnection, fields: &CourseFields<'_>) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "INSERT INTO courses (name, level, thumbnail, material, years, departments)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {COLUMNS}"
    ))
    .bind(fields.name)
    .bind(fields.level)
    .bind(fields.thumbnail)
    .bind(fields.material)
    .bind(Json(fields.years))
    .bind(Json(fields.departments))
    .fetch_one(conn)
    .await
}

pub async fn update(
    conn: &mut PgConnection,
    id: i64,
    fields: &CourseFields<'_>,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "UPDATE courses
         SET name = $1, level = $2, thumbnail = $3, material = $4, years = $5, departments = $6
         WHERE id = $7
         RETURNING {COLUMNS}"
    ))
    .bind(fields.name)
    .bind(fields.level)
    .bind(fields.thumbnail)
    .bind(fields.material)
    .bind(Json(fields.years))
    .bind(Json(fields.departments))
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Deletes the course; its questions, bookings and reviews cascade.
pub async fn delete(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
