// src/repositories/bookings.rs

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::models::booking::{Booking, RegisteredCourse, ScheduledBooking};

pub(crate) const COLUMNS: &str = "id, user_id, course_id, venue, slot_time";

/// The latest booking of `course_id` that has a slot.
pub async fn find_slot(
    pool: &PgPool,
    user_id: i64,
    course_id: i64,
) -> Result<Option<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>(&format!(
        "SELECT {COLUMNS} FROM booked_courses
         WHERE user_id = $1 AND course_id = $2 AND slot_time IS NOT NULL
         ORDER BY slot_time DESC
         LIMIT 1"
    ))
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_scheduled(pool: &PgPool, user_id: i64) -> Result<Vec<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>(&format!(
        "SELECT {COLUMNS} FROM booked_courses
         WHERE user_id = $1 AND slot_time IS NOT NULL
         ORDER BY slot_time"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn list_scheduled_with_course(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<ScheduledBooking>, sqlx::Error> {
    sqlx::query_as::<_, ScheduledBooking>(
        "SELECT bc.id, bc.course_id, c.name AS course_name, c.level, c.thumbnail, c.material,
                bc.venue, bc.slot_time
         FROM booked_courses bc
         JOIN courses c ON bc.course_id = c.id
         WHERE bc.user_id = $1 AND bc.slot_time IS NOT NULL
         ORDER BY bc.slot_time",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn list_registered(pool: &PgPool, user_id: i64) -> Result<Vec<RegisteredCourse>, sqlx::Error> {
    sqlx::query_as::<_, RegisteredCourse>(
        "SELECT bc.id, bc.course_id, c.name AS course_name, c.level, c.thumbnail, c.material,
                (SELECT COUNT(*) FROM test_scores t
                 WHERE t.user_id = bc.user_id AND t.course_id = bc.course_id) AS attempts
         FROM booked_courses bc
         JOIN courses c ON bc.course_id = c.id
         WHERE bc.user_id = $1 AND bc.slot_time IS NULL
         ORDER BY bc.id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Creates a slot-less registration unless the student already holds any
/// booking row for the course. Returns `None` when one exists.
pub async fn register(pool: &PgPool, user_id: i64, course_id: i64) -> Result<Option<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>(&format!(
        "INSERT INTO booked_courses (user_id, course_id, venue, slot_time)
         SELECT $1, $2, NULL, NULL
         WHERE NOT EXISTS (
             SELECT 1 FROM booked_courses WHERE user_id = $1 AND course_id = $2
         )
         RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await
}

/// Replaces the slot-less registration with a booked slot.
/// Returns `None` if the student was not registered for the course.
pub async fn book_slot(
    pool: &PgPool,
    user_id: i64,
    course_id: i64,
    venue: &str,
    slot_time: DateTime<Utc>,
) -> Result<Option<Booking>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query(
        "DELETE FROM booked_courses WHERE user_id = $1 AND course_id = $2 AND slot_time IS NULL",
    )
    .bind(user_id)
    .bind(course_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if removed == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    let booking = sqlx::query_as::<_, Booking>(&format!(
        "INSERT INTO booked_courses (user_id, course_id, venue, slot_time)
         VALUES ($1, $2, $3, $4)
         RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(course_id)
    .bind(venue)
    .bind(slot_time)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(booking))
}

/// Deletes one of the caller's bookings. Deleting a missing row is not an error.
pub async fn delete_owned(pool: &PgPool, id: i64, user_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM booked_courses WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete(conn: &mut PgConnection, id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM booked_courses WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
