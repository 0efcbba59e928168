// src/repositories/scores.rs

use sqlx::{PgConnection, PgPool};

use crate::models::score::ScoreRecord;

pub(crate) const COLUMNS: &str = "id, user_id, course_id, score, test_date";

pub async fn insert(
    conn: &mut PgConnection,
    user_id: i64,
    course_id: i64,
    score: i64,
) -> Result<ScoreRecord, sqlx::Error> {
    sqlx::query_as::<_, ScoreRecord>(&format!(
        "INSERT INTO test_scores (user_id, course_id, score)
         VALUES ($1, $2, $3)
         RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(course_id)
    .bind(score)
    .fetch_one(conn)
    .await
}

/// Adds one point after an upheld review.
pub async fn increment(pool: &PgPool, id: i64) -> Result<Option<ScoreRecord>, sqlx::Error> {
    sqlx::query_as::<_, ScoreRecord>(&format!(
        "UPDATE test_scores SET score = score + 1 WHERE id = $1 RETURNING {COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// A course counts as completed once any attempt scored at least 1.
pub async fn has_completed(pool: &PgPool, user_id: i64, course_id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (
             SELECT 1 FROM test_scores WHERE user_id = $1 AND course_id = $2 AND score >= 1
         )",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(pool)
    .await
}
