// src/repositories/mcqs.rs

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::{
    models::mcq::{Mcq, McqKey, NewMcq},
    services::ingest::McqStore,
};

pub(crate) const COLUMNS: &str =
    "id, course_id, question, option1, option2, option3, option4, correct_option";

/// Rows per INSERT statement. Seven binds each stays well under the
/// protocol's 65535 bind limit.
const INSERT_CHUNK: usize = 5000;

pub async fn list_by_course(pool: &PgPool, course_id: i64) -> Result<Vec<Mcq>, sqlx::Error> {
    sqlx::query_as::<_, Mcq>(&format!(
        "SELECT {COLUMNS} FROM mcqs WHERE course_id = $1 ORDER BY id"
    ))
    .bind(course_id)
    .fetch_all(pool)
    .await
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<Mcq>, sqlx::Error> {
    sqlx::query_as::<_, Mcq>(&format!("SELECT {COLUMNS} FROM mcqs ORDER BY course_id, id"))
        .fetch_all(pool)
        .await
}

/// Up to `limit` questions of a course in random order.
pub async fn sample(pool: &PgPool, course_id: i64, limit: i64) -> Result<Vec<Mcq>, sqlx::Error> {
    sqlx::query_as::<_, Mcq>(&format!(
        "SELECT {COLUMNS} FROM mcqs WHERE course_id = $1 ORDER BY RANDOM() LIMIT $2"
    ))
    .bind(course_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn existing_keys(pool: &PgPool, course_id: i64) -> Result<Vec<McqKey>, sqlx::Error> {
    sqlx::query_as::<_, (i64, String)>("SELECT course_id, question FROM mcqs WHERE course_id = $1")
        .bind(course_id)
        .fetch_all(pool)
        .await
}

/// Inserts rows, silently skipping any that collide with an existing
/// (course, question). Returns the number actually written.
pub async fn insert_rows(conn: &mut PgConnection, entries: &[NewMcq]) -> Result<u64, sqlx::Error> {
    let mut written = 0;

    for chunk in entries.chunks(INSERT_CHUNK) {
        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO mcqs (course_id, question, option1, option2, option3, option4, correct_option) ",
        );
        builder.push_values(chunk, |mut row, mcq| {
            row.push_bind(mcq.course_id)
                .push_bind(&mcq.question)
                .push_bind(&mcq.option1)
                .push_bind(&mcq.option2)
                .push_bind(&mcq.option3)
                .push_bind(&mcq.option4)
                .push_bind(&mcq.correct_option);
        });
        builder.push(" ON CONFLICT (course_id, question) DO NOTHING");

        written += builder.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(written)
}

/// All-or-nothing batch insert used by bulk upload.
pub async fn insert_batch(pool: &PgPool, entries: &[NewMcq]) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let written = insert_rows(&mut tx, entries).await?;
    tx.commit().await?;
    Ok(written)
}

/// Rewrites one question. With `course_id` set the row must belong to it.
pub async fn update(
    conn: &mut PgConnection,
    id: i64,
    course_id: Option<i64>,
    mcq: &NewMcq,
) -> Result<Option<Mcq>, sqlx::Error> {
    sqlx::query_as::<_, Mcq>(&format!(
        "UPDATE mcqs
         SET question = $1, option1 = $2, option2 = $3, option3 = $4, option4 = $5, correct_option = $6
         WHERE id = $7 AND ($8::BIGINT IS NULL OR course_id = $8)
         RETURNING {COLUMNS}"
    ))
    .bind(&mcq.question)
    .bind(&mcq.option1)
    .bind(&mcq.option2)
    .bind(&mcq.option3)
    .bind(&mcq.option4)
    .bind(&mcq.correct_option)
    .bind(id)
    .bind(course_id)
    .fetch_optional(conn)
    .await
}

pub async fn set_correct_option(
    pool: &PgPool,
    id: i64,
    correct_option: &str,
) -> Result<Option<Mcq>, sqlx::Error> {
    sqlx::query_as::<_, Mcq>(&format!(
        "UPDATE mcqs SET correct_option = $1 WHERE id = $2 RETURNING {COLUMNS}"
    ))
    .bind(correct_option)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM mcqs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[async_trait]
impl McqStore for PgPool {
    async fn existing_keys(&self, course_id: i64) -> Result<Vec<McqKey>, sqlx::Error> {
        existing_keys(self, course_id).await
    }

    async fn insert_batch(&self, entries: &[NewMcq]) -> Result<u64, sqlx::Error> {
        insert_batch(self, entries).await
    }
}
