// src/repositories/reviews.rs

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::review::{NewReview, PendingReview, QuestionReview, STATUS_PENDING, STATUS_REVIEWED};

pub async fn insert_many(pool: &PgPool, reviews: &[NewReview]) -> Result<(), sqlx::Error> {
    if reviews.is_empty() {
        return Ok(());
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO question_reviews (user_id, course_id, question_id, comment, status) ",
    );
    builder.push_values(reviews, |mut row, review| {
        row.push_bind(review.user_id)
            .push_bind(review.course_id)
            .push_bind(review.question_id)
            .push_bind(&review.comment)
            .push_bind(STATUS_PENDING);
    });
    builder.build().execute(pool).await?;
    Ok(())
}

pub async fn list_by_user(pool: &PgPool, user_id: i64) -> Result<Vec<QuestionReview>, sqlx::Error> {
    sqlx::query_as::<_, QuestionReview>(
        "SELECT qr.id, qr.user_id, qr.course_id, c.name AS course_name, qr.question_id,
                qr.comment, qr.status, qr.admin_feedback, qr.created_at
         FROM question_reviews qr
         JOIN courses c ON qr.course_id = c.id
         WHERE qr.user_id = $1
         ORDER BY qr.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Pending requests with the disputed question and the student's latest
/// attempt for the course, which is the row a score increment applies to.
pub async fn list_pending(pool: &PgPool) -> Result<Vec<PendingReview>, sqlx::Error> {
    sqlx::query_as::<_, PendingReview>(
        "SELECT qr.id, latest.id AS test_score_id, qr.user_id, u.name AS student_name,
                u.register_number, qr.course_id, c.name AS course_name, qr.question_id,
                qr.comment, qr.status, qr.created_at,
                m.question, m.option1, m.option2, m.option3, m.option4, m.correct_option
         FROM question_reviews qr
         JOIN (
             SELECT MAX(id) AS id, user_id, course_id
             FROM test_scores
             GROUP BY user_id, course_id
         ) latest ON latest.user_id = qr.user_id AND latest.course_id = qr.course_id
         JOIN users u ON qr.user_id = u.id
         JOIN courses c ON qr.course_id = c.id
         LEFT JOIN mcqs m ON m.id = qr.question_id
         WHERE qr.status = $1
         ORDER BY qr.created_at DESC",
    )
    .bind(STATUS_PENDING)
    .fetch_all(pool)
    .await
}

pub async fn mark_reviewed(pool: &PgPool, id: i64, admin_feedback: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE question_reviews SET status = $1, admin_feedback = $2 WHERE id = $3",
    )
    .bind(STATUS_REVIEWED)
    .bind(admin_feedback)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
