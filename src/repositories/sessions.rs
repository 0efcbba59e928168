// src/repositories/sessions.rs

//! Postgres backing for `SessionManager`.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{bookings, mcqs, reviews, scores};
use crate::{
    models::{booking::Booking, mcq::Mcq, review::NewReview},
    services::session_manager::SessionStore,
};

#[async_trait]
impl SessionStore for PgPool {
    async fn booked_slot(&self, user_id: i64, course_id: i64) -> Result<Option<Booking>, sqlx::Error> {
        bookings::find_slot(self, user_id, course_id).await
    }

    async fn scheduled_bookings(&self, user_id: i64) -> Result<Vec<Booking>, sqlx::Error> {
        bookings::list_scheduled(self, user_id).await
    }

    async fn sample_questions(&self, course_id: i64, limit: i64) -> Result<Vec<Mcq>, sqlx::Error> {
        mcqs::sample(self, course_id, limit).await
    }

    async fn record_attempt(
        &self,
        booking_id: i64,
        user_id: i64,
        course_id: i64,
        score: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        let mut tx = self.begin().await?;

        // Whoever deletes the booking owns the attempt; a racing finalize
        // finds nothing to delete and writes no score.
        if bookings::delete(&mut tx, booking_id).await? == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let record = scores::insert(&mut tx, user_id, course_id, score).await?;
        tx.commit().await?;
        Ok(Some(record.id))
    }

    async fn insert_reviews(&self, items: &[NewReview]) -> Result<(), sqlx::Error> {
        reviews::insert_many(self, items).await
    }
}
