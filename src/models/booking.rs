// src/models/booking.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'booked_courses' table.
/// A row with no `slot_time` is a registration; with one, a booked test slot.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub venue: Option<String>,
    pub slot_time: Option<DateTime<Utc>>,
}

/// A booked slot joined with its course, as listed on the profile page.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ScheduledBooking {
    pub id: i64,
    pub course_id: i64,
    pub course_name: String,
    pub level: String,
    pub thumbnail: Option<String>,
    pub material: Option<String>,
    pub venue: Option<String>,
    pub slot_time: DateTime<Utc>,
}

/// A registration still waiting for a slot.
#[derive(Debug, Serialize, FromRow)]
pub struct RegisteredCourse {
    pub id: i64,
    pub course_id: i64,
    pub course_name: String,
    pub level: String,
    pub thumbnail: Option<String>,
    pub material: Option<String>,

    /// Scores already recorded for this course.
    pub attempts: i64,
}

/// DTO for booking a test slot.
#[derive(Debug, Deserialize, Validate)]
pub struct BookSlotRequest {
    pub course_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub venue: String,
    pub slot_time: DateTime<Utc>,
}
