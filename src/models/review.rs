// src/models/review.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

pub const STATUS_PENDING: &str = "Pending";
pub const STATUS_REVIEWED: &str = "Reviewed";

/// Represents the 'question_reviews' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionReview {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub course_name: String,
    pub question_id: i64,
    pub comment: String,

    /// 'Pending' or 'Reviewed'.
    pub status: String,
    pub admin_feedback: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A review request about to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub user_id: i64,
    pub course_id: i64,
    pub question_id: i64,
    pub comment: String,
}

/// Pending review joined with the disputed question and the student's latest attempt.
#[derive(Debug, Serialize, FromRow)]
pub struct PendingReview {
    pub id: i64,
    pub test_score_id: i64,
    pub user_id: i64,
    pub student_name: String,
    pub register_number: Option<String>,
    pub course_id: i64,
    pub course_name: String,
    pub question_id: i64,
    pub comment: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub question: Option<String>,
    pub option1: Option<String>,
    pub option2: Option<String>,
    pub option3: Option<String>,
    pub option4: Option<String>,
    pub correct_option: Option<String>,
}

/// One flagged question in a post-test review submission.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewItem {
    pub question_id: i64,
    pub comment: String,
}

/// DTO for filing review requests after a finished test.
#[derive(Debug, Deserialize)]
pub struct SubmitReviewsRequest {
    pub requests: Vec<ReviewItem>,
}

/// DTO for the admin closing a review.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(length(min = 1, max = 2000))]
    pub admin_feedback: String,
}
