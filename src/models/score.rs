// src/models/score.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'test_scores' table. Append only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub score: i64,
    pub test_date: chrono::DateTime<chrono::Utc>,
}

/// DTO for appending a score row.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreScoreRequest {
    pub user_id: i64,
    pub course_id: i64,
    pub score: i64,
}
