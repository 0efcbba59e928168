// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'users' table in the database.
/// Credentials live with the identity provider, not here.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub register_number: Option<String>,

    /// Used to decide which courses are offered to a student.
    pub department: Option<String>,
    pub year: Option<i32>,

    /// 'student' or 'admin'.
    pub role: String,
}
