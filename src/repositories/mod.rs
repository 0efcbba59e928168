// src/repositories/mod.rs

//! SQL access, one module per table. Queries are built at runtime so the
//! crate compiles without a live database.

pub mod bookings;
pub mod courses;
pub mod mcqs;
pub mod reviews;
pub mod scores;
pub mod sessions;
pub mod users;

/// Postgres `unique_violation`.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}
