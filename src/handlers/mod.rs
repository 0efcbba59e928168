// src/handlers/mod.rs

pub mod bookings;
pub mod courses;
pub mod mcqs;
pub mod profile;
pub mod reviews;
pub mod scores;
pub mod test_sessions;
