// src/models/mod.rs

pub mod booking;
pub mod course;
pub mod mcq;
pub mod review;
pub mod score;
pub mod test_session;
pub mod user;
