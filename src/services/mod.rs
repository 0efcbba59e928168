// src/services/mod.rs

pub mod ai_drafts;
pub mod countdown;
pub mod ingest;
pub mod session_manager;
pub mod test_session;
