// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

const DEFAULT_AI_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_AI_MODEL: &str = "llama3-70b-8192";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub port: u16,
    pub frontend_origin: String,

    /// Directory where multipart uploads are staged before ingestion.
    pub upload_dir: String,
    pub max_upload_bytes: usize,

    /// Length of a booked test window.
    pub slot_duration_secs: i64,
    pub test_question_count: i64,

    /// Minimum score/total ratio to file review requests.
    /// `0.0` admits every finished attempt.
    pub review_min_score_ratio: f64,
    pub max_review_requests: usize,
    /// How long after finishing a student may still file review requests.
    pub review_window_secs: u64,

    pub ai_api_url: String,
    pub ai_api_key: Option<String>,
    pub ai_model: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration: parse_or("JWT_EXPIRATION", 7200),
            rust_log,
            port: parse_or("PORT", 5000),
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            slot_duration_secs: parse_or("SLOT_DURATION_SECS", 3600),
            test_question_count: parse_or("TEST_QUESTION_COUNT", 20),
            review_min_score_ratio: parse_or("REVIEW_MIN_SCORE_RATIO", 0.0),
            max_review_requests: parse_or("MAX_REVIEW_REQUESTS", 2),
            review_window_secs: parse_or("REVIEW_WINDOW_SECS", 3600),
            ai_api_url: env::var("AI_API_URL").unwrap_or_else(|_| DEFAULT_AI_API_URL.to_string()),
            ai_api_key: env::var("AI_API_KEY").ok().filter(|key| !key.is_empty()),
            ai_model: env::var("AI_MODEL").unwrap_or_else(|_| DEFAULT_AI_MODEL.to_string()),
        }
    }

    /// Configuration for tests and tools that never read the environment.
    pub fn for_tests(database_url: &str, jwt_secret: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            jwt_secret: jwt_secret.to_string(),
            jwt_expiration: 600,
            rust_log: "error".to_string(),
            port: 0,
            frontend_origin: "http://localhost:5173".to_string(),
            upload_dir: env::temp_dir()
                .join("exam-portal-uploads")
                .to_string_lossy()
                .into_owned(),
            max_upload_bytes: 10 * 1024 * 1024,
            slot_duration_secs: 3600,
            test_question_count: 20,
            review_min_score_ratio: 0.0,
            max_review_requests: 2,
            review_window_secs: 3600,
            ai_api_url: DEFAULT_AI_API_URL.to_string(),
            ai_api_key: None,
            ai_model: DEFAULT_AI_MODEL.to_string(),
        }
    }
}

/// Reads `key` and parses it, falling back to `default` when unset.
/// A set-but-malformed value is a startup error.
fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{} has an invalid value {:?}: {}", key, raw, e)),
        Err(_) => default,
    }
}
