// src/models/mcq.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Valid values of `correct_option`.
pub const OPTION_TOKENS: [&str; 4] = ["1", "2", "3", "4"];

/// Identity of a question for deduplication: (course id, question text).
/// Exact match, case and whitespace sensitive.
pub type McqKey = (i64, String);

/// Represents the 'mcqs' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Mcq {
    pub id: i64,
    pub course_id: i64,
    pub question: String,
    pub option1: String,
    pub option2: String,
    pub option3: String,
    pub option4: String,

    /// One of "1".."4".
    pub correct_option: String,
}

/// DTO for sending a question to a student (excludes the correct option).
#[derive(Debug, Clone, Serialize)]
pub struct PublicMcq {
    pub id: i64,
    pub question: String,
    pub option1: String,
    pub option2: String,
    pub option3: String,
    pub option4: String,
}

impl From<&Mcq> for PublicMcq {
    fn from(mcq: &Mcq) -> Self {
        Self {
            id: mcq.id,
            question: mcq.question.clone(),
            option1: mcq.option1.clone(),
            option2: mcq.option2.clone(),
            option3: mcq.option3.clone(),
            option4: mcq.option4.clone(),
        }
    }
}

/// A question ready to be inserted, already bound to its course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMcq {
    pub course_id: i64,
    pub question: String,
    pub option1: String,
    pub option2: String,
    pub option3: String,
    pub option4: String,
    pub correct_option: String,
}

impl NewMcq {
    pub fn key(&self) -> McqKey {
        (self.course_id, self.question.clone())
    }
}

/// DTO for a manually entered question.
/// `id` is present when editing an existing question inside a course update.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct McqInput {
    pub id: Option<i64>,
    #[validate(length(min = 1, max = 2000))]
    pub question: String,
    #[validate(length(min = 1, max = 500))]
    pub option1: String,
    #[validate(length(min = 1, max = 500))]
    pub option2: String,
    #[validate(length(min = 1, max = 500))]
    pub option3: String,
    #[validate(length(min = 1, max = 500))]
    pub option4: String,
    #[validate(custom(function = validate_option_token))]
    pub correct_option: String,
}

impl McqInput {
    pub fn into_new(self, course_id: i64) -> NewMcq {
        NewMcq {
            course_id,
            question: self.question,
            option1: self.option1,
            option2: self.option2,
            option3: self.option3,
            option4: self.option4,
            correct_option: self.correct_option,
        }
    }
}

/// DTO for the admin correcting the answer key of one question.
#[derive(Debug, Deserialize, Validate)]
pub struct CorrectOptionRequest {
    #[validate(custom(function = validate_option_token))]
    pub correct_option: String,
}

pub fn is_option_token(value: &str) -> bool {
    OPTION_TOKENS.contains(&value)
}

/// Restricts an option token to "1".."4".
fn validate_option_token(value: &str) -> Result<(), validator::ValidationError> {
    if !is_option_token(value) {
        return Err(validator::ValidationError::new("invalid_option_token"));
    }
    Ok(())
}
