// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use url::Url;
use validator::Validate;

use super::mcq::{Mcq, McqInput};

/// Represents the 'courses' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub level: String,
    pub thumbnail: Option<String>,

    /// Link to the study material.
    pub material: Option<String>,

    /// Study years the course is offered to.
    pub years: Json<Vec<i32>>,

    /// Departments the course is offered to.
    pub departments: Json<Vec<String>>,
}

impl Course {
    /// Whether a student of `department` in `year` may register.
    pub fn is_offered_to(&self, department: Option<&str>, year: Option<i32>) -> bool {
        let dept_ok = department.is_some_and(|d| self.departments.iter().any(|c| c == d));
        let year_ok = year.is_some_and(|y| self.years.contains(&y));
        dept_ok && year_ok
    }
}

/// Admin view of a course with its whole question bank.
#[derive(Debug, Serialize)]
pub struct CourseWithMcqs {
    #[serde(flatten)]
    pub course: Course,
    pub mcqs: Vec<Mcq>,
}

/// DTO for creating a course, optionally with an initial question bank.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 50))]
    pub level: String,
    #[validate(custom(function = validate_url_string))]
    pub thumbnail: Option<String>,
    #[validate(custom(function = validate_url_string))]
    pub material: Option<String>,
    #[serde(default)]
    pub years: Vec<i32>,
    #[serde(default)]
    pub departments: Vec<String>,
    #[serde(default)]
    #[validate(nested)]
    pub mcqs: Vec<McqInput>,
}

/// DTO for updating a course. MCQs with an `id` are edited, others inserted.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 50))]
    pub level: String,
    #[validate(custom(function = validate_url_string))]
    pub thumbnail: Option<String>,
    #[validate(custom(function = validate_url_string))]
    pub material: Option<String>,
    #[serde(default)]
    pub years: Vec<i32>,
    #[serde(default)]
    pub departments: Vec<String>,
    #[serde(default)]
    #[validate(nested)]
    pub mcqs: Vec<McqInput>,
}

/// Validates that a string is a correctly formatted URL.
fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}
