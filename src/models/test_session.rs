// src/models/test_session.rs

use serde::Deserialize;

/// DTO for passing the instructions gate: one flag per instruction, in order.
#[derive(Debug, Deserialize)]
pub struct StartTestRequest {
    pub acknowledgements: Vec<bool>,
}

/// DTO for selecting (or, when repeated, clearing) an answer.
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: i64,
    pub option: String,
}
