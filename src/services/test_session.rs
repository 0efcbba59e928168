// src/services/test_session.rs

//! One student's timed attempt at a course's question sample.
//!
//! Time never advances by itself here: every transition takes `now` and
//! re-derives the window phase from the booked slot, so a client clock has
//! no say in how long the attempt lasts.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{
    booking::Booking,
    mcq::{Mcq, is_option_token},
};

/// Acknowledgements required before the countdown starts.
pub const INSTRUCTIONS: [&str; 6] = [
    "The test must be completed within the allocated time, and the test is auto-submitted after the allotted time.",
    "Students must take the exam independently without external help.",
    "Any suspicious activity, such as looking away frequently, opening new tabs, or receiving external help, may result in disqualification.",
    "Taking screenshots, recording, or distributing exam materials is strictly prohibited and may result in disciplinary action.",
    "Any student found violating exam rules may face penalties, including disqualification, score cancellation or disciplinary action.",
    "I agree to abide by the academic integrity policies of the institution.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotBooked,
    AwaitingWindow,
    Instructions,
    Active,
    Finalizing,
    Finalized,
    Expired,
}

/// Where `now` falls relative to a booked slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    Upcoming,
    Open,
    Closed,
}

/// A booked slot: `[start, start + duration]`, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SlotWindow {
    pub fn new(start: DateTime<Utc>, duration_secs: i64) -> Self {
        Self {
            start,
            end: start + Duration::seconds(duration_secs),
        }
    }

    pub fn phase(&self, now: DateTime<Utc>) -> WindowPhase {
        if now > self.end {
            WindowPhase::Closed
        } else if now < self.start {
            WindowPhase::Upcoming
        } else {
            WindowPhase::Open
        }
    }

    /// Whole seconds left until the end of the window, never negative.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.end - now).num_seconds().max(0) as u64
    }
}

/// What ended an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishTrigger {
    Manual,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The operation is not allowed in the current state.
    InvalidState(SessionState),
    /// Not every instruction was acknowledged.
    InstructionsNotAccepted,
    /// The window closed; the caller must finalize with a timeout.
    DeadlinePassed,
    UnknownQuestion(i64),
    InvalidOption(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidState(state) => {
                write!(f, "Operation not allowed while the test is {:?}", state)
            }
            SessionError::InstructionsNotAccepted => {
                write!(f, "All instructions must be accepted before starting")
            }
            SessionError::DeadlinePassed => write!(f, "The test window has closed"),
            SessionError::UnknownQuestion(id) => {
                write!(f, "Question {} is not part of this test", id)
            }
            SessionError::InvalidOption(opt) => write!(f, "Invalid option {:?}", opt),
        }
    }
}

impl std::error::Error for SessionError {}

/// Counts answers equal to the question's correct option. No partial credit.
pub fn score_answers(questions: &[Mcq], answers: &BTreeMap<i64, String>) -> i64 {
    questions
        .iter()
        .filter(|q| answers.get(&q.id) == Some(&q.correct_option))
        .count() as i64
}

/// Threshold on score/total for filing review requests after a test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewPolicy {
    pub min_score_ratio: f64,
    pub max_requests: usize,
}

impl ReviewPolicy {
    /// With no questions the ratio is undefined and nobody is eligible.
    pub fn is_eligible(&self, score: i64, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        score as f64 / total as f64 >= self.min_score_ratio
    }
}

/// Result of a finished attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptResult {
    pub score: i64,
    pub total: usize,
    pub trigger: FinishTrigger,
    pub review_eligible: bool,
    pub max_review_requests: usize,
}

#[derive(Debug, Clone)]
pub struct TestSession {
    pub booking_id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub window: SlotWindow,
    state: SessionState,
    questions: Vec<Mcq>,
    answers: BTreeMap<i64, String>,
    pending_trigger: Option<FinishTrigger>,
    resume_state: Option<SessionState>,
    result: Option<AttemptResult>,
}

impl TestSession {
    /// Opens a session for a booked slot.
    ///
    /// Past the window the session is `Expired` right away and must be
    /// finalized with score 0; inside it the instructions gate comes first.
    pub fn open(
        booking: &Booking,
        slot_start: DateTime<Utc>,
        duration_secs: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let window = SlotWindow::new(slot_start, duration_secs);
        let state = match window.phase(now) {
            WindowPhase::Upcoming => SessionState::AwaitingWindow,
            WindowPhase::Open => SessionState::Instructions,
            WindowPhase::Closed => SessionState::Expired,
        };

        Self {
            booking_id: booking.id,
            user_id: booking.user_id,
            course_id: booking.course_id,
            window,
            state,
            questions: Vec::new(),
            answers: BTreeMap::new(),
            pending_trigger: None,
            resume_state: None,
            result: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn questions(&self) -> &[Mcq] {
        &self.questions
    }

    pub fn answers(&self) -> &BTreeMap<i64, String> {
        &self.answers
    }

    pub fn result(&self) -> Option<&AttemptResult> {
        self.result.as_ref()
    }

    /// Re-derives the phase for a session that has not started yet.
    /// `AwaitingWindow` moves to `Instructions` once the window opens; any
    /// session left unstarted past the window becomes `Expired`.
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        let phase = self.window.phase(now);
        match (self.state, phase) {
            (SessionState::AwaitingWindow, WindowPhase::Open) => {
                self.state = SessionState::Instructions;
            }
            (SessionState::AwaitingWindow | SessionState::Instructions, WindowPhase::Closed) => {
                self.state = SessionState::Expired;
            }
            _ => {}
        }
    }

    /// Whether the session is running but its window has closed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.state == SessionState::Active && self.window.phase(now) == WindowPhase::Closed
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        match self.state {
            SessionState::Active | SessionState::Instructions | SessionState::AwaitingWindow => {
                self.window.remaining_secs(now)
            }
            _ => 0,
        }
    }

    /// Passes the instructions gate with one flag per entry of `INSTRUCTIONS`.
    pub fn accept_instructions(
        &mut self,
        acknowledgements: &[bool],
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        self.refresh(now);
        if self.state != SessionState::Instructions {
            return Err(SessionError::InvalidState(self.state));
        }
        if acknowledgements.len() != INSTRUCTIONS.len() || !acknowledgements.iter().all(|ack| *ack)
        {
            return Err(SessionError::InstructionsNotAccepted);
        }
        Ok(())
    }

    /// Starts the countdown with the sampled questions. The sample is kept
    /// for the rest of the session; navigating never re-samples.
    pub fn activate(&mut self, questions: Vec<Mcq>, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.refresh(now);
        if self.state != SessionState::Instructions {
            return Err(SessionError::InvalidState(self.state));
        }
        self.questions = questions;
        self.state = SessionState::Active;
        Ok(())
    }

    /// Records a choice. Choosing the option already selected clears it.
    /// Returns the answer now held for the question.
    pub fn select_answer(
        &mut self,
        question_id: i64,
        option: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, SessionError> {
        if self.state != SessionState::Active {
            return Err(SessionError::InvalidState(self.state));
        }
        if self.window.phase(now) == WindowPhase::Closed {
            return Err(SessionError::DeadlinePassed);
        }
        if !self.questions.iter().any(|q| q.id == question_id) {
            return Err(SessionError::UnknownQuestion(question_id));
        }
        if !is_option_token(option) {
            return Err(SessionError::InvalidOption(option.to_string()));
        }

        if self.answers.get(&question_id).map(String::as_str) == Some(option) {
            self.answers.remove(&question_id);
            Ok(None)
        } else {
            self.answers.insert(question_id, option.to_string());
            Ok(Some(option.to_string()))
        }
    }

    /// Claims the single finalization of this session and computes its score.
    ///
    /// Only one caller wins: the session leaves `Active` (or `Expired`, which
    /// scores 0) and any later call fails until `abort_finalize` puts it back.
    pub fn begin_finalize(&mut self, trigger: FinishTrigger) -> Result<i64, SessionError> {
        if self.result.is_some() {
            return Err(SessionError::InvalidState(self.state));
        }
        let score = match self.state {
            SessionState::Active => score_answers(&self.questions, &self.answers),
            SessionState::Expired => 0,
            other => return Err(SessionError::InvalidState(other)),
        };
        self.pending_trigger = Some(trigger);
        self.resume_state = Some(self.state);
        self.state = SessionState::Finalizing;
        Ok(score)
    }

    /// Marks the attempt persisted.
    pub fn complete_finalize(
        &mut self,
        score: i64,
        policy: &ReviewPolicy,
    ) -> Result<&AttemptResult, SessionError> {
        if self.state != SessionState::Finalizing {
            return Err(SessionError::InvalidState(self.state));
        }
        let trigger = self.pending_trigger.take().unwrap_or(FinishTrigger::Timeout);
        let expired = self.resume_state.take() == Some(SessionState::Expired);
        let total = self.questions.len();
        let result = AttemptResult {
            score,
            total,
            trigger,
            review_eligible: policy.is_eligible(score, total),
            max_review_requests: policy.max_requests,
        };
        // A slot that was never started stays `Expired` once its zero is recorded.
        self.state = if expired {
            SessionState::Expired
        } else {
            SessionState::Finalized
        };
        Ok(&*self.result.insert(result))
    }

    /// Persistence failed: the session goes back to where it was so a later
    /// call can retry.
    pub fn abort_finalize(&mut self) {
        if self.state == SessionState::Finalizing {
            self.pending_trigger = None;
            self.state = self.resume_state.take().unwrap_or(SessionState::Active);
        }
    }
}
