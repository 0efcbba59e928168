// src/services/session_manager.rs

//! Server-resident test sessions.
//!
//! Sessions are cached per (student, course) from the first open until they
//! are finalized. Every call re-derives the window phase from the booked
//! slot and the server clock.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::{sync::Mutex, time::Instant};

use super::{
    countdown::Countdown,
    test_session::{
        AttemptResult, FinishTrigger, INSTRUCTIONS, ReviewPolicy, SessionError, SessionState,
        SlotWindow, TestSession, WindowPhase,
    },
};
use crate::{
    config::Config,
    error::AppError,
    models::{
        booking::Booking,
        mcq::{Mcq, PublicMcq},
        review::{NewReview, ReviewItem},
    },
    utils::html::clean_html,
};

/// Storage used by test sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The caller's booking for `course_id` that has a slot time, if any.
    async fn booked_slot(&self, user_id: i64, course_id: i64) -> Result<Option<Booking>, sqlx::Error>;

    /// All of the caller's bookings that have a slot time.
    async fn scheduled_bookings(&self, user_id: i64) -> Result<Vec<Booking>, sqlx::Error>;

    /// Up to `limit` questions of the course in random order.
    async fn sample_questions(&self, course_id: i64, limit: i64) -> Result<Vec<Mcq>, sqlx::Error>;

    /// Deletes the booking and, only if it still existed, appends a score row.
    /// Returns the new score id, or `None` when the booking was already gone.
    async fn record_attempt(
        &self,
        booking_id: i64,
        user_id: i64,
        course_id: i64,
        score: i64,
    ) -> Result<Option<i64>, sqlx::Error>;

    async fn insert_reviews(&self, reviews: &[NewReview]) -> Result<(), sqlx::Error>;
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub slot_duration_secs: i64,
    pub question_count: i64,
    pub review: ReviewPolicy,
    /// How long a finished attempt accepts review requests.
    pub review_window: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            slot_duration_secs: config.slot_duration_secs,
            question_count: config.test_question_count,
            review: ReviewPolicy {
                min_score_ratio: config.review_min_score_ratio,
                max_requests: config.max_review_requests,
            },
            review_window: Duration::from_secs(config.review_window_secs),
        }
    }
}

/// What a student sees of their session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub state: SessionState,
    pub course_id: i64,
    pub booking_id: Option<i64>,
    pub window: Option<SlotWindow>,
    pub remaining_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Vec<&'static str>>,
    pub questions: Vec<PublicMcq>,
    pub answers: BTreeMap<i64, String>,
    pub result: Option<AttemptResult>,
}

impl SessionView {
    fn not_booked(course_id: i64) -> Self {
        Self {
            state: SessionState::NotBooked,
            course_id,
            booking_id: None,
            window: None,
            remaining_seconds: 0,
            instructions: None,
            questions: Vec::new(),
            answers: BTreeMap::new(),
            result: None,
        }
    }

    fn of(session: &TestSession) -> Self {
        let now = Utc::now();
        let state = session.state();
        Self {
            state,
            course_id: session.course_id,
            booking_id: Some(session.booking_id),
            window: Some(session.window),
            remaining_seconds: session.remaining_secs(now),
            instructions: (state == SessionState::Instructions).then(|| INSTRUCTIONS.to_vec()),
            questions: session.questions().iter().map(PublicMcq::from).collect(),
            answers: session.answers().clone(),
            result: session.result().cloned(),
        }
    }
}

type SessionKey = (i64, i64);

struct LiveSession {
    session: TestSession,
    countdown: Option<Countdown>,
}

/// A finalized attempt kept around for filing review requests.
#[derive(Clone)]
struct FinishedAttempt {
    view: SessionView,
    question_ids: HashSet<i64>,
    result: AttemptResult,
    finished_at: Instant,
}

struct Inner {
    store: Arc<dyn SessionStore>,
    settings: SessionSettings,
    live: Mutex<HashMap<SessionKey, LiveSession>>,
    finished: Mutex<HashMap<SessionKey, FinishedAttempt>>,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

enum Cached {
    Current(SessionView),
    Overdue,
    Missing,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, settings: SessionSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                settings,
                live: Mutex::new(HashMap::new()),
                finished: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Opens the session for a course, or refreshes the cached one.
    ///
    /// A slot whose window has already closed is finalized with score 0
    /// without ever becoming active.
    pub async fn open(&self, user_id: i64, course_id: i64) -> Result<SessionView, AppError> {
        let key = (user_id, course_id);

        match self.check_cached(key).await {
            Cached::Current(view) => return Ok(view),
            Cached::Overdue => return self.finalize(key, FinishTrigger::Timeout).await,
            Cached::Missing => {}
        }

        let Some(booking) = self.inner.store.booked_slot(user_id, course_id).await? else {
            return Ok(SessionView::not_booked(course_id));
        };
        let Some(slot_start) = booking.slot_time else {
            return Ok(SessionView::not_booked(course_id));
        };

        let session = TestSession::open(
            &booking,
            slot_start,
            self.inner.settings.slot_duration_secs,
            Utc::now(),
        );
        let expired = session.state() == SessionState::Expired;

        self.inner.finished.lock().await.remove(&key);
        let view = {
            let mut live = self.inner.live.lock().await;
            let entry = live.entry(key).or_insert(LiveSession {
                session,
                countdown: None,
            });
            SessionView::of(&entry.session)
        };

        if expired {
            return self.finalize(key, FinishTrigger::Timeout).await;
        }
        Ok(view)
    }

    /// Passes the instructions gate and starts the countdown.
    /// The question sample is drawn once; starting again returns the same one.
    pub async fn start(
        &self,
        user_id: i64,
        course_id: i64,
        acknowledgements: &[bool],
    ) -> Result<SessionView, AppError> {
        let key = (user_id, course_id);

        match self.check_cached(key).await {
            Cached::Overdue => return self.finalize(key, FinishTrigger::Timeout).await,
            Cached::Missing => {
                return Err(AppError::NotFound(
                    "Open the test before starting it".to_string(),
                ));
            }
            Cached::Current(view) if view.state == SessionState::Active => return Ok(view),
            Cached::Current(_) => {}
        }

        {
            let mut live = self.inner.live.lock().await;
            let entry = live
                .get_mut(&key)
                .ok_or_else(|| AppError::NotFound("No test in progress for this course".to_string()))?;
            entry.session.accept_instructions(acknowledgements, Utc::now())?;
        }

        let questions = self
            .inner
            .store
            .sample_questions(course_id, self.inner.settings.question_count)
            .await
            .map_err(|e| {
                tracing::error!("Failed to sample questions for course {}: {:?}", course_id, e);
                AppError::from(e)
            })?;

        if questions.is_empty() {
            return Err(AppError::NotFound(
                "No questions available for this course".to_string(),
            ));
        }

        let mut live = self.inner.live.lock().await;
        let entry = live
            .get_mut(&key)
            .ok_or_else(|| AppError::NotFound("No test in progress for this course".to_string()))?;

        // A concurrent start already activated the session.
        if entry.session.state() == SessionState::Active {
            return Ok(SessionView::of(&entry.session));
        }

        let now = Utc::now();
        entry.session.activate(questions, now)?;
        let remaining = entry.session.remaining_secs(now);
        entry.countdown = Some(self.arm_countdown(key, remaining));

        tracing::info!(
            user_id,
            course_id,
            remaining,
            questions = entry.session.questions().len(),
            "Test started"
        );

        Ok(SessionView::of(&entry.session))
    }

    /// Toggles an answer. Past the deadline the attempt is submitted instead
    /// and the finalized view is returned.
    pub async fn answer(
        &self,
        user_id: i64,
        course_id: i64,
        question_id: i64,
        option: &str,
    ) -> Result<SessionView, AppError> {
        let key = (user_id, course_id);

        {
            let mut live = self.inner.live.lock().await;
            let entry = live
                .get_mut(&key)
                .ok_or_else(|| AppError::NotFound("No test in progress for this course".to_string()))?;

            match entry.session.select_answer(question_id, option, Utc::now()) {
                Ok(_) => return Ok(SessionView::of(&entry.session)),
                Err(SessionError::DeadlinePassed) => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.finalize(key, FinishTrigger::Timeout).await
    }

    /// Manual "Finish Test". Finishing an already finished attempt returns
    /// its result again.
    pub async fn finish(&self, user_id: i64, course_id: i64) -> Result<SessionView, AppError> {
        let key = (user_id, course_id);

        if self.inner.live.lock().await.contains_key(&key) {
            return self.finalize(key, FinishTrigger::Manual).await;
        }

        self.finished_attempt(key)
            .await
            .map(|attempt| attempt.view)
            .ok_or_else(|| AppError::NotFound("No test in progress for this course".to_string()))
    }

    /// Drops the cached session of a booking the student deleted.
    pub async fn discard_booking(&self, user_id: i64, booking_id: i64) {
        let mut live = self.inner.live.lock().await;
        live.retain(|(user, _), entry| !(*user == user_id && entry.session.booking_id == booking_id));
    }

    /// Files review requests for questions of the last finished attempt.
    pub async fn submit_reviews(
        &self,
        user_id: i64,
        course_id: i64,
        items: &[ReviewItem],
    ) -> Result<usize, AppError> {
        let key = (user_id, course_id);
        let attempt = self
            .finished_attempt(key)
            .await
            .ok_or_else(|| AppError::NotFound("No finished test to review".to_string()))?;

        if !attempt.result.review_eligible {
            return Err(AppError::Forbidden(
                "This attempt is not eligible for review requests".to_string(),
            ));
        }

        let reviews = build_reviews(
            user_id,
            course_id,
            items,
            &attempt.question_ids,
            self.inner.settings.review.max_requests,
        )?;

        self.inner.store.insert_reviews(&reviews).await.map_err(|e| {
            tracing::error!("Failed to store review requests: {:?}", e);
            AppError::from(e)
        })?;

        self.inner.finished.lock().await.remove(&key);
        tracing::info!(user_id, course_id, count = reviews.len(), "Review requests filed");

        Ok(reviews.len())
    }

    /// Sweeps the student's bookings whose window has closed: each becomes a
    /// score row (0 unless a live session had answers) and the booking is
    /// removed. Failures are logged and left for the next load.
    pub async fn reconcile(&self, user_id: i64) -> Result<usize, AppError> {
        let bookings = self.inner.store.scheduled_bookings(user_id).await.map_err(|e| {
            tracing::error!("Failed to load bookings for user {}: {:?}", user_id, e);
            AppError::from(e)
        })?;

        self.prune_finished(&mut *self.inner.finished.lock().await);

        let now = Utc::now();
        let mut swept = 0;

        for booking in bookings {
            let Some(slot_start) = booking.slot_time else {
                continue;
            };
            let window = SlotWindow::new(slot_start, self.inner.settings.slot_duration_secs);
            if window.phase(now) != WindowPhase::Closed {
                continue;
            }

            let key = (user_id, booking.course_id);
            let tracked = self
                .inner
                .live
                .lock()
                .await
                .get(&key)
                .is_some_and(|entry| entry.session.booking_id == booking.id);

            if tracked {
                match self.finalize(key, FinishTrigger::Timeout).await {
                    Ok(_) => swept += 1,
                    Err(e) => tracing::warn!("Could not finalize overdue test {}: {}", booking.id, e),
                }
                continue;
            }

            match self
                .inner
                .store
                .record_attempt(booking.id, user_id, booking.course_id, 0)
                .await
            {
                Ok(Some(_)) => {
                    swept += 1;
                    tracing::info!("Auto-submitted score 0 and removed expired slot {}", booking.id);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Error auto-submitting expired slot {}: {:?}", booking.id, e);
                }
            }
        }

        Ok(swept)
    }

    /// The finished attempt for `key`, unless its review window has passed.
    async fn finished_attempt(&self, key: SessionKey) -> Option<FinishedAttempt> {
        let mut finished = self.inner.finished.lock().await;
        self.prune_finished(&mut finished);
        finished.get(&key).cloned()
    }

    fn prune_finished(&self, finished: &mut HashMap<SessionKey, FinishedAttempt>) {
        let window = self.inner.settings.review_window;
        finished.retain(|_, attempt| attempt.finished_at.elapsed() < window);
    }

    async fn check_cached(&self, key: SessionKey) -> Cached {
        let now = Utc::now();
        let mut live = self.inner.live.lock().await;
        let Some(entry) = live.get_mut(&key) else {
            return Cached::Missing;
        };

        entry.session.refresh(now);
        if entry.session.is_overdue(now) || entry.session.state() == SessionState::Expired {
            Cached::Overdue
        } else {
            Cached::Current(SessionView::of(&entry.session))
        }
    }

    fn arm_countdown(&self, key: SessionKey, seconds: u64) -> Countdown {
        let manager = self.clone();
        Countdown::start(seconds, move || {
            // Finalizing drops this countdown, so it runs on its own task.
            tokio::spawn(async move {
                if let Err(e) = manager.finalize(key, FinishTrigger::Timeout).await {
                    tracing::warn!("Auto-submit for user {} course {} failed: {}", key.0, key.1, e);
                }
            });
        })
    }

    /// The single scoring-and-persistence routine behind manual finish,
    /// countdown expiry, late answers and the sweep.
    async fn finalize(&self, key: SessionKey, trigger: FinishTrigger) -> Result<SessionView, AppError> {
        let (user_id, course_id) = key;

        let (booking_id, score) = {
            let mut live = self.inner.live.lock().await;
            let entry = live
                .get_mut(&key)
                .ok_or_else(|| AppError::NotFound("No test in progress for this course".to_string()))?;
            // An unstarted session past its window finalizes as `Expired`.
            entry.session.refresh(Utc::now());
            let score = entry.session.begin_finalize(trigger)?;
            if let Some(countdown) = entry.countdown.take() {
                countdown.cancel();
            }
            (entry.session.booking_id, score)
        };

        let recorded = self
            .inner
            .store
            .record_attempt(booking_id, user_id, course_id, score)
            .await;

        let mut live = self.inner.live.lock().await;
        match recorded {
            Ok(None) => {
                live.remove(&key);
                tracing::warn!("Booking {} no longer exists; no score recorded", booking_id);
                Err(AppError::Conflict(
                    "This test was already submitted or its booking was removed".to_string(),
                ))
            }
            Ok(Some(_)) => {
                let Some(mut entry) = live.remove(&key) else {
                    return Err(AppError::InternalServerError(format!(
                        "session for user {} course {} vanished while finalizing",
                        user_id, course_id
                    )));
                };
                drop(live);

                let result = entry
                    .session
                    .complete_finalize(score, &self.inner.settings.review)?
                    .clone();
                let view = SessionView::of(&entry.session);

                tracing::info!(
                    user_id,
                    course_id,
                    booking_id,
                    score,
                    total = result.total,
                    trigger = ?result.trigger,
                    "Test finalized"
                );

                if result.total > 0 {
                    let question_ids = entry.session.questions().iter().map(|q| q.id).collect();
                    let mut finished = self.inner.finished.lock().await;
                    self.prune_finished(&mut finished);
                    finished.insert(
                        key,
                        FinishedAttempt {
                            view: view.clone(),
                            question_ids,
                            result,
                            finished_at: Instant::now(),
                        },
                    );
                }

                Ok(view)
            }
            Err(e) => {
                tracing::error!(
                    "Failed to record attempt for booking {}: {:?}",
                    booking_id,
                    e
                );
                if let Some(entry) = live.get_mut(&key) {
                    entry.session.abort_finalize();
                    let now = Utc::now();
                    if entry.session.state() == SessionState::Active && !entry.session.is_overdue(now) {
                        let remaining = entry.session.remaining_secs(now);
                        entry.countdown = Some(self.arm_countdown(key, remaining));
                    }
                }
                Err(AppError::from(e))
            }
        }
    }
}

/// Checks a review submission against the finished attempt and sanitizes
/// the comments.
fn build_reviews(
    user_id: i64,
    course_id: i64,
    items: &[ReviewItem],
    sampled: &HashSet<i64>,
    max_requests: usize,
) -> Result<Vec<NewReview>, AppError> {
    if items.is_empty() {
        return Err(AppError::BadRequest(
            "Select at least one question to review".to_string(),
        ));
    }
    if items.len() > max_requests {
        return Err(AppError::BadRequest(format!(
            "You can select up to {} questions only",
            max_requests
        )));
    }

    let mut seen = HashSet::new();
    let mut reviews = Vec::with_capacity(items.len());
    for item in items {
        if !sampled.contains(&item.question_id) {
            return Err(AppError::BadRequest(format!(
                "Question {} was not part of this test",
                item.question_id
            )));
        }
        if !seen.insert(item.question_id) {
            return Err(AppError::BadRequest(format!(
                "Question {} was selected twice",
                item.question_id
            )));
        }

        let comment = clean_html(item.comment.trim());
        if comment.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Please fill all the fields before submitting.".to_string(),
            ));
        }

        reviews.push(NewReview {
            user_id,
            course_id,
            question_id: item.question_id,
            comment,
        });
    }

    Ok(reviews)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};

    const USER: i64 = 5;
    const COURSE: i64 = 3;

    #[derive(Default)]
    struct Tables {
        bookings: Vec<Booking>,
        mcqs: Vec<Mcq>,
        scores: Vec<(i64, i64, i64)>,
        reviews: Vec<NewReview>,
    }

    #[derive(Default)]
    struct MemoryStore {
        tables: Mutex<Tables>,
        fail_writes: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl SessionStore for MemoryStore {
        async fn booked_slot(&self, user_id: i64, course_id: i64) -> Result<Option<Booking>, sqlx::Error> {
            let tables = self.tables.lock().await;
            Ok(tables
                .bookings
                .iter()
                .find(|b| b.user_id == user_id && b.course_id == course_id && b.slot_time.is_some())
                .cloned())
        }

        async fn scheduled_bookings(&self, user_id: i64) -> Result<Vec<Booking>, sqlx::Error> {
            let tables = self.tables.lock().await;
            Ok(tables
                .bookings
                .iter()
                .filter(|b| b.user_id == user_id && b.slot_time.is_some())
                .cloned()
                .collect())
        }

        async fn sample_questions(&self, course_id: i64, limit: i64) -> Result<Vec<Mcq>, sqlx::Error> {
            let tables = self.tables.lock().await;
            Ok(tables
                .mcqs
                .iter()
                .filter(|m| m.course_id == course_id)
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn record_attempt(
            &self,
            booking_id: i64,
            user_id: i64,
            course_id: i64,
            score: i64,
        ) -> Result<Option<i64>, sqlx::Error> {
            if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(sqlx::Error::PoolTimedOut);
            }
            let mut tables = self.tables.lock().await;
            let before = tables.bookings.len();
            tables.bookings.retain(|b| b.id != booking_id);
            if tables.bookings.len() == before {
                return Ok(None);
            }
            tables.scores.push((user_id, course_id, score));
            Ok(Some(tables.scores.len() as i64))
        }

        async fn insert_reviews(&self, reviews: &[NewReview]) -> Result<(), sqlx::Error> {
            self.tables.lock().await.reviews.extend_from_slice(reviews);
            Ok(())
        }
    }

    fn mcq(id: i64, correct: &str) -> Mcq {
        Mcq {
            id,
            course_id: COURSE,
            question: format!("Question {}", id),
            option1: "a".to_string(),
            option2: "b".to_string(),
            option3: "c".to_string(),
            option4: "d".to_string(),
            correct_option: correct.to_string(),
        }
    }

    fn booking(id: i64, course_id: i64, slot_time: DateTime<Utc>) -> Booking {
        Booking {
            id,
            user_id: USER,
            course_id,
            venue: Some("Lab".to_string()),
            slot_time: Some(slot_time),
        }
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            slot_duration_secs: 3600,
            question_count: 20,
            review: ReviewPolicy {
                min_score_ratio: 0.0,
                max_requests: 2,
            },
            review_window: std::time::Duration::from_secs(3600),
        }
    }

    async fn manager_with(bookings: Vec<Booking>, mcqs: Vec<Mcq>) -> (SessionManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        {
            let mut tables = store.tables.lock().await;
            tables.bookings = bookings;
            tables.mcqs = mcqs;
        }
        (SessionManager::new(store.clone(), settings()), store)
    }

    fn bank(n: i64) -> Vec<Mcq> {
        (1..=n).map(|id| mcq(id, "1")).collect()
    }

    #[tokio::test]
    async fn without_booking_the_session_is_not_booked() {
        let (manager, _) = manager_with(vec![], bank(3)).await;

        let view = manager.open(USER, COURSE).await.unwrap();

        assert_eq!(view.state, SessionState::NotBooked);
    }

    #[tokio::test]
    async fn future_slot_waits_for_its_window() {
        let start = Utc::now() + Duration::minutes(30);
        let (manager, _) = manager_with(vec![booking(1, COURSE, start)], bank(3)).await;

        let view = manager.open(USER, COURSE).await.unwrap();
        assert_eq!(view.state, SessionState::AwaitingWindow);

        let err = manager.start(USER, COURSE, &[true; 6]).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn closed_slot_is_finalized_with_zero_and_never_active() {
        let start = Utc::now() - Duration::minutes(90);
        let (manager, store) = manager_with(vec![booking(1, COURSE, start)], bank(3)).await;

        let view = manager.open(USER, COURSE).await.unwrap();

        assert_eq!(view.state, SessionState::Expired);
        assert!(view.questions.is_empty());
        assert_eq!(view.result.as_ref().map(|r| r.score), Some(0));
        let tables = store.tables.lock().await;
        assert_eq!(tables.scores, vec![(USER, COURSE, 0)]);
        assert!(tables.bookings.is_empty());
    }

    #[tokio::test]
    async fn full_attempt_scores_and_releases_the_booking() {
        let start = Utc::now() - Duration::minutes(5);
        let (manager, store) = manager_with(vec![booking(1, COURSE, start)], bank(20)).await;

        let view = manager.open(USER, COURSE).await.unwrap();
        assert_eq!(view.state, SessionState::Instructions);
        assert_eq!(view.instructions.as_ref().map(Vec::len), Some(6));

        let view = manager.start(USER, COURSE, &[true; 6]).await.unwrap();
        assert_eq!(view.state, SessionState::Active);
        assert_eq!(view.questions.len(), 20);
        assert!(view.remaining_seconds > 3000);

        for id in 1..=15 {
            manager.answer(USER, COURSE, id, "1").await.unwrap();
        }
        for id in 16..=18 {
            manager.answer(USER, COURSE, id, "2").await.unwrap();
        }

        let view = manager.finish(USER, COURSE).await.unwrap();
        assert_eq!(view.state, SessionState::Finalized);
        let result = view.result.unwrap();
        assert_eq!(result.score, 15);
        assert_eq!(result.trigger, FinishTrigger::Manual);
        assert!(result.review_eligible);

        let tables = store.tables.lock().await;
        assert_eq!(tables.scores, vec![(USER, COURSE, 15)]);
        assert!(tables.bookings.is_empty());
    }

    #[tokio::test]
    async fn restarting_keeps_the_same_sample() {
        let start = Utc::now() - Duration::minutes(5);
        let (manager, store) = manager_with(vec![booking(1, COURSE, start)], bank(5)).await;

        manager.open(USER, COURSE).await.unwrap();
        let first = manager.start(USER, COURSE, &[true; 6]).await.unwrap();
        store.tables.lock().await.mcqs.reverse();
        let second = manager.start(USER, COURSE, &[true; 6]).await.unwrap();

        let ids = |v: &SessionView| v.questions.iter().map(|q| q.id).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[tokio::test]
    async fn missing_acknowledgement_keeps_the_gate_closed() {
        let start = Utc::now() - Duration::minutes(5);
        let (manager, _) = manager_with(vec![booking(1, COURSE, start)], bank(5)).await;
        manager.open(USER, COURSE).await.unwrap();

        let err = manager
            .start(USER, COURSE, &[true, true, true, true, true, false])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        let view = manager.open(USER, COURSE).await.unwrap();
        assert_eq!(view.state, SessionState::Instructions);
    }

    #[tokio::test]
    async fn second_finish_returns_the_same_result_without_a_second_score() {
        let start = Utc::now() - Duration::minutes(5);
        let (manager, store) = manager_with(vec![booking(1, COURSE, start)], bank(3)).await;
        manager.open(USER, COURSE).await.unwrap();
        manager.start(USER, COURSE, &[true; 6]).await.unwrap();
        manager.answer(USER, COURSE, 1, "1").await.unwrap();

        let first = manager.finish(USER, COURSE).await.unwrap();
        let second = manager.finish(USER, COURSE).await.unwrap();

        assert_eq!(first.result, second.result);
        assert_eq!(store.tables.lock().await.scores.len(), 1);
    }

    #[tokio::test]
    async fn failed_persistence_leaves_the_session_retryable() {
        let start = Utc::now() - Duration::minutes(5);
        let (manager, store) = manager_with(vec![booking(1, COURSE, start)], bank(3)).await;
        manager.open(USER, COURSE).await.unwrap();
        manager.start(USER, COURSE, &[true; 6]).await.unwrap();
        manager.answer(USER, COURSE, 2, "1").await.unwrap();

        store.fail_writes.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(manager.finish(USER, COURSE).await.is_err());
        assert_eq!(store.tables.lock().await.bookings.len(), 1);

        let view = manager.open(USER, COURSE).await.unwrap();
        assert_eq!(view.state, SessionState::Active);
        assert_eq!(view.answers.get(&2).map(String::as_str), Some("1"));

        store.fail_writes.store(false, std::sync::atomic::Ordering::SeqCst);
        let view = manager.finish(USER, COURSE).await.unwrap();
        assert_eq!(view.result.map(|r| r.score), Some(1));
    }

    #[tokio::test]
    async fn sweep_scores_zero_for_closed_slots_only() {
        let now = Utc::now();
        let (manager, store) = manager_with(
            vec![
                booking(1, COURSE, now - Duration::minutes(90)),
                booking(2, COURSE + 1, now - Duration::minutes(10)),
                booking(3, COURSE + 2, now + Duration::days(1)),
            ],
            bank(3),
        )
        .await;

        let swept = manager.reconcile(USER).await.unwrap();

        assert_eq!(swept, 1);
        let tables = store.tables.lock().await;
        assert_eq!(tables.scores, vec![(USER, COURSE, 0)]);
        assert_eq!(
            tables.bookings.iter().map(|b| b.id).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }

    #[tokio::test]
    async fn sweep_is_idempotent() {
        let now = Utc::now();
        let (manager, store) =
            manager_with(vec![booking(1, COURSE, now - Duration::hours(3))], bank(3)).await;

        assert_eq!(manager.reconcile(USER).await.unwrap(), 1);
        assert_eq!(manager.reconcile(USER).await.unwrap(), 0);
        assert_eq!(store.tables.lock().await.scores.len(), 1);
    }

    /// Moves a cached session and its booking so the slot ended `ago` earlier.
    async fn shift_slot(manager: &SessionManager, store: &MemoryStore, ago: Duration) {
        let start = Utc::now() - ago;
        for booking in store.tables.lock().await.bookings.iter_mut() {
            booking.slot_time = Some(start);
        }
        for entry in manager.inner.live.lock().await.values_mut() {
            entry.session.window = SlotWindow::new(start, settings().slot_duration_secs);
        }
    }

    #[tokio::test]
    async fn sweep_removes_an_opened_but_unstarted_slot() {
        let start = Utc::now() - Duration::minutes(5);
        let (manager, store) = manager_with(vec![booking(1, COURSE, start)], bank(3)).await;
        let view = manager.open(USER, COURSE).await.unwrap();
        assert_eq!(view.state, SessionState::Instructions);

        shift_slot(&manager, &store, Duration::minutes(90)).await;
        let swept = manager.reconcile(USER).await.unwrap();

        assert_eq!(swept, 1);
        let tables = store.tables.lock().await;
        assert_eq!(tables.scores, vec![(USER, COURSE, 0)]);
        assert!(tables.bookings.is_empty());
        drop(tables);
        assert!(manager.inner.live.lock().await.is_empty());
    }

    #[tokio::test]
    async fn finishing_without_a_booking_is_a_conflict_not_a_score() {
        let start = Utc::now() - Duration::minutes(5);
        let (manager, store) = manager_with(vec![booking(1, COURSE, start)], bank(3)).await;
        manager.open(USER, COURSE).await.unwrap();
        manager.start(USER, COURSE, &[true; 6]).await.unwrap();
        manager.answer(USER, COURSE, 1, "1").await.unwrap();

        store.tables.lock().await.bookings.clear();
        let err = manager.finish(USER, COURSE).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert!(store.tables.lock().await.scores.is_empty());
        assert!(matches!(
            manager.finish(USER, COURSE).await,
            Err(AppError::NotFound(_))
        ));
        let item = ReviewItem {
            question_id: 1,
            comment: "Unclear".to_string(),
        };
        assert!(matches!(
            manager.submit_reviews(USER, COURSE, &[item]).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleting_the_booking_discards_its_session() {
        let start = Utc::now() - Duration::minutes(5);
        let (manager, store) = manager_with(
            vec![booking(1, COURSE, start), booking(2, COURSE + 1, start)],
            bank(3),
        )
        .await;
        manager.open(USER, COURSE).await.unwrap();
        manager.open(USER, COURSE + 1).await.unwrap();

        store.tables.lock().await.bookings.retain(|b| b.id != 1);
        manager.discard_booking(USER, 1).await;

        let view = manager.open(USER, COURSE).await.unwrap();
        assert_eq!(view.state, SessionState::NotBooked);
        let view = manager.open(USER, COURSE + 1).await.unwrap();
        assert_eq!(view.state, SessionState::Instructions);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_attempts_expire_after_the_review_window() {
        let start = Utc::now() - Duration::minutes(5);
        let (manager, _) = manager_with(vec![booking(1, COURSE, start)], bank(3)).await;
        manager.open(USER, COURSE).await.unwrap();
        manager.start(USER, COURSE, &[true; 6]).await.unwrap();
        manager.finish(USER, COURSE).await.unwrap();
        assert!(manager.finish(USER, COURSE).await.is_ok());

        tokio::time::advance(std::time::Duration::from_secs(3601)).await;
        manager.reconcile(USER).await.unwrap();

        assert!(manager.inner.finished.lock().await.is_empty());
        let item = ReviewItem {
            question_id: 1,
            comment: "Late".to_string(),
        };
        assert!(matches!(
            manager.submit_reviews(USER, COURSE, &[item]).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn reviews_are_limited_and_need_comments() {
        let start = Utc::now() - Duration::minutes(5);
        let (manager, store) = manager_with(vec![booking(1, COURSE, start)], bank(5)).await;
        manager.open(USER, COURSE).await.unwrap();
        manager.start(USER, COURSE, &[true; 6]).await.unwrap();
        manager.finish(USER, COURSE).await.unwrap();

        let item = |id: i64, comment: &str| ReviewItem {
            question_id: id,
            comment: comment.to_string(),
        };

        let too_many = [item(1, "x"), item(2, "y"), item(3, "z")];
        assert!(matches!(
            manager.submit_reviews(USER, COURSE, &too_many).await,
            Err(AppError::BadRequest(_))
        ));

        let blank = [item(1, "   ")];
        assert!(matches!(
            manager.submit_reviews(USER, COURSE, &blank).await,
            Err(AppError::BadRequest(_))
        ));

        let foreign = [item(99, "wrong key")];
        assert!(matches!(
            manager.submit_reviews(USER, COURSE, &foreign).await,
            Err(AppError::BadRequest(_))
        ));

        let ok = [item(1, "Option 2 is also correct"), item(4, "<b>Typo</b> in option 3")];
        assert_eq!(manager.submit_reviews(USER, COURSE, &ok).await.unwrap(), 2);

        let tables = store.tables.lock().await;
        assert_eq!(tables.reviews.len(), 2);
        assert_eq!(tables.reviews[0].question_id, 1);
        drop(tables);

        // One submission per attempt.
        assert!(matches!(
            manager.submit_reviews(USER, COURSE, &ok).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn review_threshold_is_configurable() {
        let start = Utc::now() - Duration::minutes(5);
        let store = Arc::new(MemoryStore::default());
        {
            let mut tables = store.tables.lock().await;
            tables.bookings = vec![booking(1, COURSE, start)];
            tables.mcqs = bank(4);
        }
        let mut strict = settings();
        strict.review.min_score_ratio = 0.5;
        let manager = SessionManager::new(store.clone(), strict);

        manager.open(USER, COURSE).await.unwrap();
        manager.start(USER, COURSE, &[true; 6]).await.unwrap();
        manager.answer(USER, COURSE, 1, "1").await.unwrap();
        let view = manager.finish(USER, COURSE).await.unwrap();

        assert_eq!(view.result.as_ref().map(|r| r.review_eligible), Some(false));
        let item = ReviewItem {
            question_id: 2,
            comment: "Ambiguous".to_string(),
        };
        assert!(matches!(
            manager.submit_reviews(USER, COURSE, &[item]).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expiry_submits_the_attempt() {
        let mut short = settings();
        short.slot_duration_secs = 3;
        let store = Arc::new(MemoryStore::default());
        {
            let mut tables = store.tables.lock().await;
            tables.bookings = vec![booking(1, COURSE, Utc::now())];
            tables.mcqs = bank(2);
        }
        let manager = SessionManager::new(store.clone(), short);

        manager.open(USER, COURSE).await.unwrap();
        manager.start(USER, COURSE, &[true; 6]).await.unwrap();
        manager.answer(USER, COURSE, 1, "1").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(10)).await;

        let tables = store.tables.lock().await;
        assert_eq!(tables.scores, vec![(USER, COURSE, 1)]);
        assert!(tables.bookings.is_empty());
        drop(tables);

        let view = manager.finish(USER, COURSE).await.unwrap();
        assert_eq!(view.result.map(|r| r.trigger), Some(FinishTrigger::Timeout));
    }
}
