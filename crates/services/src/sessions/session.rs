use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use quiz_core::model::{AnswerMap, AttemptError, AttemptSnapshot, Exam, Question, QuestionId, UserId};
use quiz_core::scoring::{self, ScoreReport, is_answer_correct};
use storage::repository::AttemptId;

use crate::config::{FeedbackMode, SessionConfig};
use crate::error::SessionError;

//
// ─── STATES & OUTCOMES ─────────────────────────────────────────────────────────
//

/// Lifecycle of a test session.
///
/// `Loading` has no variant: it is the pending `TestSessionService::start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Active,
    /// Countdown hit zero; answers are locked and an auto-submit is due.
    Expired,
    Submitting,
    Reviewing,
    Submitted,
}

impl SessionState {
    /// Whether answers may still change.
    #[must_use]
    pub fn accepts_answers(self) -> bool {
        matches!(self, SessionState::Active)
    }

    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, SessionState::Reviewing | SessionState::Submitted)
    }
}

/// Result of `TestSession::select_answer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The answer was stored. `correct` is set in immediate-feedback mode.
    Recorded { correct: Option<bool> },
    /// The session no longer accepts answers; nothing changed.
    Locked,
}

/// Result of a single countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ticked { remaining_secs: u32 },
    /// The countdown reached zero. Reported once per session.
    Expired,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// Outcome of the pre-submission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubmitCheck {
    NeedsConfirmation { unanswered: usize },
    Ready(ScoreReport),
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Live state of one user's attempt at one exam.
///
/// Pure state machine: no I/O and no clock. `TestSessionService` persists it
/// and `SessionRunner` drives its timer.
#[derive(Clone)]
pub struct TestSession {
    exam: Exam,
    user_id: UserId,
    feedback: FeedbackMode,
    review_after_submit: bool,
    current: usize,
    answers: AnswerMap,
    remaining_secs: u32,
    started_at: DateTime<Utc>,
    state: SessionState,
    resume_state: Option<SessionState>,
    expiry_reported: bool,
    report: Option<ScoreReport>,
    attempt_id: Option<AttemptId>,
}

impl TestSession {
    /// Fresh session with the full time limit on the clock.
    #[must_use]
    pub fn new(exam: Exam, user_id: UserId, started_at: DateTime<Utc>, config: &SessionConfig) -> Self {
        let remaining_secs = exam.time_limit_secs();
        Self {
            exam,
            user_id,
            feedback: config.feedback,
            review_after_submit: config.review_after_submit,
            current: 0,
            answers: AnswerMap::new(),
            remaining_secs,
            started_at,
            state: SessionState::Active,
            resume_state: None,
            expiry_reported: false,
            report: None,
            attempt_id: None,
        }
    }

    /// Restores a session from an auto-saved snapshot.
    ///
    /// A snapshot with no time left resumes as `Expired`; the next tick
    /// reports the expiry so the runner auto-submits.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the snapshot does not fit `exam`.
    pub fn resume(
        exam: Exam,
        user_id: UserId,
        snapshot: &AttemptSnapshot,
        config: &SessionConfig,
    ) -> Result<Self, AttemptError> {
        snapshot.validate_against(&exam, user_id)?;
        let mut session = Self::new(exam, user_id, snapshot.started_at, config);
        session.current = snapshot.question_index;
        session.answers = snapshot.answers.clone();
        session.remaining_secs = snapshot.remaining_secs;
        if session.remaining_secs == 0 {
            session.state = SessionState::Expired;
        }
        Ok(session)
    }

    #[must_use]
    pub fn exam(&self) -> &Exam {
        &self.exam
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn feedback_mode(&self) -> FeedbackMode {
        self.feedback
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.exam.question_at(self.current)
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    #[must_use]
    pub fn selected(&self, question_id: &QuestionId) -> Option<usize> {
        self.answers.get(question_id).copied()
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn report(&self) -> Option<&ScoreReport> {
        self.report.as_ref()
    }

    #[must_use]
    pub fn attempt_id(&self) -> Option<AttemptId> {
        self.attempt_id
    }

    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.exam
            .questions()
            .iter()
            .filter(|q| !self.answers.contains_key(q.id()))
            .count()
    }

    /// Share of questions answered, 0..=100, rounded half up.
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        let total = u32::try_from(self.exam.total_questions()).unwrap_or(u32::MAX);
        let answered = u32::try_from(self.answers.len()).unwrap_or(u32::MAX);
        scoring::percent(answered, total)
    }

    /// Records (or overwrites) the answer for `question_id`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownQuestion` or
    /// `SessionError::OptionOutOfRange` for answers that do not fit the exam.
    pub fn select_answer(
        &mut self,
        question_id: &QuestionId,
        option: usize,
    ) -> Result<SelectOutcome, SessionError> {
        if !self.state.accepts_answers() {
            return Ok(SelectOutcome::Locked);
        }
        let question = self
            .exam
            .question(question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.clone()))?;
        if !question.accepts(option) {
            return Err(SessionError::OptionOutOfRange {
                question: question_id.clone(),
                index: option,
                len: question.option_count(),
            });
        }

        let correct = match self.feedback {
            FeedbackMode::Immediate => Some(is_answer_correct(question, Some(option))),
            FeedbackMode::Deferred => None,
        };
        self.answers.insert(question_id.clone(), option);
        Ok(SelectOutcome::Recorded { correct })
    }

    /// Answers the question under the pointer.
    ///
    /// # Errors
    ///
    /// Same as `select_answer`.
    pub fn select_current(&mut self, option: usize) -> Result<SelectOutcome, SessionError> {
        let Some(id) = self.current_question().map(|q| q.id().clone()) else {
            return Ok(SelectOutcome::Locked);
        };
        self.select_answer(&id, option)
    }

    /// Moves the pointer one step, clamped to the question range.
    pub fn advance(&mut self, direction: Direction) -> usize {
        let target = match direction {
            Direction::Previous => self.current.saturating_sub(1),
            Direction::Next => self.current.saturating_add(1),
        };
        self.jump_to(target)
    }

    /// Moves the pointer to `index`, clamped to the question range.
    pub fn jump_to(&mut self, index: usize) -> usize {
        let last = self.exam.total_questions().saturating_sub(1);
        self.current = index.min(last);
        self.current
    }

    /// Removes one second from the countdown.
    pub fn tick(&mut self) -> TickOutcome {
        match self.state {
            SessionState::Active => {
                self.remaining_secs = self.remaining_secs.saturating_sub(1);
                if self.remaining_secs == 0 {
                    self.state = SessionState::Expired;
                    self.expiry_reported = true;
                    TickOutcome::Expired
                } else {
                    TickOutcome::Ticked {
                        remaining_secs: self.remaining_secs,
                    }
                }
            }
            SessionState::Expired if !self.expiry_reported => {
                self.expiry_reported = true;
                TickOutcome::Expired
            }
            _ => TickOutcome::Idle,
        }
    }

    /// Whether the countdown still needs ticks.
    #[must_use]
    pub fn timer_running(&self) -> bool {
        match self.state {
            SessionState::Active => true,
            SessionState::Expired => !self.expiry_reported,
            _ => false,
        }
    }

    /// State worth auto-saving, or `None` once submission has started.
    #[must_use]
    pub fn snapshot(&self, saved_at: DateTime<Utc>) -> Option<AttemptSnapshot> {
        match self.state {
            SessionState::Active | SessionState::Expired => Some(AttemptSnapshot {
                user_id: self.user_id,
                test_id: self.exam.id().clone(),
                question_index: self.current,
                answers: self.answers.clone(),
                remaining_secs: self.remaining_secs,
                started_at: self.started_at,
                saved_at,
            }),
            _ => None,
        }
    }

    /// Grades the session and enters `Submitting`, unless confirmation is needed.
    pub(crate) fn begin_submit(&mut self, confirmed: bool) -> Result<SubmitCheck, SessionError> {
        match self.state {
            SessionState::Submitting => return Err(SessionError::SubmissionInFlight),
            SessionState::Reviewing | SessionState::Submitted => {
                return Err(SessionError::AlreadySubmitted);
            }
            SessionState::Active | SessionState::Expired => {}
        }

        let unanswered = self.unanswered_count();
        if self.state == SessionState::Active && unanswered > 0 && !confirmed {
            return Ok(SubmitCheck::NeedsConfirmation { unanswered });
        }

        let report = scoring::score(self.exam.questions(), &self.answers);
        self.resume_state = Some(self.state);
        self.state = SessionState::Submitting;
        Ok(SubmitCheck::Ready(report))
    }

    pub(crate) fn complete_submit(&mut self, report: ScoreReport, attempt_id: AttemptId) {
        self.report = Some(report);
        self.attempt_id = Some(attempt_id);
        self.resume_state = None;
        self.state = if self.review_after_submit {
            SessionState::Reviewing
        } else {
            SessionState::Submitted
        };
    }

    /// Returns to the state held before `begin_submit`.
    pub(crate) fn abort_submit(&mut self) {
        if let Some(previous) = self.resume_state.take() {
            self.state = previous;
        }
    }
}

impl fmt::Debug for TestSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSession")
            .field("test_id", self.exam.id())
            .field("user_id", &self.user_id)
            .field("state", &self.state)
            .field("current", &self.current)
            .field("answers_len", &self.answers.len())
            .field("remaining_secs", &self.remaining_secs)
            .field("attempt_id", &self.attempt_id)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
