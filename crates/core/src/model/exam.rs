use std::collections::HashSet;

use thiserror::Error;

use crate::model::ids::{QuestionId, TestId};
use crate::model::question::Question;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("exam title cannot be empty")]
    EmptyTitle,

    #[error("exam subject cannot be empty")]
    EmptySubject,

    #[error("exam must contain at least one question")]
    NoQuestions,

    #[error("duplicate question id: {0}")]
    DuplicateQuestion(QuestionId),

    #[error("time limit must be between 1 and {max} minutes, got {got}")]
    InvalidTimeLimit { got: u32, max: u32 },
}

//
// ─── EXAM ──────────────────────────────────────────────────────────────────────
//

/// Upper bound for an exam's time limit (one day).
pub const MAX_TIME_LIMIT_MINUTES: u32 = 24 * 60;

/// A timed multiple-choice test.
///
/// Questions keep the order they were authored in; the session walks them by
/// index. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exam {
    id: TestId,
    title: String,
    subject: String,
    description: Option<String>,
    questions: Vec<Question>,
    time_limit_minutes: u32,
}

impl Exam {
    /// Creates a validated exam.
    ///
    /// # Errors
    ///
    /// Returns `ExamError` if the title or subject is blank, there are no
    /// questions, two questions share an id, or the time limit is out of range.
    pub fn new(
        id: TestId,
        title: impl Into<String>,
        subject: impl Into<String>,
        description: Option<String>,
        questions: Vec<Question>,
        time_limit_minutes: u32,
    ) -> Result<Self, ExamError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ExamError::EmptyTitle);
        }
        let subject = subject.into();
        if subject.trim().is_empty() {
            return Err(ExamError::EmptySubject);
        }
        if questions.is_empty() {
            return Err(ExamError::NoQuestions);
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for q in &questions {
            if !seen.insert(q.id()) {
                return Err(ExamError::DuplicateQuestion(q.id().clone()));
            }
        }
        if time_limit_minutes == 0 || time_limit_minutes > MAX_TIME_LIMIT_MINUTES {
            return Err(ExamError::InvalidTimeLimit {
                got: time_limit_minutes,
                max: MAX_TIME_LIMIT_MINUTES,
            });
        }

        Ok(Self {
            id,
            title,
            subject,
            description: description.filter(|d| !d.trim().is_empty()),
            questions,
            time_limit_minutes,
        })
    }

    #[must_use]
    pub fn id(&self) -> &TestId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> u32 {
        self.time_limit_minutes
    }

    /// Full countdown length in seconds.
    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit_minutes * 60
    }

    #[must_use]
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    #[must_use]
    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn position_of(&self, id: &QuestionId) -> Option<usize> {
        self.questions.iter().position(|q| q.id() == id)
    }

    /// Returns a copy of this exam with `question` appended.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::DuplicateQuestion` if the id is already used.
    pub fn with_question(&self, question: Question) -> Result<Self, ExamError> {
        let mut questions = self.questions.clone();
        questions.push(question);
        self.rebuilt(questions)
    }

    /// Returns a copy of this exam without the given question.
    ///
    /// Returns `Ok(None)` when the question is not part of the exam.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::NoQuestions` if removing it would leave the exam empty.
    pub fn without_question(&self, id: &QuestionId) -> Result<Option<Self>, ExamError> {
        let Some(pos) = self.position_of(id) else {
            return Ok(None);
        };
        let mut questions = self.questions.clone();
        questions.remove(pos);
        self.rebuilt(questions).map(Some)
    }

    fn rebuilt(&self, questions: Vec<Question>) -> Result<Self, ExamError> {
        Self::new(
            self.id.clone(),
            self.title.clone(),
            self.subject.clone(),
            self.description.clone(),
            questions,
            self.time_limit_minutes,
        )
    }
}
