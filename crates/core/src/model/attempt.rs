use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::exam::Exam;
use crate::model::ids::{QuestionId, TestId, UserId};
use crate::scoring::ScoreReport;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("snapshot belongs to test {found}, expected {expected}")]
    TestMismatch { expected: TestId, found: TestId },

    #[error("snapshot belongs to another user")]
    OwnerMismatch,

    #[error("question index {index} is out of range for {total} questions")]
    QuestionIndexOutOfRange { index: usize, total: usize },

    #[error("answer refers to unknown question {0}")]
    UnknownQuestion(QuestionId),

    #[error("option {index} is out of range for question {question} ({len} options)")]
    OptionOutOfRange {
        question: QuestionId,
        index: usize,
        len: usize,
    },

    #[error("remaining time {remaining}s exceeds the {limit}s limit")]
    RemainingExceedsLimit { remaining: u32, limit: u32 },

    #[error("score {0} is outside 0..=100")]
    ScoreOutOfRange(u8),

    #[error("correct count ({correct}) exceeds total questions ({total})")]
    CorrectExceedsTotal { correct: u32, total: u32 },

    #[error("completed_at is before started_at")]
    InvalidTimeRange,
}

//
// ─── ANSWERS ───────────────────────────────────────────────────────────────────
//

/// Selected option index per question. Ordered so serialized snapshots are stable.
pub type AnswerMap = BTreeMap<QuestionId, usize>;

/// Checks that every answer names a question of `exam` and one of its options.
///
/// # Errors
///
/// Returns the first offending answer as `AttemptError`.
pub fn validate_answers(exam: &Exam, answers: &AnswerMap) -> Result<(), AttemptError> {
    for (question_id, &index) in answers {
        let question = exam
            .question(question_id)
            .ok_or_else(|| AttemptError::UnknownQuestion(question_id.clone()))?;
        if !question.accepts(index) {
            return Err(AttemptError::OptionOutOfRange {
                question: question_id.clone(),
                index,
                len: question.option_count(),
            });
        }
    }
    Ok(())
}

//
// ─── IN-PROGRESS SNAPSHOT ──────────────────────────────────────────────────────
//

/// Serializable state of an in-flight attempt, written by auto-save and read
/// back on resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptSnapshot {
    pub user_id: UserId,
    pub test_id: TestId,
    pub question_index: usize,
    pub answers: AnswerMap,
    pub remaining_secs: u32,
    pub started_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}

impl AttemptSnapshot {
    /// Verifies the snapshot is `user_id`'s and still fits `exam`.
    ///
    /// A snapshot can go stale when an exam is edited between save and resume;
    /// callers treat a failure here like a corrupt snapshot.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` describing the first mismatch found.
    pub fn validate_against(&self, exam: &Exam, user_id: UserId) -> Result<(), AttemptError> {
        if self.user_id != user_id {
            return Err(AttemptError::OwnerMismatch);
        }
        if &self.test_id != exam.id() {
            return Err(AttemptError::TestMismatch {
                expected: exam.id().clone(),
                found: self.test_id.clone(),
            });
        }
        if self.question_index >= exam.total_questions() {
            return Err(AttemptError::QuestionIndexOutOfRange {
                index: self.question_index,
                total: exam.total_questions(),
            });
        }
        if self.remaining_secs > exam.time_limit_secs() {
            return Err(AttemptError::RemainingExceedsLimit {
                remaining: self.remaining_secs,
                limit: exam.time_limit_secs(),
            });
        }
        validate_answers(exam, &self.answers)
    }
}

//
// ─── FINALIZED ATTEMPT ─────────────────────────────────────────────────────────
//

/// A scored, immutable attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizedAttempt {
    test_id: TestId,
    subject: String,
    user_id: UserId,
    score: u8,
    correct_count: u32,
    total_questions: u32,
    answers: AnswerMap,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}

impl FinalizedAttempt {
    /// Builds the finalized record for a graded session.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTimeRange` if `completed_at` precedes
    /// `started_at`, or an answer error if `answers` do not fit `exam`.
    pub fn from_report(
        exam: &Exam,
        user_id: UserId,
        answers: AnswerMap,
        report: &ScoreReport,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        validate_answers(exam, &answers)?;
        Self::from_persisted(
            exam.id().clone(),
            exam.subject().to_owned(),
            user_id,
            report.score(),
            report.correct(),
            report.total(),
            answers,
            started_at,
            completed_at,
        )
    }

    /// Rehydrate an attempt from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the score, counts, or time range are inconsistent.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        test_id: TestId,
        subject: String,
        user_id: UserId,
        score: u8,
        correct_count: u32,
        total_questions: u32,
        answers: AnswerMap,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if score > 100 {
            return Err(AttemptError::ScoreOutOfRange(score));
        }
        if correct_count > total_questions {
            return Err(AttemptError::CorrectExceedsTotal {
                correct: correct_count,
                total: total_questions,
            });
        }
        if completed_at < started_at {
            return Err(AttemptError::InvalidTimeRange);
        }

        Ok(Self {
            test_id,
            subject,
            user_id,
            score,
            correct_count,
            total_questions,
            answers,
            started_at,
            completed_at,
        })
    }

    #[must_use]
    pub fn test_id(&self) -> &TestId {
        &self.test_id
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Wall-clock seconds between start and completion.
    #[must_use]
    pub fn time_taken_secs(&self) -> u32 {
        let secs = (self.completed_at - self.started_at).num_seconds().max(0);
        u32::try_from(secs).unwrap_or(u32::MAX)
    }
}

//
// ─── ANSWER DETAIL ─────────────────────────────────────────────────────────────
//

/// Per-question detail stored next to a finalized attempt.
///
/// Texts are copied so the record stays readable after the exam is edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRecord {
    pub question_index: u32,
    pub question_id: QuestionId,
    pub question_text: String,
    pub selected_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub subject: String,
}

impl AnswerRecord {
    /// Expands a score report into one record per exam question.
    #[must_use]
    pub fn from_report(exam: &Exam, report: &ScoreReport) -> Vec<Self> {
        exam.questions()
            .iter()
            .zip(report.per_question())
            .enumerate()
            .map(|(index, (question, result))| Self {
                question_index: u32::try_from(index).unwrap_or(u32::MAX),
                question_id: question.id().clone(),
                question_text: question.prompt().to_owned(),
                selected_answer: result
                    .selected
                    .and_then(|i| question.option(i))
                    .map(str::to_owned),
                correct_answer: question.correct_option().to_owned(),
                is_correct: result.is_correct,
                subject: exam.subject().to_owned(),
            })
            .collect()
    }
}
