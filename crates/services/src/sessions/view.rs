use serde::Serialize;

use quiz_core::model::{AnswerMap, QuestionId, TestId};
use quiz_core::scoring::{ScoreReport, is_answer_correct};
use storage::repository::AttemptId;

use super::session::{SessionState, TestSession};
use crate::config::FeedbackMode;

/// Correctness shown for a question, either live or in review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerFeedback {
    pub is_correct: bool,
    pub correct_index: usize,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    pub selected: Option<usize>,
    pub feedback: Option<AnswerFeedback>,
}

/// Presentation-agnostic snapshot of a running session.
///
/// No pre-formatted strings beyond `notice`; the front end formats the timer
/// and percentages itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub test_id: TestId,
    pub title: String,
    pub state: SessionState,
    pub question_index: usize,
    pub total_questions: usize,
    pub question: Option<QuestionView>,
    pub answers: AnswerMap,
    pub remaining_secs: u32,
    pub progress_percent: u8,
    pub unanswered: usize,
    /// Non-blocking message, e.g. a failed submission.
    pub notice: Option<String>,
    pub report: Option<ScoreReport>,
    pub attempt_id: Option<AttemptId>,
}

impl SessionView {
    #[must_use]
    pub fn from_session(session: &TestSession, notice: Option<String>) -> Self {
        let exam = session.exam();
        let question = session.current_question().map(|q| {
            let selected = session.selected(q.id());
            let reveal = match session.state() {
                SessionState::Reviewing | SessionState::Submitted => true,
                _ => session.feedback_mode() == FeedbackMode::Immediate && selected.is_some(),
            };
            QuestionView {
                id: q.id().clone(),
                prompt: q.prompt().to_owned(),
                options: q.options().to_vec(),
                selected,
                feedback: reveal.then(|| AnswerFeedback {
                    is_correct: is_answer_correct(q, selected),
                    correct_index: q.correct_index(),
                    explanation: q.explanation().map(str::to_owned),
                }),
            }
        });

        Self {
            test_id: exam.id().clone(),
            title: exam.title().to_owned(),
            state: session.state(),
            question_index: session.current_index(),
            total_questions: exam.total_questions(),
            question,
            answers: session.answers().clone(),
            remaining_secs: session.remaining_secs(),
            progress_percent: session.progress_percent(),
            unanswered: session.unanswered_count(),
            notice,
            report: session.report().cloned(),
            attempt_id: session.attempt_id(),
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }
}
