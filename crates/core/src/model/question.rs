use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("a question needs at least {min} options, got {len}")]
    TooFewOptions { min: usize, len: usize },

    #[error("option {index} is empty")]
    EmptyOption { index: usize },

    #[error("correct option {index} is out of range for {len} options")]
    CorrectIndexOutOfRange { index: usize, len: usize },
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Fewest options a multiple-choice question may have.
pub const MIN_OPTIONS: usize = 2;

/// A single multiple-choice question.
///
/// Options are ordered; answers refer to them by index. Once built a question
/// is never mutated, so a session can hold it for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<String>,
    correct_index: usize,
    explanation: Option<String>,
}

impl Question {
    /// Creates a validated question.
    ///
    /// Blank explanations are normalized to `None`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank, there are fewer than
    /// two options, any option is blank, or the correct index is out of range.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
        explanation: Option<String>,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if options.len() < MIN_OPTIONS {
            return Err(QuestionError::TooFewOptions {
                min: MIN_OPTIONS,
                len: options.len(),
            });
        }
        if let Some(index) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuestionError::EmptyOption { index });
        }
        if correct_index >= options.len() {
            return Err(QuestionError::CorrectIndexOutOfRange {
                index: correct_index,
                len: options.len(),
            });
        }

        let explanation = explanation.filter(|e| !e.trim().is_empty());

        Ok(Self {
            id,
            prompt,
            options,
            correct_index,
            explanation,
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option(&self, index: usize) -> Option<&str> {
        self.options.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn correct_option(&self) -> &str {
        // Index validated in `new`.
        &self.options[self.correct_index]
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Returns true if `index` names one of this question's options.
    #[must_use]
    pub fn accepts(&self, index: usize) -> bool {
        index < self.options.len()
    }
}
