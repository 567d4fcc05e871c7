use std::time::Duration;

/// When answer correctness is revealed to the test taker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackMode {
    /// Only after submission, in review.
    #[default]
    Deferred,
    /// Right after each selection.
    Immediate,
}

/// Knobs for a test session and its runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Countdown granularity; each tick removes one second.
    pub tick: Duration,
    pub autosave_every: Duration,
    pub feedback: FeedbackMode,
    /// Enter review mode after a successful submission instead of finishing.
    pub review_after_submit: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            autosave_every: Duration::from_secs(10),
            feedback: FeedbackMode::Deferred,
            review_after_submit: true,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    #[must_use]
    pub fn with_autosave_every(mut self, every: Duration) -> Self {
        self.autosave_every = every;
        self
    }

    #[must_use]
    pub fn with_feedback(mut self, feedback: FeedbackMode) -> Self {
        self.feedback = feedback;
        self
    }

    #[must_use]
    pub fn with_review_after_submit(mut self, review: bool) -> Self {
        self.review_after_submit = review;
        self
    }
}
