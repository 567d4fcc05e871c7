mod runner;
mod session;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use runner::{RunnerExit, SessionHandle, SessionRunner};
pub use session::{Direction, SelectOutcome, SessionState, TestSession, TickOutcome};
pub use view::{AnswerFeedback, QuestionView, SessionView};
pub use workflow::{SubmitOutcome, TestSessionService};
