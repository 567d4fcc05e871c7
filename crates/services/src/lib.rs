#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog_service;
pub mod config;
pub mod error;
pub mod identity;
pub mod progress_service;
pub mod sessions;

pub use quiz_core::Clock;

pub use app_services::AppServices;
pub use catalog_service::{CatalogService, ExamDraft, QuestionDraft};
pub use config::{FeedbackMode, SessionConfig};
pub use error::{
    AppServicesError, CatalogServiceError, IdentityError, ProgressServiceError, SessionError,
};
pub use identity::{AuthUser, Identity, IdentityEvent, IdentityService, IdentitySubscription};
pub use progress_service::{AttemptDetail, LeaderboardRow, ProgressService};

pub use sessions::{
    Direction, RunnerExit, SelectOutcome, SessionHandle, SessionRunner, SessionState, SessionView,
    SubmitOutcome, TestSession, TestSessionService,
};
