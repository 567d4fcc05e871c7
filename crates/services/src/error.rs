//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{
    AttemptError, ExamError, ParseIdError, ProfileError, QuestionError, QuestionId, SubjectError,
    TestId,
};
use storage::progress_store::ProgressStoreError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the test session controller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// The requested test does not exist. Callers report it and move on.
    #[error("test not found: {0}")]
    NotFound(TestId),
    #[error("question {0} is not part of this test")]
    UnknownQuestion(QuestionId),
    #[error("option {index} is out of range for question {question} ({len} options)")]
    OptionOutOfRange {
        question: QuestionId,
        index: usize,
        len: usize,
    },
    #[error("session already submitted")]
    AlreadySubmitted,
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    /// The backend rejected the finalized attempt; the session is unchanged.
    #[error("submission failed: {0}")]
    Submission(#[source] StorageError),
    #[error("session runner has stopped")]
    RunnerStopped,
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Progress(#[from] ProgressStoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogServiceError {
    #[error("test not found: {0}")]
    NotFound(TestId),
    #[error("question {question} not found in test {test}")]
    QuestionNotFound { test: TestId, question: QuestionId },
    #[error("subject already exists")]
    DuplicateSubject,
    #[error("unknown subject: {0}")]
    UnknownSubject(String),
    #[error(transparent)]
    Id(#[from] ParseIdError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Subject(#[from] SubjectError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Progress(#[from] ProgressStoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `IdentityService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IdentityError {
    #[error("identity state is unavailable")]
    Poisoned,
    #[error("nobody is signed in")]
    NotSignedIn,
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Progress(#[from] ProgressStoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
