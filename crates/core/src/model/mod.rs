mod attempt;
mod exam;
mod ids;
mod profile;
mod question;
mod subject;

pub use ids::{MAX_SLUG_LEN, ParseIdError, QuestionId, SubjectId, TestId, UserId};

pub use attempt::{
    AnswerMap, AnswerRecord, AttemptError, AttemptSnapshot, FinalizedAttempt, validate_answers,
};
pub use exam::{Exam, ExamError, MAX_TIME_LIMIT_MINUTES};
pub use profile::{Profile, ProfileError};
pub use question::{MIN_OPTIONS, Question, QuestionError};
pub use subject::{Subject, SubjectError};
