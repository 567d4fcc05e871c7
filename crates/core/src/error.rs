use thiserror::Error;

use crate::model::{AttemptError, ExamError, ParseIdError, ProfileError, QuestionError, SubjectError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Id(#[from] ParseIdError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Subject(#[from] SubjectError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Exam, TestId};

    fn build() -> Result<Exam, Error> {
        let id = TestId::new("empty")?;
        Ok(Exam::new(id, "Empty", "HTML", None, Vec::new(), 5)?)
    }

    #[test]
    fn domain_errors_convert_into_crate_error() {
        assert!(matches!(build(), Err(Error::Exam(ExamError::NoQuestions))));

        let err: Error = TestId::new("no spaces allowed").unwrap_err().into();
        assert!(matches!(err, Error::Id(_)));
    }
}
