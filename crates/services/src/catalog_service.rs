use std::sync::Arc;

use quiz_core::model::{Exam, Question, QuestionId, Subject, SubjectId, TestId};
use storage::repository::{CatalogRepository, StorageError};
use tracing::info;

use crate::error::CatalogServiceError;

/// Unvalidated question input from an editor form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: Option<String>,
}

impl QuestionDraft {
    fn into_question(self) -> Result<Question, CatalogServiceError> {
        let id = QuestionId::new(self.id)?;
        let question = Question::new(
            id,
            self.prompt,
            self.options,
            self.correct_index,
            self.explanation,
        )?;
        Ok(question)
    }
}

/// Unvalidated exam input; replaces the stored exam wholesale on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamDraft {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub description: Option<String>,
    pub time_limit_minutes: u32,
    pub questions: Vec<QuestionDraft>,
}

/// Administrator operations over subjects, exams and questions.
#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn CatalogRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::Subject` for a blank name,
    /// `CatalogServiceError::DuplicateSubject` if the name is taken.
    pub async fn create_subject(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Subject, CatalogServiceError> {
        // Validate before touching storage; the id is assigned by the repository.
        let draft = Subject::new(SubjectId::new(0), name, description.map(str::to_owned))?;
        match self
            .catalog
            .insert_subject(draft.name(), draft.description())
            .await
        {
            Ok(subject) => {
                info!(subject = subject.name(), "subject created");
                Ok(subject)
            }
            Err(StorageError::Conflict) => Err(CatalogServiceError::DuplicateSubject),
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn list_subjects(&self) -> Result<Vec<Subject>, CatalogServiceError> {
        Ok(self.catalog.list_subjects().await?)
    }

    /// Validate a draft and persist it, replacing any exam with the same id.
    ///
    /// # Errors
    ///
    /// Returns the domain error for an invalid draft, or
    /// `CatalogServiceError::UnknownSubject` if the subject does not exist.
    pub async fn save_exam(&self, draft: ExamDraft) -> Result<Exam, CatalogServiceError> {
        let id = TestId::new(draft.id)?;
        let questions = draft
            .questions
            .into_iter()
            .map(QuestionDraft::into_question)
            .collect::<Result<Vec<_>, _>>()?;
        let exam = Exam::new(
            id,
            draft.title,
            draft.subject,
            draft.description,
            questions,
            draft.time_limit_minutes,
        )?;
        self.persist(&exam).await?;
        info!(
            test_id = %exam.id(),
            questions = exam.total_questions(),
            "exam saved"
        );
        Ok(exam)
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` for an unknown test and
    /// `CatalogServiceError::Exam` if the question id is already used.
    pub async fn add_question(
        &self,
        test_id: &TestId,
        draft: QuestionDraft,
    ) -> Result<Exam, CatalogServiceError> {
        let exam = self.require(test_id).await?;
        let updated = exam.with_question(draft.into_question()?)?;
        self.persist(&updated).await?;
        Ok(updated)
    }

    /// An exam keeps at least one question.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::QuestionNotFound` for an unknown question and
    /// `CatalogServiceError::Exam` when removing the last one.
    pub async fn remove_question(
        &self,
        test_id: &TestId,
        question_id: &QuestionId,
    ) -> Result<Exam, CatalogServiceError> {
        let exam = self.require(test_id).await?;
        let updated = exam.without_question(question_id)?.ok_or_else(|| {
            CatalogServiceError::QuestionNotFound {
                test: test_id.clone(),
                question: question_id.clone(),
            }
        })?;
        self.persist(&updated).await?;
        Ok(updated)
    }

    /// Finalized attempts for the exam are kept.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` if nothing was deleted.
    pub async fn delete_exam(&self, test_id: &TestId) -> Result<(), CatalogServiceError> {
        if self.catalog.delete_exam(test_id).await? {
            info!(test_id = %test_id, "exam deleted");
            Ok(())
        } else {
            Err(CatalogServiceError::NotFound(test_id.clone()))
        }
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn list_exams(&self) -> Result<Vec<Exam>, CatalogServiceError> {
        Ok(self.catalog.list_exams().await?)
    }

    /// Returns `Ok(None)` when the exam does not exist.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn get_exam(&self, test_id: &TestId) -> Result<Option<Exam>, CatalogServiceError> {
        Ok(self.catalog.get_exam(test_id).await?)
    }

    async fn require(&self, test_id: &TestId) -> Result<Exam, CatalogServiceError> {
        self.catalog
            .get_exam(test_id)
            .await?
            .ok_or_else(|| CatalogServiceError::NotFound(test_id.clone()))
    }

    async fn persist(&self, exam: &Exam) -> Result<(), CatalogServiceError> {
        match self.catalog.upsert_exam(exam).await {
            Ok(()) => Ok(()),
            Err(StorageError::NotFound) => {
                Err(CatalogServiceError::UnknownSubject(exam.subject().to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{ExamError, SubjectError};
    use storage::repository::InMemoryRepository;

    fn question(id: &str) -> QuestionDraft {
        QuestionDraft {
            id: id.into(),
            prompt: format!("Prompt {id}"),
            options: vec!["yes".into(), "no".into()],
            correct_index: 0,
            explanation: None,
        }
    }

    fn draft() -> ExamDraft {
        ExamDraft {
            id: "css-basics".into(),
            title: "CSS Basics".into(),
            subject: "CSS".into(),
            description: None,
            time_limit_minutes: 10,
            questions: vec![question("q1"), question("q2")],
        }
    }

    async fn service() -> CatalogService {
        let service = CatalogService::new(Arc::new(InMemoryRepository::new()));
        service.create_subject("CSS", None).await.unwrap();
        service
    }

    #[tokio::test]
    async fn duplicate_subject_is_reported() {
        let service = service().await;
        let err = service.create_subject("CSS", Some("again")).await.unwrap_err();
        assert!(matches!(err, CatalogServiceError::DuplicateSubject));

        let err = service.create_subject("   ", None).await.unwrap_err();
        assert!(matches!(err, CatalogServiceError::Subject(SubjectError::EmptyName)));
    }

    #[tokio::test]
    async fn save_exam_requires_known_subject() {
        let service = service().await;
        let mut orphan = draft();
        orphan.subject = "Rust".into();

        let err = service.save_exam(orphan).await.unwrap_err();
        assert!(matches!(err, CatalogServiceError::UnknownSubject(name) if name == "Rust"));
        assert!(service.list_exams().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_drafts_surface_domain_errors() {
        let service = service().await;

        let mut bad_id = draft();
        bad_id.id = "has space".into();
        assert!(matches!(
            service.save_exam(bad_id).await.unwrap_err(),
            CatalogServiceError::Id(_)
        ));

        let mut bad_question = draft();
        bad_question.questions[0].correct_index = 7;
        assert!(matches!(
            service.save_exam(bad_question).await.unwrap_err(),
            CatalogServiceError::Question(_)
        ));
    }

    #[tokio::test]
    async fn questions_can_be_added_and_removed() {
        let service = service().await;
        let exam = service.save_exam(draft()).await.unwrap();
        let id = exam.id().clone();

        let exam = service.add_question(&id, question("q3")).await.unwrap();
        assert_eq!(exam.total_questions(), 3);

        let err = service.add_question(&id, question("q1")).await.unwrap_err();
        assert!(matches!(err, CatalogServiceError::Exam(ExamError::DuplicateQuestion(_))));

        let q2 = QuestionId::new("q2").unwrap();
        let exam = service.remove_question(&id, &q2).await.unwrap();
        assert_eq!(exam.total_questions(), 2);

        let stored = service.get_exam(&id).await.unwrap().unwrap();
        assert_eq!(stored, exam);

        let err = service.remove_question(&id, &q2).await.unwrap_err();
        assert!(matches!(err, CatalogServiceError::QuestionNotFound { .. }));
    }

    #[tokio::test]
    async fn last_question_cannot_be_removed() {
        let service = service().await;
        let mut single = draft();
        single.questions.truncate(1);
        let exam = service.save_exam(single).await.unwrap();

        let q1 = QuestionId::new("q1").unwrap();
        let err = service.remove_question(exam.id(), &q1).await.unwrap_err();
        assert!(matches!(err, CatalogServiceError::Exam(ExamError::NoQuestions)));
    }

    #[tokio::test]
    async fn delete_unknown_exam_is_not_found() {
        let service = service().await;
        let exam = service.save_exam(draft()).await.unwrap();

        service.delete_exam(exam.id()).await.unwrap();
        let err = service.delete_exam(exam.id()).await.unwrap_err();
        assert!(matches!(err, CatalogServiceError::NotFound(_)));
        assert!(service.get_exam(exam.id()).await.unwrap().is_none());
    }
}
