use async_trait::async_trait;
use quiz_core::model::{
    AnswerRecord, Exam, FinalizedAttempt, Profile, Question, QuestionId, Subject, SubjectId,
    TestId, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Storage identifier for a persisted finalized attempt ("quiz session" row).
pub type AttemptId = i64;

//
// ─── BOUNDARY RECORDS ─────────────────────────────────────────────────────────
//

/// Question as the backend hands it over: loosely typed until validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: i64,
    pub explanation: Option<String>,
}

impl QuestionRecord {
    #[must_use]
    pub fn from_question(question: &Question) -> Self {
        Self {
            id: question.id().as_str().to_owned(),
            prompt: question.prompt().to_owned(),
            options: question.options().to_vec(),
            correct_index: i64::try_from(question.correct_index()).unwrap_or(i64::MAX),
            explanation: question.explanation().map(str::to_owned),
        }
    }

    /// Validate the record into a domain `Question`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` describing the malformed field.
    pub fn into_question(self) -> Result<Question, StorageError> {
        let id = QuestionId::new(self.id).map_err(ser)?;
        let correct_index = usize::try_from(self.correct_index).map_err(|_| {
            StorageError::Serialization(format!(
                "invalid correct_index {} for question {id}",
                self.correct_index
            ))
        })?;
        Question::new(id, self.prompt, self.options, correct_index, self.explanation).map_err(ser)
    }
}

/// Exam header plus its ordered question records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamRecord {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub description: Option<String>,
    pub time_limit_minutes: i64,
    pub questions: Vec<QuestionRecord>,
}

impl ExamRecord {
    #[must_use]
    pub fn from_exam(exam: &Exam) -> Self {
        Self {
            id: exam.id().as_str().to_owned(),
            title: exam.title().to_owned(),
            subject: exam.subject().to_owned(),
            description: exam.description().map(str::to_owned),
            time_limit_minutes: i64::from(exam.time_limit_minutes()),
            questions: exam
                .questions()
                .iter()
                .map(QuestionRecord::from_question)
                .collect(),
        }
    }

    /// Validate the record (and every question) into a domain `Exam`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if any field fails validation.
    pub fn into_exam(self) -> Result<Exam, StorageError> {
        let id = TestId::new(self.id).map_err(ser)?;
        let time_limit = u32::try_from(self.time_limit_minutes).map_err(|_| {
            StorageError::Serialization(format!(
                "invalid time_limit_minutes {} for exam {id}",
                self.time_limit_minutes
            ))
        })?;
        let questions = self
            .questions
            .into_iter()
            .map(QuestionRecord::into_question)
            .collect::<Result<Vec<_>, _>>()?;
        Exam::new(
            id,
            self.title,
            self.subject,
            self.description,
            questions,
            time_limit,
        )
        .map_err(ser)
    }
}

/// A finalized attempt with the per-question detail written alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttemptRecord {
    pub attempt: FinalizedAttempt,
    pub answers: Vec<AnswerRecord>,
}

/// A stored finalized attempt and its row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRow {
    pub id: AttemptId,
    pub attempt: FinalizedAttempt,
}

impl AttemptRow {
    #[must_use]
    pub fn new(id: AttemptId, attempt: FinalizedAttempt) -> Self {
        Self { id, attempt }
    }
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

//
// ─── CONTRACTS ────────────────────────────────────────────────────────────────
//

/// Subjects, exams and their questions.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Insert a subject and assign it a new id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a subject with the same name exists.
    async fn insert_subject(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Subject, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn subject_by_name(&self, name: &str) -> Result<Option<Subject>, StorageError>;

    /// Subjects ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError>;

    /// Persist or replace an exam, including its full question list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the exam's subject does not exist.
    async fn upsert_exam(&self, exam: &Exam) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored rows are malformed.
    async fn get_exam(&self, id: &TestId) -> Result<Option<Exam>, StorageError>;

    /// Exams ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures or malformed rows.
    async fn list_exams(&self) -> Result<Vec<Exam>, StorageError>;

    /// Returns whether an exam was deleted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn delete_exam(&self, id: &TestId) -> Result<bool, StorageError>;
}

/// Finalized attempts ("quiz sessions") and their answer detail.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Store an attempt and its answer detail atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails; nothing is stored in that case.
    async fn append_attempt(&self, record: &NewAttemptRecord) -> Result<AttemptId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_attempt(&self, id: AttemptId) -> Result<AttemptRow, StorageError>;

    /// Attempts owned by `user_id`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_attempts_for_user(&self, user_id: UserId)
    -> Result<Vec<AttemptRow>, StorageError>;

    /// Every finalized attempt across all users, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_all_attempts(&self) -> Result<Vec<AttemptRow>, StorageError>;

    /// Most recent attempts across all users.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_recent_attempts(&self, limit: u32) -> Result<Vec<AttemptRow>, StorageError>;

    /// Answer detail for an attempt, in question order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the attempt does not exist.
    async fn answers_for_attempt(&self, id: AttemptId) -> Result<Vec<AnswerRecord>, StorageError>;
}

/// Public user profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError>;

    /// Profiles for the given users; unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_profiles(&self, user_ids: &[UserId]) -> Result<Vec<Profile>, StorageError>;
}

//
// ─── IN-MEMORY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
struct StoredAttempt {
    id: AttemptId,
    attempt: FinalizedAttempt,
    answers: Vec<AnswerRecord>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    subjects: Arc<Mutex<BTreeMap<SubjectId, Subject>>>,
    exams: Arc<Mutex<BTreeMap<TestId, Exam>>>,
    attempts: Arc<Mutex<Vec<StoredAttempt>>>,
    profiles: Arc<Mutex<HashMap<UserId, Profile>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn sort_recent_first(rows: &mut [AttemptRow]) {
    rows.sort_by(|a, b| {
        b.attempt
            .completed_at()
            .cmp(&a.attempt.completed_at())
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn insert_subject(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Subject, StorageError> {
        let mut guard = self.subjects.lock().map_err(poisoned)?;
        if guard.values().any(|s| s.name() == name.trim()) {
            return Err(StorageError::Conflict);
        }
        let next = guard.keys().next_back().map_or(1, |id| id.value() + 1);
        let subject = Subject::new(SubjectId::new(next), name, description.map(str::to_owned))
            .map_err(ser)?;
        guard.insert(subject.id(), subject.clone());
        Ok(subject)
    }

    async fn subject_by_name(&self, name: &str) -> Result<Option<Subject>, StorageError> {
        let guard = self.subjects.lock().map_err(poisoned)?;
        Ok(guard.values().find(|s| s.name() == name.trim()).cloned())
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        let guard = self.subjects.lock().map_err(poisoned)?;
        let mut subjects: Vec<Subject> = guard.values().cloned().collect();
        subjects.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(subjects)
    }

    async fn upsert_exam(&self, exam: &Exam) -> Result<(), StorageError> {
        if self.subject_by_name(exam.subject()).await?.is_none() {
            return Err(StorageError::NotFound);
        }
        let mut guard = self.exams.lock().map_err(poisoned)?;
        guard.insert(exam.id().clone(), exam.clone());
        Ok(())
    }

    async fn get_exam(&self, id: &TestId) -> Result<Option<Exam>, StorageError> {
        let guard = self.exams.lock().map_err(poisoned)?;
        Ok(guard.get(id).cloned())
    }

    async fn list_exams(&self) -> Result<Vec<Exam>, StorageError> {
        let guard = self.exams.lock().map_err(poisoned)?;
        Ok(guard.values().cloned().collect())
    }

    async fn delete_exam(&self, id: &TestId) -> Result<bool, StorageError> {
        let mut guard = self.exams.lock().map_err(poisoned)?;
        Ok(guard.remove(id).is_some())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, record: &NewAttemptRecord) -> Result<AttemptId, StorageError> {
        let mut guard = self.attempts.lock().map_err(poisoned)?;
        let id = guard.last().map_or(1, |a| a.id + 1);
        guard.push(StoredAttempt {
            id,
            attempt: record.attempt.clone(),
            answers: record.answers.clone(),
        });
        Ok(id)
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<AttemptRow, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|a| a.id == id)
            .map(|a| AttemptRow::new(a.id, a.attempt.clone()))
            .ok_or(StorageError::NotFound)
    }

    async fn list_attempts_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        let mut rows: Vec<AttemptRow> = guard
            .iter()
            .filter(|a| a.attempt.user_id() == user_id)
            .map(|a| AttemptRow::new(a.id, a.attempt.clone()))
            .collect();
        sort_recent_first(&mut rows);
        Ok(rows)
    }

    async fn list_all_attempts(&self) -> Result<Vec<AttemptRow>, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        let mut rows: Vec<AttemptRow> = guard
            .iter()
            .map(|a| AttemptRow::new(a.id, a.attempt.clone()))
            .collect();
        sort_recent_first(&mut rows);
        Ok(rows)
    }

    async fn list_recent_attempts(&self, limit: u32) -> Result<Vec<AttemptRow>, StorageError> {
        let mut rows = self.list_all_attempts().await?;
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn answers_for_attempt(&self, id: AttemptId) -> Result<Vec<AnswerRecord>, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.answers.clone())
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, StorageError> {
        let guard = self.profiles.lock().map_err(poisoned)?;
        Ok(guard.get(&user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let mut guard = self.profiles.lock().map_err(poisoned)?;
        guard.insert(profile.user_id(), profile.clone());
        Ok(())
    }

    async fn list_profiles(&self, user_ids: &[UserId]) -> Result<Vec<Profile>, StorageError> {
        let guard = self.profiles.lock().map_err(poisoned)?;
        Ok(user_ids
            .iter()
            .filter_map(|id| guard.get(id).cloned())
            .collect())
    }
}

/// Aggregates the backend repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CatalogRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let catalog: Arc<dyn CatalogRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo.clone());
        let profiles: Arc<dyn ProfileRepository> = Arc::new(repo);
        Self {
            catalog,
            attempts,
            profiles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::AnswerMap;
    use quiz_core::scoring::score;
    use quiz_core::time::fixed_now;

    fn build_exam(id: &str, subject: &str) -> Exam {
        let questions = (0..2)
            .map(|i| {
                Question::new(
                    QuestionId::new(format!("{id}-{i}")).unwrap(),
                    format!("Q{i}"),
                    vec!["yes".into(), "no".into()],
                    i,
                    None,
                )
                .unwrap()
            })
            .collect();
        Exam::new(TestId::new(id).unwrap(), "Title", subject, None, questions, 10).unwrap()
    }

    fn build_record(exam: &Exam, user: UserId, minutes: i64) -> NewAttemptRecord {
        let answers = AnswerMap::new();
        let report = score(exam.questions(), &answers);
        let at = fixed_now() + chrono::Duration::minutes(minutes);
        let attempt = FinalizedAttempt::from_report(exam, user, answers, &report, at, at).unwrap();
        NewAttemptRecord {
            answers: AnswerRecord::from_report(exam, &report),
            attempt,
        }
    }

    #[tokio::test]
    async fn exams_require_existing_subject() {
        let repo = InMemoryRepository::new();
        let exam = build_exam("html", "HTML");

        let err = repo.upsert_exam(&exam).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        repo.insert_subject("HTML", None).await.unwrap();
        repo.upsert_exam(&exam).await.unwrap();
        assert_eq!(repo.get_exam(exam.id()).await.unwrap(), Some(exam.clone()));
        assert!(repo.delete_exam(exam.id()).await.unwrap());
        assert!(!repo.delete_exam(exam.id()).await.unwrap());
    }

    #[tokio::test]
    async fn subject_names_are_unique() {
        let repo = InMemoryRepository::new();
        let first = repo.insert_subject("CSS", None).await.unwrap();
        let second = repo.insert_subject("HTML", None).await.unwrap();
        assert_eq!(first.id(), SubjectId::new(1));
        assert_eq!(second.id(), SubjectId::new(2));

        let err = repo.insert_subject("CSS", None).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn attempts_are_filtered_by_owner_and_sorted() {
        let repo = InMemoryRepository::new();
        let exam = build_exam("html", "HTML");
        let alice = UserId::random();
        let bob = UserId::random();

        let first = repo.append_attempt(&build_record(&exam, alice, 1)).await.unwrap();
        let second = repo.append_attempt(&build_record(&exam, alice, 5)).await.unwrap();
        repo.append_attempt(&build_record(&exam, bob, 3)).await.unwrap();

        let rows = repo.list_attempts_for_user(alice).await.unwrap();
        let ids: Vec<AttemptId> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second, first]);

        assert_eq!(repo.list_all_attempts().await.unwrap().len(), 3);
        let recent = repo.list_recent_attempts(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, second);

        let answers = repo.answers_for_attempt(first).await.unwrap();
        assert_eq!(answers.len(), 2);
        assert!(matches!(
            repo.answers_for_attempt(99).await.unwrap_err(),
            StorageError::NotFound
        ));
    }

    #[test]
    fn malformed_question_record_is_rejected() {
        let record = QuestionRecord {
            id: "q1".into(),
            prompt: "Prompt".into(),
            options: vec!["only".into()],
            correct_index: 0,
            explanation: None,
        };
        assert!(matches!(
            record.into_question().unwrap_err(),
            StorageError::Serialization(_)
        ));

        let record = QuestionRecord {
            id: "q1".into(),
            prompt: "Prompt".into(),
            options: vec!["a".into(), "b".into()],
            correct_index: -1,
            explanation: None,
        };
        assert!(record.into_question().is_err());
    }

    #[test]
    fn exam_record_roundtrips_through_validation() {
        let exam = build_exam("css", "CSS");
        let back = ExamRecord::from_exam(&exam).into_exam().unwrap();
        assert_eq!(back, exam);
    }
}
