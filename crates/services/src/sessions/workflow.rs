use std::sync::Arc;

use quiz_core::model::{AnswerRecord, FinalizedAttempt, TestId, UserId};
use quiz_core::scoring::ScoreReport;
use storage::progress_store::ProgressStore;
use storage::repository::{AttemptId, AttemptRepository, CatalogRepository, NewAttemptRecord};
use tracing::{debug, info, warn};

use super::session::{SubmitCheck, TestSession};
use crate::Clock;
use crate::config::SessionConfig;
use crate::error::SessionError;

/// Result of a submission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Unanswered questions remain and the caller has not confirmed.
    NeedsConfirmation { unanswered: usize },
    Submitted {
        attempt_id: AttemptId,
        report: ScoreReport,
    },
}

/// Orchestrates session start/resume, auto-save and persisted submission.
#[derive(Clone)]
pub struct TestSessionService {
    clock: Clock,
    catalog: Arc<dyn CatalogRepository>,
    attempts: Arc<dyn AttemptRepository>,
    progress: Arc<dyn ProgressStore>,
    config: SessionConfig,
}

impl TestSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CatalogRepository>,
        attempts: Arc<dyn AttemptRepository>,
        progress: Arc<dyn ProgressStore>,
    ) -> Self {
        Self {
            clock,
            catalog,
            attempts,
            progress,
            config: SessionConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start a session for `test_id`, resuming saved progress when it still fits.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` if the test does not exist, or
    /// `SessionError::Storage` if the catalog cannot be read.
    pub async fn start(&self, test_id: &TestId, user_id: UserId) -> Result<TestSession, SessionError> {
        let exam = self
            .catalog
            .get_exam(test_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(test_id.clone()))?;

        match self.progress.load(user_id, test_id).await {
            Ok(Some(snapshot)) => {
                match TestSession::resume(exam.clone(), user_id, &snapshot, &self.config) {
                    Ok(session) => {
                        info!(
                            test_id = %test_id,
                            user_id = %user_id,
                            question_index = snapshot.question_index,
                            remaining_secs = snapshot.remaining_secs,
                            "resuming saved attempt"
                        );
                        return Ok(session);
                    }
                    Err(e) => {
                        warn!(test_id = %test_id, error = %e, "saved attempt no longer fits test; starting fresh");
                        self.discard_saved(user_id, test_id).await;
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(test_id = %test_id, error = %e, "saved attempt unreadable; starting fresh");
                self.discard_saved(user_id, test_id).await;
            }
        }

        info!(test_id = %test_id, user_id = %user_id, "starting attempt");
        Ok(TestSession::new(exam, user_id, self.clock.now(), &self.config))
    }

    /// Best-effort save of the in-flight state. Returns whether anything was written.
    pub async fn autosave(&self, session: &TestSession) -> bool {
        let Some(snapshot) = session.snapshot(self.clock.now()) else {
            return false;
        };
        match self.progress.save(snapshot.user_id, &snapshot.test_id, &snapshot).await {
            Ok(()) => {
                debug!(
                    test_id = %snapshot.test_id,
                    remaining_secs = snapshot.remaining_secs,
                    "attempt auto-saved"
                );
                true
            }
            Err(e) => {
                warn!(test_id = %snapshot.test_id, error = %e, "auto-save failed");
                false
            }
        }
    }

    /// Grade the session and hand the finalized attempt to the backend.
    ///
    /// On backend failure the session returns to its previous state with all
    /// answers intact; nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Submission` if the backend rejects the attempt,
    /// `SessionError::AlreadySubmitted`/`SubmissionInFlight` for repeated calls.
    pub async fn submit(
        &self,
        session: &mut TestSession,
        confirmed: bool,
    ) -> Result<SubmitOutcome, SessionError> {
        let report = match session.begin_submit(confirmed)? {
            SubmitCheck::NeedsConfirmation { unanswered } => {
                return Ok(SubmitOutcome::NeedsConfirmation { unanswered });
            }
            SubmitCheck::Ready(report) => report,
        };

        let record = match self.build_record(session, &report) {
            Ok(record) => record,
            Err(e) => {
                session.abort_submit();
                return Err(e);
            }
        };

        let test_id = session.exam().id().clone();
        let attempt_id = match self.attempts.append_attempt(&record).await {
            Ok(id) => id,
            Err(e) => {
                session.abort_submit();
                warn!(test_id = %test_id, error = %e, "submission failed; answers kept for retry");
                return Err(SessionError::Submission(e));
            }
        };

        session.complete_submit(report.clone(), attempt_id);
        info!(
            test_id = %test_id,
            user_id = %session.user_id(),
            attempt_id,
            score = report.score(),
            "attempt submitted"
        );
        self.discard_saved(session.user_id(), &test_id).await;

        Ok(SubmitOutcome::Submitted { attempt_id, report })
    }

    /// Drop the session without submitting and forget its saved progress.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Progress` if the saved state cannot be cleared.
    pub async fn abandon(&self, session: TestSession) -> Result<(), SessionError> {
        let test_id = session.exam().id().clone();
        if !session.state().is_finished() {
            self.progress.clear(session.user_id(), &test_id).await?;
        }
        info!(test_id = %test_id, user_id = %session.user_id(), "attempt abandoned");
        Ok(())
    }

    fn build_record(
        &self,
        session: &TestSession,
        report: &ScoreReport,
    ) -> Result<NewAttemptRecord, SessionError> {
        let exam = session.exam();
        let completed_at = self.clock.now().max(session.started_at());
        let attempt = FinalizedAttempt::from_report(
            exam,
            session.user_id(),
            session.answers().clone(),
            report,
            session.started_at(),
            completed_at,
        )?;
        Ok(NewAttemptRecord {
            attempt,
            answers: AnswerRecord::from_report(exam, report),
        })
    }

    async fn discard_saved(&self, user_id: UserId, test_id: &TestId) {
        if let Err(e) = self.progress.clear(user_id, test_id).await {
            warn!(test_id = %test_id, error = %e, "could not clear saved attempt");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::session::SessionState;
    use quiz_core::model::{Exam, Question, QuestionId};
    use quiz_core::time::{fixed_clock, fixed_now};
    use storage::progress_store::InMemoryProgressStore;
    use storage::repository::{AttemptRow, InMemoryRepository, StorageError};

    fn exam() -> Exam {
        let questions = (1..=3)
            .map(|i| {
                Question::new(
                    QuestionId::new(format!("q{i}")).unwrap(),
                    format!("Prompt {i}"),
                    vec!["a".into(), "b".into(), "c".into()],
                    i - 1,
                    None,
                )
                .unwrap()
            })
            .collect();
        Exam::new(TestId::new("t1").unwrap(), "T1", "HTML", None, questions, 2).unwrap()
    }

    async fn service_with(
        attempts: Arc<dyn AttemptRepository>,
    ) -> (TestSessionService, InMemoryProgressStore) {
        let repo = InMemoryRepository::new();
        repo.insert_subject("HTML", None).await.unwrap();
        repo.upsert_exam(&exam()).await.unwrap();
        let progress = InMemoryProgressStore::new();
        let service = TestSessionService::new(
            fixed_clock(),
            Arc::new(repo),
            attempts,
            Arc::new(progress.clone()),
        );
        (service, progress)
    }

    struct FailingAttempts;

    #[async_trait::async_trait]
    impl AttemptRepository for FailingAttempts {
        async fn append_attempt(&self, _: &NewAttemptRecord) -> Result<AttemptId, StorageError> {
            Err(StorageError::Connection("backend offline".into()))
        }
        async fn get_attempt(&self, _: AttemptId) -> Result<AttemptRow, StorageError> {
            Err(StorageError::NotFound)
        }
        async fn list_attempts_for_user(&self, _: UserId) -> Result<Vec<AttemptRow>, StorageError> {
            Ok(Vec::new())
        }
        async fn list_all_attempts(&self) -> Result<Vec<AttemptRow>, StorageError> {
            Ok(Vec::new())
        }
        async fn list_recent_attempts(&self, _: u32) -> Result<Vec<AttemptRow>, StorageError> {
            Ok(Vec::new())
        }
        async fn answers_for_attempt(&self, _: AttemptId) -> Result<Vec<AnswerRecord>, StorageError> {
            Err(StorageError::NotFound)
        }
    }

    fn tid() -> TestId {
        TestId::new("t1").unwrap()
    }

    #[tokio::test]
    async fn start_unknown_test_is_not_found() {
        let (service, _) = service_with(Arc::new(InMemoryRepository::new())).await;
        let err = service
            .start(&TestId::new("missing").unwrap(), UserId::random())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(id) if id.as_str() == "missing"));
    }

    #[tokio::test]
    async fn autosave_then_resume_restores_state() {
        let (service, progress) = service_with(Arc::new(InMemoryRepository::new())).await;
        let user = UserId::random();

        let mut session = service.start(&tid(), user).await.unwrap();
        session.select_answer(&QuestionId::new("q2").unwrap(), 1).unwrap();
        session.jump_to(1);
        for _ in 0..30 {
            session.tick();
        }
        assert!(service.autosave(&session).await);
        assert_eq!(progress.list_saved(user).await.unwrap(), vec![tid()]);

        let resumed = service.start(&tid(), user).await.unwrap();
        assert_eq!(resumed.current_index(), session.current_index());
        assert_eq!(resumed.answers(), session.answers());
        assert_eq!(resumed.remaining_secs(), 90);
    }

    #[tokio::test]
    async fn saved_progress_only_resumes_for_its_owner() {
        let (service, progress) = service_with(Arc::new(InMemoryRepository::new())).await;
        let (ada, bob) = (UserId::random(), UserId::random());

        let mut session = service.start(&tid(), ada).await.unwrap();
        session.select_answer(&QuestionId::new("q1").unwrap(), 0).unwrap();
        for _ in 0..100 {
            session.tick();
        }
        assert!(service.autosave(&session).await);

        let fresh = service.start(&tid(), bob).await.unwrap();
        assert_eq!(fresh.user_id(), bob);
        assert!(fresh.answers().is_empty());
        assert_eq!(fresh.remaining_secs(), 120);
        assert!(progress.list_saved(bob).await.unwrap().is_empty());

        service.abandon(fresh).await.unwrap();
        let resumed = service.start(&tid(), ada).await.unwrap();
        assert_eq!(resumed.remaining_secs(), 20);
        assert_eq!(resumed.answers().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_saved_progress_is_cleared_and_ignored() {
        let (service, progress) = service_with(Arc::new(InMemoryRepository::new())).await;
        let user = UserId::random();
        progress.insert_raw(user, &tid(), "{\"broken\":").unwrap();

        let session = service.start(&tid(), user).await.unwrap();
        assert_eq!(session.remaining_secs(), 120);
        assert!(session.answers().is_empty());
        assert!(progress.load(user, &tid()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn submit_persists_attempt_and_clears_progress() {
        let repo = InMemoryRepository::new();
        let (service, progress) = service_with(Arc::new(repo.clone())).await;
        let user = UserId::random();

        let mut session = service.start(&tid(), user).await.unwrap();
        session.select_answer(&QuestionId::new("q1").unwrap(), 0).unwrap();
        session.select_answer(&QuestionId::new("q2").unwrap(), 2).unwrap();
        service.autosave(&session).await;

        assert_eq!(
            service.submit(&mut session, false).await.unwrap(),
            SubmitOutcome::NeedsConfirmation { unanswered: 1 }
        );

        let SubmitOutcome::Submitted { attempt_id, report } =
            service.submit(&mut session, true).await.unwrap()
        else {
            panic!("confirmed submission should go through");
        };
        assert_eq!(report.score(), 33);
        assert_eq!(session.state(), SessionState::Reviewing);
        assert!(progress.load(user, &tid()).await.unwrap().is_none());

        let stored = repo.get_attempt(attempt_id).await.unwrap();
        assert_eq!(stored.attempt.user_id(), user);
        assert_eq!(stored.attempt.score(), 33);
        assert_eq!(stored.attempt.started_at(), fixed_now());
        let answers = repo.answers_for_attempt(attempt_id).await.unwrap();
        assert_eq!(answers.len(), 3);
        assert_eq!(answers[2].selected_answer, None);

        assert!(matches!(
            service.submit(&mut session, true).await,
            Err(SessionError::AlreadySubmitted)
        ));
    }

    #[tokio::test]
    async fn failed_submission_keeps_answers_for_retry() {
        let (service, progress) = service_with(Arc::new(FailingAttempts)).await;
        let user = UserId::random();
        let mut session = service.start(&tid(), user).await.unwrap();
        session.select_answer(&QuestionId::new("q1").unwrap(), 0).unwrap();
        service.autosave(&session).await;

        let err = service.submit(&mut session, true).await.unwrap_err();
        assert!(matches!(err, SessionError::Submission(_)));
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.answers().len(), 1);
        assert!(session.report().is_none());
        assert!(progress.load(user, &tid()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn abandon_clears_saved_progress() {
        let (service, progress) = service_with(Arc::new(InMemoryRepository::new())).await;
        let user = UserId::random();
        let session = service.start(&tid(), user).await.unwrap();
        service.autosave(&session).await;
        assert!(progress.load(user, &tid()).await.unwrap().is_some());

        service.abandon(session).await.unwrap();
        assert!(progress.load(user, &tid()).await.unwrap().is_none());
    }
}
