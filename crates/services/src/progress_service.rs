use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;

use quiz_core::aggregate::{
    LeaderboardEntry, ProgressSummary, StatsOverview, leaderboard, stats_overview,
    summarize_progress,
};
use quiz_core::model::{AnswerRecord, FinalizedAttempt, TestId, UserId};
use storage::progress_store::ProgressStore;
use storage::repository::{
    AttemptId, AttemptRepository, AttemptRow, CatalogRepository, ProfileRepository, StorageError,
};

use crate::error::ProgressServiceError;

/// Shown for users without a profile row.
pub const FALLBACK_DISPLAY_NAME: &str = "User";

/// Leaderboard entry joined with the user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardRow {
    #[serde(flatten)]
    pub entry: LeaderboardEntry,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub average_score: u8,
}

/// A finalized attempt with its per-question breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptDetail {
    pub id: AttemptId,
    pub attempt: FinalizedAttempt,
    pub answers: Vec<AnswerRecord>,
}

/// Read-side dashboards: per-test progress, leaderboard, stats and history.
///
/// `progress` is the signed-in user's local store; in-progress status is
/// only meaningful for that user.
#[derive(Clone)]
pub struct ProgressService {
    catalog: Arc<dyn CatalogRepository>,
    attempts: Arc<dyn AttemptRepository>,
    profiles: Arc<dyn ProfileRepository>,
    progress: Arc<dyn ProgressStore>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        attempts: Arc<dyn AttemptRepository>,
        profiles: Arc<dyn ProfileRepository>,
        progress: Arc<dyn ProgressStore>,
    ) -> Self {
        Self {
            catalog,
            attempts,
            profiles,
            progress,
        }
    }

    /// One summary per catalog exam, zero-filled when never attempted.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the catalog, attempts or local store
    /// cannot be read.
    pub async fn progress_for(
        &self,
        user_id: UserId,
    ) -> Result<BTreeMap<TestId, ProgressSummary>, ProgressServiceError> {
        let exams = self.catalog.list_exams().await?;
        let attempts = self.user_attempts(user_id).await?;
        let saved: BTreeSet<TestId> = self.progress.list_saved(user_id).await?.into_iter().collect();

        Ok(summarize_progress(
            exams.iter().map(|exam| exam.id()),
            &attempts,
            &saved,
        ))
    }

    /// Ranked rows across all users and tests.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardRow>, ProgressServiceError> {
        let attempts: Vec<FinalizedAttempt> = self
            .attempts
            .list_all_attempts()
            .await?
            .into_iter()
            .map(|row| row.attempt)
            .collect();
        let entries = leaderboard(&attempts);

        let user_ids: Vec<UserId> = entries.iter().map(|e| e.user_id).collect();
        let profiles: HashMap<UserId, _> = self
            .profiles
            .list_profiles(&user_ids)
            .await?
            .into_iter()
            .map(|p| (p.user_id(), p))
            .collect();

        Ok(entries
            .into_iter()
            .map(|entry| {
                let profile = profiles.get(&entry.user_id);
                LeaderboardRow {
                    display_name: profile
                        .map_or(FALLBACK_DISPLAY_NAME, |p| p.display_name())
                        .to_owned(),
                    avatar_url: profile.and_then(|p| p.avatar_url()).map(str::to_owned),
                    average_score: entry.average_score(),
                    entry,
                }
            })
            .collect())
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn stats(&self, user_id: UserId) -> Result<StatsOverview, ProgressServiceError> {
        let attempts = self.user_attempts(user_id).await?;
        Ok(stats_overview(&attempts))
    }

    /// The user's finalized attempts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn history(&self, user_id: UserId) -> Result<Vec<AttemptRow>, ProgressServiceError> {
        Ok(self.attempts.list_attempts_for_user(user_id).await?)
    }

    /// Another user's attempt reads as missing.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` wrapping `StorageError::NotFound`
    /// for unknown or foreign attempts.
    pub async fn attempt_detail(
        &self,
        user_id: UserId,
        id: AttemptId,
    ) -> Result<AttemptDetail, ProgressServiceError> {
        let row = self.attempts.get_attempt(id).await?;
        if row.attempt.user_id() != user_id {
            return Err(StorageError::NotFound.into());
        }
        let answers = self.attempts.answers_for_attempt(id).await?;
        Ok(AttemptDetail {
            id: row.id,
            attempt: row.attempt,
            answers,
        })
    }

    async fn user_attempts(
        &self,
        user_id: UserId,
    ) -> Result<Vec<FinalizedAttempt>, ProgressServiceError> {
        Ok(self
            .attempts
            .list_attempts_for_user(user_id)
            .await?
            .into_iter()
            .map(|row| row.attempt)
            .collect())
    }
}
