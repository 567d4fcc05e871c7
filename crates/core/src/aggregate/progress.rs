use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{FinalizedAttempt, TestId};

/// Where a user stands on a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStatus {
    NotStarted,
    /// Saved but not yet submitted state exists for the test.
    InProgress,
    Completed,
}

/// Per-test aggregate for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub test_id: TestId,
    pub attempts: u32,
    pub best_score: u8,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub status: ProgressStatus,
}

impl ProgressSummary {
    #[must_use]
    pub fn not_started(test_id: TestId) -> Self {
        Self {
            test_id,
            attempts: 0,
            best_score: 0,
            last_attempt_at: None,
            status: ProgressStatus::NotStarted,
        }
    }
}

/// Builds one summary per catalog test.
///
/// - `completed` once any finalized attempt exists,
/// - otherwise `in-progress` when the test is in `in_progress`,
/// - otherwise `not-started`.
///
/// Attempts for tests outside `test_ids` are ignored.
#[must_use]
pub fn summarize_progress<'a>(
    test_ids: impl IntoIterator<Item = &'a TestId>,
    attempts: &[FinalizedAttempt],
    in_progress: &BTreeSet<TestId>,
) -> BTreeMap<TestId, ProgressSummary> {
    let mut out: BTreeMap<TestId, ProgressSummary> = test_ids
        .into_iter()
        .map(|id| (id.clone(), ProgressSummary::not_started(id.clone())))
        .collect();

    for attempt in attempts {
        let Some(summary) = out.get_mut(attempt.test_id()) else {
            continue;
        };
        summary.attempts = summary.attempts.saturating_add(1);
        summary.best_score = summary.best_score.max(attempt.score());
        summary.last_attempt_at = Some(
            summary
                .last_attempt_at
                .map_or(attempt.completed_at(), |prev| prev.max(attempt.completed_at())),
        );
        summary.status = ProgressStatus::Completed;
    }

    for id in in_progress {
        if let Some(summary) = out.get_mut(id) {
            if summary.status == ProgressStatus::NotStarted {
                summary.status = ProgressStatus::InProgress;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerMap, UserId};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn tid(s: &str) -> TestId {
        TestId::new(s).unwrap()
    }

    fn attempt(test: &str, score: u8, minutes_after: i64) -> FinalizedAttempt {
        let at = fixed_now() + Duration::minutes(minutes_after);
        FinalizedAttempt::from_persisted(
            tid(test),
            "HTML".into(),
            UserId::random(),
            score,
            0,
            10,
            AnswerMap::new(),
            at,
            at,
        )
        .unwrap()
    }

    #[test]
    fn aggregates_count_best_and_latest() {
        let tests = [tid("html"), tid("css"), tid("js")];
        let attempts = vec![
            attempt("html", 60, 5),
            attempt("html", 90, 1),
            attempt("css", 40, 2),
            attempt("deleted", 100, 3),
        ];
        let in_progress: BTreeSet<TestId> = [tid("css"), tid("js")].into_iter().collect();

        let progress = summarize_progress(tests.iter(), &attempts, &in_progress);

        assert_eq!(progress.len(), 3);
        let html = &progress[&tid("html")];
        assert_eq!(html.attempts, 2);
        assert_eq!(html.best_score, 90);
        assert_eq!(html.last_attempt_at, Some(fixed_now() + Duration::minutes(5)));
        assert_eq!(html.status, ProgressStatus::Completed);

        // completed wins over saved in-flight state
        assert_eq!(progress[&tid("css")].status, ProgressStatus::Completed);
        assert_eq!(progress[&tid("js")].status, ProgressStatus::InProgress);
        assert_eq!(progress[&tid("js")].attempts, 0);
    }

    #[test]
    fn untouched_tests_are_not_started() {
        let tests = [tid("html")];
        let progress = summarize_progress(tests.iter(), &[], &BTreeSet::new());
        assert_eq!(progress[&tid("html")], ProgressSummary::not_started(tid("html")));
    }
}
