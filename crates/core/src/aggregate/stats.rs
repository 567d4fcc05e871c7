use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::rounded_average;
use crate::model::{FinalizedAttempt, TestId};

/// How many recent attempts the dashboard shows.
pub const RECENT_LIMIT: usize = 10;

const BUCKETS: [(u8, u8); 5] = [(0, 20), (21, 40), (41, 60), (61, 80), (81, 100)];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreBucket {
    pub low: u8,
    pub high: u8,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectStat {
    pub subject: String,
    pub attempts: u32,
    pub average_score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentAttempt {
    pub test_id: TestId,
    pub subject: String,
    pub score: u8,
    pub completed_at: DateTime<Utc>,
}

/// Dashboard numbers for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsOverview {
    pub total_attempts: u32,
    pub average_score: u8,
    pub distribution: Vec<ScoreBucket>,
    /// Sorted by subject name.
    pub subjects: Vec<SubjectStat>,
    /// Oldest first, at most `RECENT_LIMIT`.
    pub recent: Vec<RecentAttempt>,
}

#[must_use]
pub fn stats_overview(attempts: &[FinalizedAttempt]) -> StatsOverview {
    let mut distribution: Vec<ScoreBucket> = BUCKETS
        .iter()
        .map(|&(low, high)| ScoreBucket {
            low,
            high,
            count: 0,
        })
        .collect();
    let mut by_subject: BTreeMap<&str, (u32, u64)> = BTreeMap::new();
    let mut total_score = 0_u64;

    for attempt in attempts {
        let score = attempt.score();
        total_score += u64::from(score);

        if let Some(bucket) = distribution
            .iter_mut()
            .find(|b| (b.low..=b.high).contains(&score))
        {
            bucket.count += 1;
        }

        let entry = by_subject.entry(attempt.subject()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += u64::from(score);
    }

    let total_attempts = u32::try_from(attempts.len()).unwrap_or(u32::MAX);

    let subjects = by_subject
        .into_iter()
        .map(|(subject, (count, total))| SubjectStat {
            subject: subject.to_owned(),
            attempts: count,
            average_score: rounded_average(total, count),
        })
        .collect();

    let mut chronological: Vec<&FinalizedAttempt> = attempts.iter().collect();
    chronological.sort_by_key(|a| a.completed_at());
    let skip = chronological.len().saturating_sub(RECENT_LIMIT);
    let recent = chronological
        .into_iter()
        .skip(skip)
        .map(|a| RecentAttempt {
            test_id: a.test_id().clone(),
            subject: a.subject().to_owned(),
            score: a.score(),
            completed_at: a.completed_at(),
        })
        .collect();

    StatsOverview {
        total_attempts,
        average_score: rounded_average(total_score, total_attempts),
        distribution,
        subjects,
        recent,
    }
}
