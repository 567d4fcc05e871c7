use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::rounded_average;
use crate::model::{FinalizedAttempt, UserId};

/// One ranked row of the cross-test leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based position after sorting.
    pub rank: u32,
    pub user_id: UserId,
    pub attempts: u32,
    pub total_score: u64,
    pub first_completed_at: DateTime<Utc>,
    pub last_completed_at: DateTime<Utc>,
}

impl LeaderboardEntry {
    /// Average score rounded half up, for display.
    #[must_use]
    pub fn average_score(&self) -> u8 {
        rounded_average(self.total_score, self.attempts)
    }

    /// Compares exact averages without rounding: higher first.
    fn cmp_average_desc(&self, other: &Self) -> Ordering {
        let lhs = u128::from(self.total_score) * u128::from(other.attempts);
        let rhs = u128::from(other.total_score) * u128::from(self.attempts);
        rhs.cmp(&lhs)
    }

    /// Ranking order: average desc, earliest first completion, more attempts, user id.
    fn cmp_rank(&self, other: &Self) -> Ordering {
        self.cmp_average_desc(other)
            .then_with(|| self.first_completed_at.cmp(&other.first_completed_at))
            .then_with(|| other.attempts.cmp(&self.attempts))
            .then_with(|| self.user_id.cmp(&other.user_id))
    }
}

/// Groups attempts by user and ranks them.
///
/// Ties on the exact average are broken by who completed their first attempt
/// earliest, then by attempt count (more wins), then by user id so the order
/// is total and deterministic.
#[must_use]
pub fn leaderboard(attempts: &[FinalizedAttempt]) -> Vec<LeaderboardEntry> {
    let mut by_user: HashMap<UserId, LeaderboardEntry> = HashMap::new();

    for attempt in attempts {
        let at = attempt.completed_at();
        by_user
            .entry(attempt.user_id())
            .and_modify(|e| {
                e.attempts = e.attempts.saturating_add(1);
                e.total_score += u64::from(attempt.score());
                e.first_completed_at = e.first_completed_at.min(at);
                e.last_completed_at = e.last_completed_at.max(at);
            })
            .or_insert_with(|| LeaderboardEntry {
                rank: 0,
                user_id: attempt.user_id(),
                attempts: 1,
                total_score: u64::from(attempt.score()),
                first_completed_at: at,
                last_completed_at: at,
            });
    }

    let mut entries: Vec<LeaderboardEntry> = by_user.into_values().collect();
    entries.sort_by(LeaderboardEntry::cmp_rank);
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = u32::try_from(i + 1).unwrap_or(u32::MAX);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerMap, TestId};
    use crate::time::fixed_now;
    use chrono::Duration;
    use uuid::Uuid;

    fn user(n: u128) -> UserId {
        UserId::new(Uuid::from_u128(n))
    }

    fn attempt(user_id: UserId, score: u8, minutes_after: i64) -> FinalizedAttempt {
        let at = fixed_now() + Duration::minutes(minutes_after);
        FinalizedAttempt::from_persisted(
            TestId::new("html").unwrap(),
            "HTML".into(),
            user_id,
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
    fn equal_average_ranks_earliest_first_completion_higher() {
        let a = user(0xA);
        let b = user(0xB);
        let attempts = vec![attempt(a, 80, 1), attempt(a, 100, 10), attempt(b, 90, 5)];

        let board = leaderboard(&attempts);

        assert_eq!(board.len(), 2);
        assert_eq!(board[0].user_id, a);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[0].average_score(), 90);
        assert_eq!(board[0].attempts, 2);
        assert_eq!(board[1].user_id, b);
        assert_eq!(board[1].rank, 2);
        assert_eq!(board[1].average_score(), 90);
        assert_eq!(board[1].attempts, 1);
    }

    #[test]
    fn earlier_starter_wins_even_with_fewer_attempts() {
        let a = user(0xA);
        let b = user(0xB);
        let attempts = vec![attempt(a, 80, 3), attempt(a, 100, 10), attempt(b, 90, 1)];

        let board = leaderboard(&attempts);
        assert_eq!(board[0].user_id, b);
        assert_eq!(board[1].user_id, a);
    }

    #[test]
    fn same_start_breaks_on_attempts_then_user_id() {
        let a = user(2);
        let b = user(1);
        let c = user(3);
        let attempts = vec![
            attempt(a, 70, 0),
            attempt(b, 70, 0),
            attempt(c, 70, 0),
            attempt(c, 70, 4),
        ];

        let board = leaderboard(&attempts);
        let order: Vec<UserId> = board.iter().map(|e| e.user_id).collect();
        assert_eq!(order, vec![c, b, a]);
    }

    #[test]
    fn higher_exact_average_wins_over_rounding_tie() {
        // 181/2 = 90.5 vs 90: both display 91/90 but exact compare decides.
        let a = user(1);
        let b = user(2);
        let attempts = vec![attempt(a, 90, 0), attempt(b, 90, 5), attempt(b, 91, 6)];
        let board = leaderboard(&attempts);
        assert_eq!(board[0].user_id, b);
        assert_eq!(board[0].average_score(), 91);
    }

    #[test]
    fn empty_input_yields_empty_board() {
        assert!(leaderboard(&[]).is_empty());
    }
}
