//! Read-side aggregation over finalized attempts: per-test progress,
//! cross-user leaderboard, and dashboard statistics.

mod leaderboard;
mod progress;
mod stats;

pub use leaderboard::{LeaderboardEntry, leaderboard};
pub use progress::{ProgressStatus, ProgressSummary, summarize_progress};
pub use stats::{RECENT_LIMIT, RecentAttempt, ScoreBucket, StatsOverview, SubjectStat, stats_overview};

/// Mean of `count` scores summing to `total`, rounded half up. Zero count yields 0.
pub(crate) fn rounded_average(total: u64, count: u32) -> u8 {
    if count == 0 {
        return 0;
    }
    let count = u64::from(count);
    let avg = (2 * total + count) / (2 * count);
    u8::try_from(avg.min(100)).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::rounded_average;

    #[test]
    fn rounded_average_rounds_half_up() {
        assert_eq!(rounded_average(0, 0), 0);
        assert_eq!(rounded_average(180, 2), 90);
        assert_eq!(rounded_average(181, 2), 91);
        assert_eq!(rounded_average(100, 3), 33);
    }
}
