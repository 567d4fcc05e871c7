use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "quiz")]
#[command(about = "Timed multiple-choice tests in the terminal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// SQLite database URL or path
    #[arg(long = "db", env = "QUIZ_DB_URL", default_value = "sqlite://quiz.sqlite3", global = true)]
    pub db_url: String,

    /// Directory for auto-saved, not yet submitted attempts
    #[arg(long, env = "QUIZ_PROGRESS_DIR", default_value = ".quiz-progress", global = true)]
    pub progress_dir: PathBuf,

    /// Email of the signed-in user
    #[arg(long, env = "QUIZ_USER", default_value = "guest@localhost", global = true)]
    pub user: String,

    /// Log at info level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the demo subjects and exams (existing exams are replaced)
    Seed,

    /// List available exams
    Exams {
        /// Only exams for this subject
        #[arg(short, long)]
        subject: Option<String>,
    },

    /// Take (or resume) a test
    Take {
        test_id: String,

        /// Show whether each answer is right as soon as it is picked
        #[arg(long)]
        immediate_feedback: bool,

        /// Finish right after submission instead of showing the review
        #[arg(long)]
        no_review: bool,
    },

    /// Per-test progress for the current user
    Progress,

    /// Everyone's average score, best first
    Leaderboard,

    /// Score distribution, subjects and recent attempts for the current user
    Stats,

    /// Per-question breakdown of one of your attempts
    Attempt { id: i64 },

    /// Set your profile picture; without a URL the current one is removed
    Avatar { url: Option<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avatar_url_is_optional() {
        let cli = Cli::try_parse_from(["quiz", "avatar", "https://x.org/me.png"]).unwrap();
        assert!(matches!(cli.command, Command::Avatar { url: Some(ref u) } if u == "https://x.org/me.png"));

        let cli = Cli::try_parse_from(["quiz", "--user", "ada@x.org", "avatar"]).unwrap();
        assert!(matches!(cli.command, Command::Avatar { url: None }));
        assert_eq!(cli.user, "ada@x.org");
    }
}
