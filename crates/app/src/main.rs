mod cli;
mod demo;
mod sqlite_url;
mod take;
mod telemetry;

use anyhow::Context;
use clap::Parser;
use quiz_core::aggregate::ProgressStatus;
use quiz_core::model::{TestId, UserId};
use services::{AppServices, AuthUser, Clock, FeedbackMode, SessionConfig};
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::sqlite_url::{normalize_sqlite_url, prepare_sqlite_file};

/// Stable id for an email, so the same user keeps their history across runs.
fn user_id_for(email: &str) -> UserId {
    let normalized = email.trim().to_lowercase();
    UserId::new(Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("mailto:{normalized}").as_bytes()))
}

fn session_config(command: &Command) -> SessionConfig {
    match command {
        Command::Take {
            immediate_feedback,
            no_review,
            ..
        } => SessionConfig::default()
            .with_feedback(if *immediate_feedback {
                FeedbackMode::Immediate
            } else {
                FeedbackMode::Deferred
            })
            .with_review_after_submit(!no_review),
        _ => SessionConfig::default(),
    }
}

fn status_label(status: ProgressStatus) -> &'static str {
    match status {
        ProgressStatus::NotStarted => "not started",
        ProgressStatus::InProgress => "in progress",
        ProgressStatus::Completed => "completed",
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(if cli.verbose { "info" } else { "warn" });

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    let db_url = normalize_sqlite_url(&cli.db_url);
    prepare_sqlite_file(&db_url)?;

    let user_id = user_id_for(&cli.user);
    let app = AppServices::new_sqlite(
        &db_url,
        &cli.progress_dir,
        Clock::system(),
        session_config(&cli.command),
    )
    .await
    .with_context(|| format!("opening {db_url}"))?;

    let identity = app
        .identity()
        .sign_in(AuthUser {
            user_id,
            email: Some(cli.user.trim().to_owned()),
            display_name_hint: None,
            avatar_url: None,
        })
        .await
        .context("signing in")?;

    match cli.command {
        Command::Seed => {
            let count = demo::seed(&app.catalog()).await?;
            println!("Seeded {count} exams.");
        }
        Command::Exams { subject } => {
            let progress = app.progress().progress_for(user_id).await?;
            let exams = app.catalog().list_exams().await?;
            let mut shown = 0;
            for exam in exams.iter().filter(|e| {
                subject
                    .as_deref()
                    .is_none_or(|s| e.subject().eq_ignore_ascii_case(s))
            }) {
                let status = progress
                    .get(exam.id())
                    .map_or(ProgressStatus::NotStarted, |p| p.status);
                println!(
                    "{:<20} {:<28} {:<14} {:>2} questions {:>3} min  {}",
                    exam.id().as_str(),
                    exam.title(),
                    exam.subject(),
                    exam.total_questions(),
                    exam.time_limit_minutes(),
                    status_label(status),
                );
                shown += 1;
            }
            if shown == 0 {
                println!("No exams yet. `quiz seed` loads a demo catalog.");
            }
        }
        Command::Take { test_id, .. } => {
            let test_id: TestId = test_id.parse().context("invalid test id")?;
            take::take(app.sessions(), &test_id, user_id).await?;
        }
        Command::Progress => {
            for summary in app.progress().progress_for(user_id).await?.values() {
                let last = summary
                    .last_attempt_at
                    .map_or_else(|| "-".to_owned(), |at| at.format("%Y-%m-%d %H:%M").to_string());
                println!(
                    "{:<20} {:<12} attempts {:>3}  best {:>3}%  last {last}",
                    summary.test_id.as_str(),
                    status_label(summary.status),
                    summary.attempts,
                    summary.best_score,
                );
            }
        }
        Command::Leaderboard => {
            let rows = app.progress().leaderboard().await?;
            if rows.is_empty() {
                println!("Nobody has finished a test yet.");
            }
            for row in rows {
                let you = if row.entry.user_id == user_id { "  (you)" } else { "" };
                println!(
                    "{:>3}. {:<24} avg {:>3}%  attempts {:>3}{you}",
                    row.entry.rank, row.display_name, row.average_score, row.entry.attempts,
                );
            }
        }
        Command::Stats => {
            let stats = app.progress().stats(user_id).await?;
            println!(
                "{}: {} attempts, average {}%",
                identity.profile.display_name(),
                stats.total_attempts,
                stats.average_score
            );
            println!("Distribution:");
            for bucket in &stats.distribution {
                println!(
                    "  {:>3}-{:<3} {}",
                    bucket.low,
                    bucket.high,
                    "#".repeat(bucket.count as usize)
                );
            }
            println!("Subjects:");
            for subject in &stats.subjects {
                println!(
                    "  {:<16} attempts {:>3}  avg {:>3}%",
                    subject.subject, subject.attempts, subject.average_score
                );
            }
            println!("Recent:");
            for recent in &stats.recent {
                println!(
                    "  {}  {:<20} {:>3}%",
                    recent.completed_at.format("%Y-%m-%d %H:%M"),
                    recent.test_id.as_str(),
                    recent.score
                );
            }
        }
        Command::Attempt { id } => {
            let detail = app
                .progress()
                .attempt_detail(user_id, id)
                .await
                .with_context(|| format!("attempt {id}"))?;
            let attempt = &detail.attempt;
            println!(
                "{} ({}): {}%  {}/{} correct in {}",
                attempt.test_id(),
                attempt.subject(),
                attempt.score(),
                attempt.correct_count(),
                attempt.total_questions(),
                take::format_clock(attempt.time_taken_secs()),
            );
            for answer in &detail.answers {
                let mark = if answer.is_correct { '+' } else { 'x' };
                println!(
                    "  {mark} {}. {}",
                    answer.question_index + 1,
                    answer.question_text
                );
                println!(
                    "      yours: {}  correct: {}",
                    answer.selected_answer.as_deref().unwrap_or("(none)"),
                    answer.correct_answer
                );
            }
        }
        Command::Avatar { url } => {
            let updated = app
                .identity()
                .update_avatar(url)
                .await
                .context("updating avatar")?;
            match updated.profile.avatar_url() {
                Some(url) => println!("Avatar for {} set to {url}.", updated.profile.display_name()),
                None => println!("Avatar for {} removed.", updated.profile.display_name()),
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err:#}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_ids_are_stable_per_email() {
        assert_eq!(user_id_for("Ada@Example.com "), user_id_for("ada@example.com"));
        assert_ne!(user_id_for("ada@example.com"), user_id_for("bob@example.com"));
    }
}
