//! Terminal front end for a running test session.

use std::sync::Arc;

use anyhow::Context;
use quiz_core::model::{TestId, UserId};
use services::{
    Direction, RunnerExit, SelectOutcome, SessionError, SessionHandle, SessionRunner,
    SessionState, SessionView, SubmitOutcome, TestSessionService,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    /// 0-based option index.
    Choose(usize),
    Next,
    Previous,
    /// 0-based question index.
    GoTo(usize),
    Submit { confirmed: bool },
    Show,
    Help,
    Quit,
    Abandon,
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    match line {
        "n" | "next" => return Some(Input::Next),
        "p" | "prev" => return Some(Input::Previous),
        "s" | "submit" => return Some(Input::Submit { confirmed: false }),
        "s!" | "submit!" => return Some(Input::Submit { confirmed: true }),
        "" | "show" => return Some(Input::Show),
        "h" | "help" | "?" => return Some(Input::Help),
        "q" | "quit" => return Some(Input::Quit),
        "abandon" => return Some(Input::Abandon),
        _ => {}
    }
    if let Some(rest) = line.strip_prefix('g') {
        let n: usize = rest.trim().parse().ok()?;
        return n.checked_sub(1).map(Input::GoTo);
    }
    let n: usize = line.parse().ok()?;
    n.checked_sub(1).map(Input::Choose)
}

/// `m:ss`, minutes unpadded.
pub fn format_clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn print_help() {
    println!("  1..9      pick an option");
    println!("  n / p     next / previous question");
    println!("  g<k>      go to question k");
    println!("  s         submit (asks first if questions are unanswered)");
    println!("  s!        submit without asking");
    println!("  q         quit; progress is kept for next time");
    println!("  abandon   quit and forget progress");
}

fn render(view: &SessionView) {
    println!();
    println!(
        "{}  [{} / {}]  {} left  {}% answered",
        view.title,
        view.question_index + 1,
        view.total_questions,
        format_clock(view.remaining_secs),
        view.progress_percent,
    );
    let Some(question) = &view.question else {
        return;
    };
    println!("{}", question.prompt);
    for (i, option) in question.options.iter().enumerate() {
        let marker = if question.selected == Some(i) { '*' } else { ' ' };
        println!(" {marker}{}) {option}", i + 1);
    }
    if let Some(feedback) = &question.feedback {
        if feedback.is_correct {
            println!("Correct.");
        } else {
            let answer = question
                .options
                .get(feedback.correct_index)
                .map_or("?", String::as_str);
            println!("Incorrect. Answer: {}) {answer}", feedback.correct_index + 1);
        }
        if let Some(explanation) = &feedback.explanation {
            println!("  {explanation}");
        }
    }
}

fn print_results(view: &SessionView) {
    let Some(report) = &view.report else {
        return;
    };
    println!();
    println!(
        "Score: {}%  ({} of {} correct)",
        report.score(),
        report.correct(),
        report.total()
    );
    for (i, result) in report.per_question().iter().enumerate() {
        let mark = match (result.selected, result.is_correct) {
            (None, _) => "-",
            (Some(_), true) => "+",
            (Some(_), false) => "x",
        };
        println!("  {mark} {}. {}", i + 1, result.question_id);
    }
    if let Some(id) = view.attempt_id {
        println!("Saved as attempt {id}. `quiz attempt {id}` shows the details.");
    }
    if view.state == SessionState::Reviewing {
        println!("Review mode: n / p / g<k> to browse answers, q to finish.");
    }
}

/// Runs one test interactively until it is submitted, quit or abandoned.
pub async fn take(
    sessions: Arc<TestSessionService>,
    test_id: &TestId,
    user_id: UserId,
) -> anyhow::Result<()> {
    let session = match sessions.start(test_id, user_id).await {
        Ok(session) => session,
        Err(SessionError::NotFound(id)) => {
            println!("No test named `{id}`. `quiz exams` lists what is available.");
            return Ok(());
        }
        Err(e) => return Err(e).context("starting test"),
    };
    let limit = session.exam().time_limit_secs();
    if session.remaining_secs() < limit || !session.answers().is_empty() {
        println!("Resuming where you left off.");
    }

    let handle = SessionRunner::spawn(sessions, session);
    let mut updates = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_notice: Option<String> = None;
    let mut results_shown = false;

    render(&handle.view());
    println!("(h for help)");

    let abandon = loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break false;
                }
                let view = updates.borrow_and_update().clone();
                if view.notice != last_notice {
                    if let Some(notice) = &view.notice {
                        println!("! {notice}");
                    }
                    last_notice = view.notice.clone();
                }
                if view.is_finished() && !results_shown {
                    results_shown = true;
                    print_results(&view);
                }
                if view.state == SessionState::Submitted {
                    break false;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("reading input")? else {
                    break false;
                };
                let Some(input) = parse_input(&line) else {
                    println!("Unrecognised input; h for help.");
                    continue;
                };
                match input {
                    Input::Quit => break false,
                    Input::Abandon => break true,
                    other => handle_input(&handle, other).await?,
                }
            }
        }
    };

    if abandon {
        handle.abandon().await.context("abandoning test")?;
        println!("Attempt abandoned.");
        return Ok(());
    }
    if handle.close().await? == RunnerExit::Detached {
        println!("Progress saved. Run `quiz take {test_id}` to continue.");
    }
    Ok(())
}

async fn handle_input(handle: &SessionHandle, input: Input) -> anyhow::Result<()> {
    match input {
        Input::Choose(option) => match handle.select_current(option).await {
            Ok(SelectOutcome::Recorded { .. }) => render(&handle.view()),
            Ok(SelectOutcome::Locked) => println!("Answers are locked."),
            Err(SessionError::OptionOutOfRange { len, .. }) => {
                println!("Pick an option between 1 and {len}.");
            }
            Err(e) => return Err(e.into()),
        },
        Input::Next => {
            handle.advance(Direction::Next).await?;
            render(&handle.view());
        }
        Input::Previous => {
            handle.advance(Direction::Previous).await?;
            render(&handle.view());
        }
        Input::GoTo(index) => {
            handle.jump_to(index).await?;
            render(&handle.view());
        }
        Input::Submit { confirmed } => match handle.submit(confirmed).await {
            Ok(SubmitOutcome::NeedsConfirmation { unanswered }) => {
                println!("{unanswered} question(s) unanswered. Type s! to submit anyway.");
            }
            Ok(SubmitOutcome::Submitted { .. }) => {}
            Err(SessionError::Submission(_)) => {}
            Err(SessionError::AlreadySubmitted | SessionError::SubmissionInFlight) => {
                println!("Already submitted.");
            }
            Err(e) => return Err(e.into()),
        },
        Input::Show => render(&handle.view()),
        Input::Help => print_help(),
        Input::Quit | Input::Abandon => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_one_based_indexes() {
        assert_eq!(parse_input("2"), Some(Input::Choose(1)));
        assert_eq!(parse_input(" g3 "), Some(Input::GoTo(2)));
        assert_eq!(parse_input("g 1"), Some(Input::GoTo(0)));
        assert_eq!(parse_input("s!"), Some(Input::Submit { confirmed: true }));
        assert_eq!(parse_input(""), Some(Input::Show));
        assert_eq!(parse_input("0"), None);
        assert_eq!(parse_input("g0"), None);
        assert_eq!(parse_input("maybe"), None);
    }

    #[test]
    fn clock_pads_seconds() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(65), "1:05");
        assert_eq!(format_clock(600), "10:00");
    }
}
