//! Cooperative event loop that owns a `TestSession`.
//!
//! One task multiplexes the countdown tick, the auto-save interval and
//! commands from the presentation layer. Every mutation happens on that task,
//! so an auto-save can never interleave with a submission.

use std::sync::Arc;

use quiz_core::model::QuestionId;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use super::session::{Direction, SelectOutcome, SessionState, TestSession, TickOutcome};
use super::view::SessionView;
use super::workflow::{SubmitOutcome, TestSessionService};
use crate::error::SessionError;

const COMMAND_BUFFER: usize = 16;

/// How a runner task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerExit {
    /// Submitted (and review, if any, closed).
    Finished,
    Abandoned,
    /// Every handle went away before submission; progress was saved.
    Detached,
}

enum Command {
    Select {
        question_id: Option<QuestionId>,
        option: usize,
        reply: oneshot::Sender<Result<SelectOutcome, SessionError>>,
    },
    Advance {
        direction: Direction,
        reply: oneshot::Sender<usize>,
    },
    JumpTo {
        index: usize,
        reply: oneshot::Sender<usize>,
    },
    Submit {
        confirmed: bool,
        reply: oneshot::Sender<Result<SubmitOutcome, SessionError>>,
    },
    Abandon {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
}

/// Client side of a running session.
///
/// Dropping the handle ends the loop after a final auto-save.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<SessionView>,
    task: JoinHandle<RunnerExit>,
}

impl SessionHandle {
    /// Latest published view.
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Independent receiver for view updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Waits for the next view update and returns it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::RunnerStopped` once the loop has ended.
    pub async fn changed(&mut self) -> Result<SessionView, SessionError> {
        self.view
            .changed()
            .await
            .map_err(|_| SessionError::RunnerStopped)?;
        Ok(self.view.borrow_and_update().clone())
    }

    /// # Errors
    ///
    /// See `TestSession::select_answer`; `RunnerStopped` if the loop is gone.
    pub async fn select(
        &self,
        question_id: QuestionId,
        option: usize,
    ) -> Result<SelectOutcome, SessionError> {
        self.request(|reply| Command::Select {
            question_id: Some(question_id),
            option,
            reply,
        })
        .await?
    }

    /// Answers the question under the pointer.
    ///
    /// # Errors
    ///
    /// See `TestSession::select_answer`; `RunnerStopped` if the loop is gone.
    pub async fn select_current(&self, option: usize) -> Result<SelectOutcome, SessionError> {
        self.request(|reply| Command::Select {
            question_id: None,
            option,
            reply,
        })
        .await?
    }

    /// # Errors
    ///
    /// Returns `SessionError::RunnerStopped` if the loop is gone.
    pub async fn advance(&self, direction: Direction) -> Result<usize, SessionError> {
        self.request(|reply| Command::Advance { direction, reply })
            .await
    }

    /// # Errors
    ///
    /// Returns `SessionError::RunnerStopped` if the loop is gone.
    pub async fn jump_to(&self, index: usize) -> Result<usize, SessionError> {
        self.request(|reply| Command::JumpTo { index, reply }).await
    }

    /// # Errors
    ///
    /// See `TestSessionService::submit`; `RunnerStopped` if the loop is gone.
    pub async fn submit(&self, confirmed: bool) -> Result<SubmitOutcome, SessionError> {
        self.request(|reply| Command::Submit { confirmed, reply })
            .await?
    }

    /// Abandons the attempt and waits for the loop to end.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Progress` if saved state cannot be cleared.
    pub async fn abandon(self) -> Result<(), SessionError> {
        let result = self.request(|reply| Command::Abandon { reply }).await?;
        let _ = self.close().await;
        result
    }

    /// Releases the handle and waits for the loop to finish its final save.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::RunnerStopped` if the task panicked.
    pub async fn close(self) -> Result<RunnerExit, SessionError> {
        let Self {
            commands,
            view,
            task,
        } = self;
        drop(commands);
        drop(view);
        task.await.map_err(|_| SessionError::RunnerStopped)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| SessionError::RunnerStopped)?;
        rx.await.map_err(|_| SessionError::RunnerStopped)
    }
}

/// Owns a session on a background task.
pub struct SessionRunner {
    service: Arc<TestSessionService>,
    session: TestSession,
    commands: mpsc::Receiver<Command>,
    view: watch::Sender<SessionView>,
    notice: Option<String>,
}

impl SessionRunner {
    /// Spawns the loop on the current tokio runtime.
    #[must_use]
    pub fn spawn(service: Arc<TestSessionService>, session: TestSession) -> SessionHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (view_tx, view_rx) = watch::channel(SessionView::from_session(&session, None));
        let runner = Self {
            service,
            session,
            commands: commands_rx,
            view: view_tx,
            notice: None,
        };
        let task = tokio::spawn(runner.run());
        SessionHandle {
            commands: commands_tx,
            view: view_rx,
            task,
        }
    }

    async fn run(mut self) -> RunnerExit {
        let config = self.service.config().clone();
        let mut ticker = interval_at(Instant::now() + config.tick, config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut autosave = interval_at(
            Instant::now() + config.autosave_every,
            config.autosave_every,
        );
        autosave.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit = loop {
            if self.session.state() == SessionState::Submitted {
                break RunnerExit::Finished;
            }
            let running = self.session.timer_running();

            tokio::select! {
                _ = ticker.tick(), if running => {
                    if self.session.tick() == TickOutcome::Expired {
                        info!(test_id = %self.session.exam().id(), "time is up; submitting");
                        self.notice = Some("Time is up.".to_owned());
                        if let Err(e) = self.submit(true).await {
                            warn!(
                                test_id = %self.session.exam().id(),
                                error = %e,
                                "auto-submit failed; waiting for a manual retry"
                            );
                        }
                    }
                    self.publish();
                }
                _ = autosave.tick(), if running => {
                    self.service.autosave(&self.session).await;
                }
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else {
                        break if self.session.state().is_finished() {
                            RunnerExit::Finished
                        } else {
                            // Teardown save: the page-unload equivalent.
                            self.service.autosave(&self.session).await;
                            RunnerExit::Detached
                        };
                    };
                    if let Some(exit) = self.handle(cmd).await {
                        break exit;
                    }
                    self.publish();
                }
            }
        };

        debug!(test_id = %self.session.exam().id(), ?exit, "session runner stopped");
        exit
    }

    async fn handle(&mut self, cmd: Command) -> Option<RunnerExit> {
        match cmd {
            Command::Select {
                question_id,
                option,
                reply,
            } => {
                let result = match question_id {
                    Some(id) => self.session.select_answer(&id, option),
                    None => self.session.select_current(option),
                };
                let _ = reply.send(result);
            }
            Command::Advance { direction, reply } => {
                let _ = reply.send(self.session.advance(direction));
            }
            Command::JumpTo { index, reply } => {
                let _ = reply.send(self.session.jump_to(index));
            }
            Command::Submit { confirmed, reply } => {
                let result = self.submit(confirmed).await;
                let _ = reply.send(result);
            }
            Command::Abandon { reply } => {
                let result = self.service.abandon(self.session.clone()).await;
                let _ = reply.send(result);
                return Some(RunnerExit::Abandoned);
            }
        }
        None
    }

    async fn submit(&mut self, confirmed: bool) -> Result<SubmitOutcome, SessionError> {
        let result = self.service.submit(&mut self.session, confirmed).await;
        match &result {
            Ok(SubmitOutcome::Submitted { .. }) => self.notice = None,
            Ok(SubmitOutcome::NeedsConfirmation { .. }) => {}
            Err(SessionError::Submission(e)) => {
                self.notice = Some(format!("Could not submit your answers ({e}). Try again."));
            }
            Err(_) => {}
        }
        result
    }

    fn publish(&self) {
        let view = SessionView::from_session(&self.session, self.notice.clone());
        self.view.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}
