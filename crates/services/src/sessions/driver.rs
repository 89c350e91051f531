//! Single-writer task that owns an `ExamSession`.
//!
//! Host commands and one-second ticks are merged into one loop, so the state
//! machine never sees two commands at once. The ticker only exists while the
//! session is `InProgress`; leaving that phase drops it, so no expiry can fire
//! after submission or abandonment.

use std::time::Duration;

use exam_core::model::AnswerValue;
use exam_core::session::{Command, ExamSession, Phase, SessionError, SessionSnapshot, Transition};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::submission::SubmissionWorkflow;
use crate::Clock;
use crate::error::ServiceError;

const COMMAND_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Real time per countdown second. Shorter values speed up demos.
    pub tick: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
enum Request {
    Start,
    Answer { index: usize, raw: String },
    Advance { index: usize },
    Submit { force: bool },
    Abandon,
}

struct Envelope {
    request: Request,
    reply: oneshot::Sender<Result<Transition, ServiceError>>,
}

/// Cloneable host-side handle to a running driver.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Envelope>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// # Errors
    ///
    /// Returns `ServiceError::Session` if the session is not showing instructions.
    pub async fn start(&self) -> Result<Transition, ServiceError> {
        self.request(Request::Start).await
    }

    /// Record an answer for the current question.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Session` for blank answers or a non-current index.
    pub async fn answer(&self, index: usize, raw: impl Into<String>) -> Result<Transition, ServiceError> {
        self.request(Request::Answer {
            index,
            raw: raw.into(),
        })
        .await
    }

    /// Leave the current question, submitting if it is the last one.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Session` for a non-current index, or
    /// `ServiceError::SubmissionFailed` if leaving the last question fails to submit.
    pub async fn advance(&self, index: usize) -> Result<Transition, ServiceError> {
        self.request(Request::Advance { index }).await
    }

    /// Submit, or retry a failed submission.
    ///
    /// Without `force`, unanswered questions yield `Transition::IncompleteWarning`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::SubmissionFailed` if the sink rejects the attempt.
    pub async fn submit(&self, force: bool) -> Result<Transition, ServiceError> {
        self.request(Request::Submit { force }).await
    }

    /// Give up the session without producing an attempt.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::DriverClosed` if the driver has stopped.
    pub async fn abandon(&self) -> Result<Transition, ServiceError> {
        self.request(Request::Abandon).await
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that wakes on every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    async fn request(&self, request: Request) -> Result<Transition, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Envelope { request, reply })
            .await
            .map_err(|_| ServiceError::DriverClosed)?;
        response.await.map_err(|_| ServiceError::DriverClosed)?
    }
}

/// Owns the session for its whole life. Built through [`SessionDriver::spawn`].
pub struct SessionDriver {
    session: ExamSession,
    workflow: SubmissionWorkflow,
    clock: Clock,
    config: DriverConfig,
    commands: mpsc::Receiver<Envelope>,
    snapshots: watch::Sender<SessionSnapshot>,
    ticker: Option<Interval>,
}

impl SessionDriver {
    /// Spawn the driver loop on the current tokio runtime.
    ///
    /// The task ends once every `SessionHandle` is dropped and yields the
    /// session in whatever phase it reached.
    #[must_use]
    pub fn spawn(
        session: ExamSession,
        workflow: SubmissionWorkflow,
        clock: Clock,
        config: DriverConfig,
    ) -> (SessionHandle, JoinHandle<ExamSession>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());

        let mut driver = Self {
            session,
            workflow,
            clock,
            config,
            commands: command_rx,
            snapshots: snapshot_tx,
            ticker: None,
        };
        driver.sync_ticker();

        let handle = SessionHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        (handle, tokio::spawn(driver.run()))
    }

    async fn run(mut self) -> ExamSession {
        debug!(session_id = %self.session.id(), "driver started");
        loop {
            tokio::select! {
                // Host commands first: a submit already queued beats the next tick.
                biased;
                envelope = self.commands.recv() => {
                    let Some(Envelope { request, reply }) = envelope else {
                        break;
                    };
                    let result = self.handle(request).await;
                    self.settle();
                    // Host may have stopped waiting for the reply.
                    let _ = reply.send(result);
                }
                () = next_tick(&mut self.ticker) => {
                    if let Err(err) = self.apply(Command::Tick).await {
                        warn!(session_id = %self.session.id(), error = %err, "tick failed");
                    }
                    self.settle();
                }
            }
        }
        debug!(
            session_id = %self.session.id(),
            phase = %self.session.phase(),
            "driver stopped"
        );
        self.session
    }

    async fn handle(&mut self, request: Request) -> Result<Transition, ServiceError> {
        let command = match request {
            Request::Start => Command::Start,
            Request::Answer { .. } if self.session.ignores_answers() => {
                return Ok(Transition::Ignored);
            }
            Request::Answer { index, raw } => Command::Answer {
                index,
                value: AnswerValue::new(raw).map_err(SessionError::from)?,
            },
            Request::Advance { index } => Command::Advance { index },
            Request::Submit { force } => Command::Submit { force },
            Request::Abandon => Command::Abandon,
        };
        self.apply(command).await
    }

    async fn apply(&mut self, command: Command) -> Result<Transition, ServiceError> {
        let name = command.name();
        let transition = self.session.dispatch(command, self.clock.now())?;
        let session_id = self.session.id();
        match &transition {
            Transition::SubmissionReady { reason } => {
                info!(session_id = %session_id, trigger = name, reason = %reason, "submitting attempt");
                // Drop the ticker before awaiting the sink.
                self.sync_ticker();
                return self.workflow.finalize(&mut self.session).await;
            }
            Transition::Started {
                total_allowance_secs,
                ..
            } => {
                info!(session_id = %session_id, total_allowance_secs = *total_allowance_secs, "exam started");
            }
            Transition::Abandoned => info!(session_id = %session_id, "session abandoned"),
            Transition::Ticked { .. } | Transition::Ignored => {}
            other => debug!(session_id = %session_id, transition = ?other, "transition"),
        }
        Ok(transition)
    }

    /// Align the ticker with the phase and publish the new snapshot.
    fn settle(&mut self) {
        self.sync_ticker();
        self.snapshots.send_replace(self.session.snapshot());
    }

    fn sync_ticker(&mut self) {
        let running = self.session.phase() == Phase::InProgress;
        match (&self.ticker, running) {
            (None, true) => {
                let period = self.config.tick;
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
                self.ticker = Some(interval);
            }
            (Some(_), false) => self.ticker = None,
            _ => {}
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
