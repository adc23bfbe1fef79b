//! Async driver that connects a [`KeystrokeMonitor`] to its collaborators.
//!
//! A session is a single tokio task. Commands (keystrokes, lifecycle,
//! configuration) are processed strictly in order; verifier calls run
//! concurrently in a [`JoinSet`] and their answers re-enter the task as
//! ordinary events, so the monitor itself is only ever touched by one task.
//!
//! Queued commands take priority over verifier answers: a `Stop` sent before
//! an answer is read always wins, and the answer is then discarded.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::alert::{deliver, AlertSink};
use crate::monitor::{
    KeystrokeEvent, KeystrokeMonitor, MonitorAction, MonitorSettings, MonitorStats,
};
use crate::policy::SurfacePolicy;
use crate::verifier::{VerificationOutcome, VerificationRequest, Verifier, VerifierError};

/// Capacity of the command channel.
const COMMAND_BUFFER: usize = 256;

/// Default time allowed for one verifier call.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Session errors surfaced to the host.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session task has exited.
    #[error("monitor session is closed")]
    Closed,
}

/// Instructions accepted by a running session.
#[derive(Debug)]
pub enum SessionCommand {
    /// A keystroke from the page.
    Keystroke(KeystrokeEvent),
    /// Replace the monitor settings.
    Configure(MonitorSettings),
    /// Start monitoring (subject to policy).
    Start,
    /// Stop monitoring; in-flight verifier answers will be ignored.
    Stop,
    /// Hold further commands until every in-flight verifier call resolves.
    Settle(oneshot::Sender<()>),
    /// Finish in-flight verifier calls, then exit.
    Shutdown,
}

/// Summary returned when a session exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Monitor counters at exit.
    pub stats: MonitorStats,
    /// Alerts handed to the sink.
    pub alerts_delivered: u64,
    /// Alerts the sink failed to deliver.
    pub alert_failures: u64,
    /// Verifier calls that errored or timed out.
    pub verifier_failures: u64,
}

/// Cloneable sender side of a session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Forward a keystroke.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has exited.
    pub async fn keystroke(&self, event: KeystrokeEvent) -> Result<(), SessionError> {
        self.send(SessionCommand::Keystroke(event)).await
    }

    /// Replace the monitor settings.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has exited.
    pub async fn configure(&self, settings: MonitorSettings) -> Result<(), SessionError> {
        self.send(SessionCommand::Configure(settings)).await
    }

    /// Start monitoring.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has exited.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Start).await
    }

    /// Stop monitoring.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has exited.
    pub async fn stop(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Stop).await
    }

    /// Wait until every verifier call issued so far has been answered.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has exited.
    pub async fn settle(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Settle(tx)).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Ask the session to exit once in-flight verifier calls finish.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has already exited.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Shutdown).await
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

/// One monitored page context and its collaborators.
pub struct MonitorSession {
    monitor: KeystrokeMonitor,
    verifier: Arc<dyn Verifier>,
    sink: Arc<dyn AlertSink>,
    policy: Arc<dyn SurfacePolicy>,
    verify_timeout: Duration,
    report: SessionReport,
}

impl MonitorSession {
    /// Assemble a session. The monitor is started on the first
    /// [`SessionCommand::Start`].
    pub fn new(
        monitor: KeystrokeMonitor,
        verifier: Arc<dyn Verifier>,
        sink: Arc<dyn AlertSink>,
        policy: Arc<dyn SurfacePolicy>,
    ) -> Self {
        Self {
            monitor,
            verifier,
            sink,
            policy,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
            report: SessionReport::default(),
        }
    }

    /// Override the per-call verifier timeout.
    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    /// Run the session on a new tokio task.
    pub fn spawn(self) -> (SessionHandle, JoinHandle<SessionReport>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(self.run(rx));
        (SessionHandle { commands: tx }, task)
    }

    /// Process commands until shutdown or until every handle is dropped.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) -> SessionReport {
        let mut checks: JoinSet<(Uuid, VerificationOutcome)> = JoinSet::new();
        let mut settling: Option<oneshot::Sender<()>> = None;
        let mut open = true;

        loop {
            if !open && checks.is_empty() {
                break;
            }
            tokio::select! {
                biased;

                command = commands.recv(), if open && settling.is_none() => {
                    match command {
                        Some(SessionCommand::Shutdown) | None => {
                            debug!(in_flight = checks.len(), "session shutting down");
                            open = false;
                        }
                        Some(SessionCommand::Settle(ack)) => {
                            if checks.is_empty() {
                                let _ = ack.send(());
                            } else {
                                settling = Some(ack);
                            }
                        }
                        Some(command) => {
                            let actions = self.apply(command);
                            self.perform(actions, &mut checks).await;
                        }
                    }
                }
                Some(joined) = checks.join_next(), if !checks.is_empty() => {
                    match joined {
                        Ok((token, outcome)) => {
                            if outcome == VerificationOutcome::Unavailable {
                                self.report.verifier_failures =
                                    self.report.verifier_failures.saturating_add(1);
                            }
                            let actions = self.monitor.on_verification_result(token, outcome);
                            self.perform(actions, &mut checks).await;
                        }
                        Err(e) => warn!(error = %e, "verifier task failed"),
                    }
                    if checks.is_empty() {
                        if let Some(ack) = settling.take() {
                            let _ = ack.send(());
                        }
                    }
                }
                else => break,
            }
        }

        self.monitor.stop();
        self.report.stats = self.monitor.stats();
        info!(
            accepted = self.report.stats.accepted,
            alerts = self.report.alerts_delivered,
            "session finished"
        );
        self.report
    }

    fn apply(&mut self, command: SessionCommand) -> Vec<MonitorAction> {
        match command {
            SessionCommand::Keystroke(event) => self.monitor.on_keystroke(&event),
            SessionCommand::Configure(settings) => {
                self.monitor.configure(settings);
                Vec::new()
            }
            SessionCommand::Start => {
                if !self.monitor.start(self.policy.as_ref()) {
                    info!(url = %self.monitor.page().url, "monitoring not started");
                }
                Vec::new()
            }
            SessionCommand::Stop => {
                self.monitor.stop();
                Vec::new()
            }
            SessionCommand::Settle(_) | SessionCommand::Shutdown => Vec::new(),
        }
    }

    async fn perform(
        &mut self,
        actions: Vec<MonitorAction>,
        checks: &mut JoinSet<(Uuid, VerificationOutcome)>,
    ) {
        for action in actions {
            match action {
                MonitorAction::Verify(request) => self.dispatch(request, checks),
                MonitorAction::Alert(alert) => match deliver(self.sink.as_ref(), &alert).await {
                    Ok(()) => {
                        self.report.alerts_delivered =
                            self.report.alerts_delivered.saturating_add(1);
                    }
                    Err(e) => {
                        self.report.alert_failures = self.report.alert_failures.saturating_add(1);
                        warn!(alert = alert.kind(), error = %e, "alert sink failed");
                    }
                },
            }
        }
    }

    fn dispatch(
        &self,
        request: VerificationRequest,
        checks: &mut JoinSet<(Uuid, VerificationOutcome)>,
    ) {
        let verifier = Arc::clone(&self.verifier);
        let timeout = self.verify_timeout;
        checks.spawn(async move {
            let VerificationRequest {
                token,
                candidate,
                context,
            } = request;
            let outcome =
                match tokio::time::timeout(timeout, verifier.check_candidate(&candidate, &context))
                    .await
                {
                    Ok(Ok(is_match)) => VerificationOutcome::from(Ok(is_match)),
                    Ok(Err(e)) => {
                        debug!(%token, error = %e, "verifier call failed");
                        VerificationOutcome::Unavailable
                    }
                    Err(_) => {
                        let e = VerifierError::Timeout(timeout);
                        debug!(%token, error = %e, "verifier call failed");
                        VerificationOutcome::Unavailable
                    }
                };
            (token, outcome)
        });
    }
}
