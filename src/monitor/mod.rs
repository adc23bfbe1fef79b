//! Keystroke monitoring state machine.
//!
//! [`KeystrokeMonitor`] owns the rolling buffer and OTP tracker for exactly
//! one page context. It performs no I/O: each call returns the
//! [`MonitorAction`]s the host must carry out (verifier requests, alerts), and
//! verifier answers come back through
//! [`KeystrokeMonitor::on_verification_result`] keyed by a correlation token.
//!
//! Timeouts are evaluated lazily against the injected [`Clock`] when the next
//! event arrives; nothing runs in the background.

pub mod buffer;
pub mod clock;
pub mod event;
pub mod lengths;
pub mod otp;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::alert::Alert;
use crate::policy::{PageContext, SurfacePolicy};
use crate::verifier::{VerificationOutcome, VerificationRequest, VerifierContext};

pub use buffer::{Candidate, RollingBuffer};
pub use clock::{Clock, ManualClock, ReplayTimeline, SystemClock};
pub use event::KeystrokeEvent;
pub use lengths::CandidateLengthSet;
pub use otp::{OtpProgress, OtpTracker, DEFAULT_OTP_DIGITS};

/// Default idle gap after which the rolling buffer starts over.
pub const DEFAULT_CLEAR_SECONDS: u64 = 10;

/// Default lifetime of an armed OTP tracker.
pub const DEFAULT_CLEAR_OTP_SECONDS: u64 = 60;

/// Default age after which an unanswered verifier request is forgotten.
///
/// Must exceed the verifier call timeout, otherwise a slow but valid match
/// would be discarded.
pub const DEFAULT_PENDING_TTL_SECONDS: u64 = 30;

/// Whether the user should be warned directly about a password match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    /// Unmanaged user: a match raises a password-reuse warning.
    #[default]
    Consumer,
    /// Pre-authorized managed user: matches are recorded but not warned about.
    Enterprise,
}

/// Everything the monitor needs from configuration for one epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Watched password lengths.
    pub lengths: CandidateLengthSet,
    /// Digits that make up a complete OTP.
    pub otp_required_digits: usize,
    /// Idle gap after which the rolling buffer is cleared.
    pub clear_after: Duration,
    /// How long an armed OTP tracker stays armed.
    pub otp_window: Duration,
    /// Warning behaviour on match.
    pub mode: MonitorMode,
    /// Age after which an unanswered verifier request is forgotten.
    pub pending_ttl: Duration,
}

impl MonitorSettings {
    /// Settings with default timings for the given watched lengths.
    pub fn with_lengths(lengths: impl IntoIterator<Item = usize>) -> Self {
        Self {
            lengths: CandidateLengthSet::new(lengths),
            ..Self::default()
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            lengths: CandidateLengthSet::default(),
            otp_required_digits: DEFAULT_OTP_DIGITS,
            clear_after: Duration::from_secs(DEFAULT_CLEAR_SECONDS),
            otp_window: Duration::from_secs(DEFAULT_CLEAR_OTP_SECONDS),
            mode: MonitorMode::default(),
            pending_ttl: Duration::from_secs(DEFAULT_PENDING_TTL_SECONDS),
        }
    }
}

/// Lifecycle state of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Not watching; every event is ignored.
    Stopped,
    /// Watching keystrokes.
    Running,
}

/// Side effect the host must perform on behalf of the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorAction {
    /// Ask the verifier whether the candidate matches a watched credential.
    Verify(VerificationRequest),
    /// Deliver an alert to the alert sink.
    Alert(Alert),
}

/// Running counters, useful for diagnostics. Never contains typed content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Events that passed validation.
    pub accepted: u64,
    /// Events dropped for lacking an origin view.
    pub dropped_synthetic: u64,
    /// Events dropped for a non-increasing timestamp.
    pub dropped_out_of_order: u64,
    /// Verifier requests issued.
    pub verifications_issued: u64,
    /// Verifier answers discarded as stale or unknown.
    pub stale_results: u64,
}

/// Per-page keystroke monitor.
pub struct KeystrokeMonitor {
    settings: MonitorSettings,
    state: MonitorState,
    page: PageContext,
    buffer: RollingBuffer,
    otp: OtpTracker,
    last_accepted: Option<u64>,
    /// Outstanding tokens with their issue time, oldest first.
    pending: VecDeque<(Uuid, Instant)>,
    clock: Arc<dyn Clock>,
    stats: MonitorStats,
}

impl std::fmt::Debug for KeystrokeMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystrokeMonitor")
            .field("state", &self.state)
            .field("page", &self.page)
            .field("buffer", &self.buffer)
            .field("otp", &self.otp)
            .field("pending", &self.pending.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl KeystrokeMonitor {
    /// Create a stopped monitor for `page`.
    pub fn new(settings: MonitorSettings, page: PageContext, clock: Arc<dyn Clock>) -> Self {
        let buffer = RollingBuffer::new(settings.clear_after);
        let otp = OtpTracker::new(settings.otp_required_digits, settings.otp_window);
        Self {
            settings,
            state: MonitorState::Stopped,
            page,
            buffer,
            otp,
            last_accepted: None,
            pending: VecDeque::new(),
            clock,
            stats: MonitorStats::default(),
        }
    }

    /// Replace the configuration wholesale.
    ///
    /// The buffer is cleared because characters typed under the previous
    /// length set must not be checked against the new one. An empty length
    /// set stops the monitor.
    pub fn configure(&mut self, settings: MonitorSettings) {
        self.buffer.reset();
        self.buffer.set_clear_after(settings.clear_after);
        if settings.otp_required_digits != self.settings.otp_required_digits
            || settings.otp_window != self.settings.otp_window
        {
            self.otp
                .reconfigure(settings.otp_required_digits, settings.otp_window);
        }
        self.settings = settings;

        if self.settings.lengths.is_empty() && self.state == MonitorState::Running {
            info!("watched length set is empty, stopping monitor");
            self.stop();
        }
    }

    /// Begin watching. Returns whether the monitor is now running.
    ///
    /// Refused when nothing is watched or the page is exempt under `policy`.
    pub fn start(&mut self, policy: &dyn SurfacePolicy) -> bool {
        if self.settings.lengths.is_empty() {
            debug!("not starting: no watched lengths");
            return false;
        }
        if policy.is_exempt(&self.page) {
            debug!(url = %self.page.url, "not starting: page is exempt");
            return false;
        }
        if self.state == MonitorState::Stopped {
            info!(url = %self.page.url, max_length = self.settings.lengths.max_length(), "monitor started");
        }
        self.state = MonitorState::Running;
        true
    }

    /// Stop watching and forget buffered input, OTP progress and in-flight
    /// verifier requests.
    pub fn stop(&mut self) {
        if self.state == MonitorState::Running {
            info!(url = %self.page.url, "monitor stopped");
        }
        self.state = MonitorState::Stopped;
        self.buffer.reset();
        self.otp.disarm();
        self.pending.clear();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Whether the monitor is running.
    pub fn is_running(&self) -> bool {
        self.state == MonitorState::Running
    }

    /// Active settings.
    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Page this monitor is attached to.
    pub fn page(&self) -> &PageContext {
        &self.page
    }

    /// Number of characters currently buffered.
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// OTP tracker state.
    pub fn otp(&self) -> &OtpTracker {
        &self.otp
    }

    /// Verifier requests still awaiting an answer.
    pub fn pending_verifications(&self) -> usize {
        self.pending.len()
    }

    /// Diagnostic counters.
    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// Process one keystroke.
    pub fn on_keystroke(&mut self, evt: &KeystrokeEvent) -> Vec<MonitorAction> {
        let mut actions = Vec::new();
        if self.state != MonitorState::Running {
            return actions;
        }

        if !evt.has_origin_view {
            self.stats.dropped_synthetic = self.stats.dropped_synthetic.saturating_add(1);
            trace!("dropped keystroke without origin view");
            return actions;
        }
        if self.last_accepted.is_some_and(|last| evt.timestamp <= last) {
            self.stats.dropped_out_of_order = self.stats.dropped_out_of_order.saturating_add(1);
            trace!("dropped keystroke with non-increasing timestamp");
            return actions;
        }
        self.last_accepted = Some(evt.timestamp);
        self.stats.accepted = self.stats.accepted.saturating_add(1);

        let now = self.clock.now();
        match self.otp.observe(evt, now) {
            OtpProgress::Completed => {
                info!(url = %self.page.url, "one-time passcode entry observed");
                actions.push(MonitorAction::Alert(Alert::OtpObserved {
                    page: self.page.clone(),
                    looks_like_login_page: self.page.looks_like_login_page,
                }));
            }
            OtpProgress::Expired => debug!("otp window elapsed"),
            OtpProgress::Broken => debug!("otp digit run broken"),
            OtpProgress::Inactive | OtpProgress::Ignored | OtpProgress::Counted(_) => {}
        }

        if evt.is_enter() {
            self.buffer.reset();
            return actions;
        }
        let Some(c) = evt.buffered_char() else {
            return actions;
        };

        let max_length = self.settings.lengths.max_length();
        self.buffer.append(c, now, max_length);

        // Lengths ascend, so the first one longer than the buffer ends the scan.
        let candidates: Vec<Candidate> = self
            .settings
            .lengths
            .iter()
            .map_while(|length| self.buffer.suffix(length))
            .collect();
        for candidate in candidates {
            actions.push(MonitorAction::Verify(self.issue(candidate)));
        }
        actions
    }

    /// Handle the verifier's answer for `token`.
    ///
    /// Answers are dropped when the monitor has stopped since the request was
    /// issued or the token is otherwise unknown.
    pub fn on_verification_result(
        &mut self,
        token: Uuid,
        outcome: VerificationOutcome,
    ) -> Vec<MonitorAction> {
        let mut actions = Vec::new();
        self.expire_pending(self.clock.now());
        let known = match self.pending.iter().position(|(pending, _)| *pending == token) {
            Some(index) => self.pending.remove(index).is_some(),
            None => false,
        };
        if !known || self.state != MonitorState::Running {
            self.stats.stale_results = self.stats.stale_results.saturating_add(1);
            debug!(%token, "ignoring stale verification result");
            return actions;
        }

        if outcome != VerificationOutcome::Match {
            return actions;
        }

        self.otp.arm(self.clock.now());
        info!(url = %self.page.url, mode = ?self.settings.mode, "watched credential typed on page");

        match self.settings.mode {
            MonitorMode::Consumer => actions.push(MonitorAction::Alert(Alert::PasswordMatch {
                page: self.page.clone(),
            })),
            MonitorMode::Enterprise => debug!("enterprise mode, suppressing reuse warning"),
        }
        if self.page.phishing_suspected() {
            actions.push(MonitorAction::Alert(Alert::PhishingSuspected {
                page: self.page.clone(),
            }));
        }
        actions
    }

    /// Forget requests older than the pending TTL. Every issued request is
    /// kept until answered or expired, however many keystrokes follow it.
    fn expire_pending(&mut self, now: Instant) {
        let ttl = self.settings.pending_ttl;
        while self
            .pending
            .front()
            .is_some_and(|(_, issued)| now.saturating_duration_since(*issued) > ttl)
        {
            if let Some((token, _)) = self.pending.pop_front() {
                debug!(%token, "verification request expired unanswered");
            }
        }
    }

    fn issue(&mut self, candidate: Candidate) -> VerificationRequest {
        let token = Uuid::new_v4();
        let now = self.clock.now();
        self.expire_pending(now);
        self.pending.push_back((token, now));
        self.stats.verifications_issued = self.stats.verifications_issued.saturating_add(1);
        trace!(%token, len = candidate.char_len(), "issuing candidate check");
        VerificationRequest {
            token,
            candidate,
            context: VerifierContext::from(&self.page),
        }
    }
}
