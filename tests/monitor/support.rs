//! Shared fixtures for monitor tests.

use std::sync::Arc;

use password_alert::monitor::{
    KeystrokeEvent, KeystrokeMonitor, ManualClock, MonitorAction, MonitorSettings,
};
use password_alert::policy::{NoExemptions, PageContext};
use password_alert::verifier::VerificationRequest;

/// A running monitor plus the clock and event timestamp driving it.
pub struct Harness {
    pub monitor: KeystrokeMonitor,
    pub clock: ManualClock,
    pub next_ts: u64,
}

impl Harness {
    pub fn new(settings: MonitorSettings) -> Self {
        Self::with_page(settings, PageContext::unassessed("https://example.com/login", None))
    }

    pub fn with_page(settings: MonitorSettings, page: PageContext) -> Self {
        let clock = ManualClock::new();
        let mut monitor = KeystrokeMonitor::new(settings, page, Arc::new(clock.clone()));
        assert!(monitor.start(&NoExemptions));
        Self {
            monitor,
            clock,
            next_ts: 1,
        }
    }

    /// Press one key with a fresh, increasing timestamp.
    pub fn press(&mut self, char_code: u32) -> Vec<MonitorAction> {
        let evt = KeystrokeEvent::typed(char_code, self.next_ts);
        self.next_ts = self.next_ts.saturating_add(1);
        self.monitor.on_keystroke(&evt)
    }

    /// Type every character of `text`, collecting all actions.
    pub fn type_text(&mut self, text: &str) -> Vec<MonitorAction> {
        text.chars()
            .flat_map(|c| self.press(u32::from(c)))
            .collect()
    }
}

/// Verifier requests among `actions`.
pub fn requests(actions: &[MonitorAction]) -> Vec<VerificationRequest> {
    actions
        .iter()
        .filter_map(|action| match action {
            MonitorAction::Verify(request) => Some(request.clone()),
            MonitorAction::Alert(_) => None,
        })
        .collect()
}

/// Candidate texts among `actions`.
pub fn candidates(actions: &[MonitorAction]) -> Vec<String> {
    requests(actions)
        .iter()
        .map(|request| request.candidate.expose().to_owned())
        .collect()
}

/// Alerts among `actions`.
pub fn alerts(actions: &[MonitorAction]) -> Vec<password_alert::alert::Alert> {
    actions
        .iter()
        .filter_map(|action| match action {
            MonitorAction::Alert(alert) => Some(alert.clone()),
            MonitorAction::Verify(_) => None,
        })
        .collect()
}
