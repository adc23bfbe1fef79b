//! Start/stop and configuration transitions.

use std::sync::Arc;

use password_alert::config::{HeuristicsConfig, PolicyConfig};
use password_alert::monitor::{
    KeystrokeEvent, KeystrokeMonitor, ManualClock, MonitorSettings, MonitorState,
};
use password_alert::policy::{NoExemptions, PageContext, ProtectionPolicy};

use crate::support::{candidates, Harness};

fn stopped_monitor(settings: MonitorSettings, url: &str) -> KeystrokeMonitor {
    KeystrokeMonitor::new(
        settings,
        PageContext::unassessed(url, None),
        Arc::new(ManualClock::new()),
    )
}

#[test]
fn new_monitor_is_stopped_and_inert() {
    let mut monitor = stopped_monitor(MonitorSettings::with_lengths([1]), "https://a.test/");
    assert_eq!(monitor.state(), MonitorState::Stopped);
    assert!(monitor
        .on_keystroke(&KeystrokeEvent::from_char('a', 1))
        .is_empty());
    assert_eq!(monitor.buffer_len(), 0);
}

#[test]
fn empty_length_set_refuses_to_start() {
    let mut monitor = stopped_monitor(MonitorSettings::with_lengths(std::iter::empty()), "https://a.test/");
    assert!(!monitor.start(&NoExemptions));
    assert_eq!(monitor.state(), MonitorState::Stopped);
}

#[test]
fn exempt_page_refuses_to_start() {
    let policy = ProtectionPolicy::new(HeuristicsConfig::default(), PolicyConfig::default());
    let page = policy.assess("https://accounts.google.com/signin", None, "");
    let mut monitor = KeystrokeMonitor::new(
        MonitorSettings::with_lengths([8]),
        page,
        Arc::new(ManualClock::new()),
    );
    assert!(!monitor.start(&policy));
}

#[test]
fn stop_discards_buffer_and_ignores_further_input() {
    let mut h = Harness::new(MonitorSettings::with_lengths([4]));
    h.type_text("abc");
    h.monitor.stop();
    assert_eq!(h.monitor.buffer_len(), 0);

    let actions = h.type_text("defg");
    assert!(actions.is_empty());
    assert_eq!(h.monitor.buffer_len(), 0);
    assert_eq!(h.monitor.pending_verifications(), 0);
}

#[test]
fn emptying_lengths_stops_running_monitor() {
    let mut h = Harness::new(MonitorSettings::with_lengths([4]));
    h.monitor.configure(MonitorSettings::with_lengths(std::iter::empty()));
    assert_eq!(h.monitor.state(), MonitorState::Stopped);
}

#[test]
fn reconfigure_replaces_lengths_and_clears_buffer() {
    let mut h = Harness::new(MonitorSettings::with_lengths([4]));
    h.type_text("abc");
    h.monitor.configure(MonitorSettings::with_lengths([2]));
    assert_eq!(h.monitor.buffer_len(), 0);
    assert!(h.monitor.is_running());

    let actions = h.type_text("xy");
    assert_eq!(candidates(&actions), vec!["xy".to_owned()]);
}
