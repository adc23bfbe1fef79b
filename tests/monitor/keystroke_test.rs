//! Rolling buffer and candidate extraction through the monitor.

use std::time::Duration;

use password_alert::monitor::event::{ENTER, NO_CHAR};
use password_alert::monitor::{KeystrokeEvent, MonitorSettings};

use crate::support::{candidates, requests, Harness};

#[test]
fn buffer_never_exceeds_largest_watched_length() {
    let mut h = Harness::new(MonitorSettings::with_lengths([3, 5]));
    for (i, c) in "the quick brown fox jumps over the lazy dog".chars().enumerate() {
        h.press(u32::from(c));
        assert!(h.monitor.buffer_len() <= 5, "overflow after {i} keys");
    }
    assert_eq!(h.monitor.buffer_len(), 5);
}

#[test]
fn enter_empties_buffer_without_checks() {
    let mut h = Harness::new(MonitorSettings::with_lengths([4]));
    h.type_text("abcd");
    assert_eq!(h.monitor.buffer_len(), 4);

    let actions = h.press(ENTER);
    assert!(requests(&actions).is_empty());
    assert_eq!(h.monitor.buffer_len(), 0);
}

#[test]
fn idle_gap_starts_a_new_burst() {
    let mut h = Harness::new(MonitorSettings::with_lengths([5]));
    let before = h.type_text("abc");
    assert!(candidates(&before).is_empty());

    h.clock.advance(Duration::from_secs(11));
    let after = h.type_text("de");

    assert!(!candidates(&after).iter().any(|c| c == "abcde"));
    assert_eq!(h.monitor.buffer_len(), 2);
}

#[test]
fn short_pause_keeps_the_burst() {
    let mut h = Harness::new(MonitorSettings::with_lengths([5]));
    h.type_text("abc");
    h.clock.advance(Duration::from_secs(9));
    let after = h.type_text("de");
    assert_eq!(candidates(&after), vec!["abcde".to_owned()]);
}

#[test]
fn every_watched_suffix_is_checked() {
    let mut h = Harness::new(MonitorSettings::with_lengths([4, 6]));
    h.type_text("xx123");
    let actions = h.press(u32::from('4'));

    assert_eq!(
        candidates(&actions),
        vec!["1234".to_owned(), "xx1234".to_owned()]
    );
}

#[test]
fn maximum_length_is_checked_on_its_own() {
    let mut h = Harness::new(MonitorSettings::with_lengths([8]));
    let actions = h.type_text("password");
    assert_eq!(candidates(&actions), vec!["password".to_owned()]);
}

#[test]
fn lengths_longer_than_buffer_are_skipped() {
    let mut h = Harness::new(MonitorSettings::with_lengths([2, 10]));
    let actions = h.type_text("abc");
    assert_eq!(candidates(&actions), vec!["ab".to_owned(), "bc".to_owned()]);
}

#[test]
fn stale_timestamp_is_dropped() {
    let mut h = Harness::new(MonitorSettings::with_lengths([2]));
    let first = h.monitor.on_keystroke(&KeystrokeEvent::from_char('a', 100));
    assert!(first.is_empty());

    for ts in [100, 99] {
        let replay = h.monitor.on_keystroke(&KeystrokeEvent::from_char('b', ts));
        assert!(replay.is_empty());
        assert_eq!(h.monitor.buffer_len(), 1);
    }
    assert_eq!(h.monitor.stats().dropped_out_of_order, 2);

    let fresh = h.monitor.on_keystroke(&KeystrokeEvent::from_char('b', 101));
    assert_eq!(candidates(&fresh), vec!["ab".to_owned()]);
}

#[test]
fn synthetic_events_are_ignored() {
    let mut h = Harness::new(MonitorSettings::with_lengths([1]));
    let forged = KeystrokeEvent {
        char_code: u32::from('x'),
        timestamp: 5,
        has_origin_view: false,
    };
    assert!(h.monitor.on_keystroke(&forged).is_empty());
    assert_eq!(h.monitor.buffer_len(), 0);
    assert_eq!(h.monitor.stats().dropped_synthetic, 1);

    // A dropped event does not advance the ordering watermark.
    let genuine = h.monitor.on_keystroke(&KeystrokeEvent::from_char('y', 5));
    assert_eq!(candidates(&genuine), vec!["y".to_owned()]);
}

#[test]
fn modifier_keys_do_not_enter_buffer() {
    let mut h = Harness::new(MonitorSettings::with_lengths([2]));
    h.press(u32::from('a'));
    let actions = h.press(NO_CHAR);
    assert!(actions.is_empty());
    assert_eq!(h.monitor.buffer_len(), 1);
}

#[test]
fn spaces_are_part_of_candidates() {
    let mut h = Harness::new(MonitorSettings::with_lengths([3]));
    let actions = h.type_text("a b");
    assert_eq!(candidates(&actions), vec!["a b".to_owned()]);
}

#[test]
fn requests_carry_page_context() {
    let mut h = Harness::new(MonitorSettings::with_lengths([1]));
    let actions = h.press(u32::from('z'));
    let request = requests(&actions).into_iter().next();
    let Some(request) = request else {
        panic!("expected a verification request");
    };
    assert_eq!(request.context.page_url, "https://example.com/login");
    assert_eq!(request.context.referrer, None);
}
