//! One-time-passcode tracking after a verified password match.
//!
//! Once armed, the tracker counts consecutive digits typed within the OTP
//! window. Anything that breaks the run of digits disarms it.

use std::time::{Duration, Instant};

use super::event::KeystrokeEvent;

/// Default number of digits in a one-time passcode.
pub const DEFAULT_OTP_DIGITS: usize = 6;

/// What a keystroke did to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpProgress {
    /// Tracker was not armed.
    Inactive,
    /// Keystroke did not affect the count (non-printable before any digit).
    Ignored,
    /// A digit was counted; carries the running total.
    Counted(usize),
    /// The OTP window had elapsed; tracker disarmed.
    Expired,
    /// The run of digits was broken; tracker disarmed.
    Broken,
    /// The required number of digits was reached; tracker disarmed.
    Completed,
}

/// Digit-count state machine armed after a password match.
#[derive(Debug, Clone)]
pub struct OtpTracker {
    active: bool,
    armed_at: Option<Instant>,
    digit_count: usize,
    required_digits: usize,
    window: Duration,
}

impl OtpTracker {
    /// Create a disarmed tracker. A `required_digits` of zero falls back to
    /// [`DEFAULT_OTP_DIGITS`].
    pub fn new(required_digits: usize, window: Duration) -> Self {
        Self {
            active: false,
            armed_at: None,
            digit_count: 0,
            required_digits: normalize_digits(required_digits),
            window,
        }
    }

    /// Replace the digit requirement and window. Disarms the tracker.
    pub fn reconfigure(&mut self, required_digits: usize, window: Duration) {
        self.required_digits = normalize_digits(required_digits);
        self.window = window;
        self.disarm();
    }

    /// Start watching for an OTP at `now`, discarding any previous count.
    pub fn arm(&mut self, now: Instant) {
        self.active = true;
        self.armed_at = Some(now);
        self.digit_count = 0;
    }

    /// Stop watching and forget the count.
    pub fn disarm(&mut self) {
        self.active = false;
        self.armed_at = None;
        self.digit_count = 0;
    }

    /// Whether the tracker is currently armed.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Digits counted since arming.
    pub fn digit_count(&self) -> usize {
        self.digit_count
    }

    /// Digits needed to consider an OTP entered.
    pub fn required_digits(&self) -> usize {
        self.required_digits
    }

    /// Feed one accepted keystroke observed at `now`.
    pub fn observe(&mut self, evt: &KeystrokeEvent, now: Instant) -> OtpProgress {
        if !self.active {
            return OtpProgress::Inactive;
        }

        let expired = self
            .armed_at
            .map_or(true, |armed| now.saturating_duration_since(armed) >= self.window);
        if expired {
            self.disarm();
            return OtpProgress::Expired;
        }

        if evt.is_digit() {
            self.digit_count = self.digit_count.saturating_add(1);
        } else if evt.is_printable() || self.digit_count > 0 {
            self.disarm();
            return OtpProgress::Broken;
        } else {
            return OtpProgress::Ignored;
        }

        if self.digit_count >= self.required_digits {
            self.disarm();
            return OtpProgress::Completed;
        }
        OtpProgress::Counted(self.digit_count)
    }
}

fn normalize_digits(required_digits: usize) -> usize {
    if required_digits == 0 {
        DEFAULT_OTP_DIGITS
    } else {
        required_digits
    }
}
