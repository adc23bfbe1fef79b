//! Monotonic time sources for timeout decisions.
//!
//! Timeouts in the monitor are evaluated lazily on the next keystroke, so the
//! clock is only ever read, never waited on.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Supplies monotonic timestamps.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same underlying instant, so a host can hand one clone to
/// a monitor and keep another to advance time while replaying recorded input.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<Instant>>,
}

impl ManualClock {
    /// Create a clock frozen at the current real instant.
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = current.checked_add(by) {
            *current = next;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drives a [`ManualClock`] from recorded event timestamps in milliseconds.
///
/// The clock moves forward by the gap to the latest timestamp seen so far.
/// Timestamps at or behind that watermark leave the clock where it is.
#[derive(Debug, Clone)]
pub struct ReplayTimeline {
    clock: ManualClock,
    latest_ms: Option<u64>,
}

impl ReplayTimeline {
    /// Follow recorded time on `clock`.
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            latest_ms: None,
        }
    }

    /// Account for an event recorded at `timestamp_ms`, returning how far the
    /// clock moved.
    pub fn observe(&mut self, timestamp_ms: u64) -> Duration {
        let gap = self
            .latest_ms
            .and_then(|latest| timestamp_ms.checked_sub(latest))
            .map_or(Duration::ZERO, Duration::from_millis);
        self.clock.advance(gap);
        self.latest_ms = Some(self.latest_ms.map_or(timestamp_ms, |l| l.max(timestamp_ms)));
        gap
    }
}
