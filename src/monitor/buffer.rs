//! Bounded buffer of recently typed characters.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// A suffix of the rolling buffer submitted for verification.
///
/// The `Debug` impl prints the length only, so candidates can travel through
/// structured logs without leaking what was typed.
#[derive(Clone, PartialEq, Eq)]
pub struct Candidate(String);

impl Candidate {
    #[cfg(test)]
    pub(crate) fn for_tests(text: &str) -> Self {
        Self(text.to_owned())
    }

    /// The typed text. Hand it to a verifier and drop it.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Number of characters in the candidate.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("len", &self.char_len())
            .finish()
    }
}

/// Ordered, bounded sequence of typed characters.
///
/// Never holds more than the largest watched length. A typing burst that
/// starts more than `clear_after` after the previous character begins from an
/// empty buffer.
pub struct RollingBuffer {
    chars: VecDeque<char>,
    last_update: Option<Instant>,
    clear_after: Duration,
}

impl fmt::Debug for RollingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollingBuffer")
            .field("len", &self.chars.len())
            .field("last_update", &self.last_update)
            .field("clear_after", &self.clear_after)
            .finish()
    }
}

impl RollingBuffer {
    /// Create an empty buffer that goes stale after `clear_after`.
    pub fn new(clear_after: Duration) -> Self {
        Self {
            chars: VecDeque::new(),
            last_update: None,
            clear_after,
        }
    }

    /// Change the staleness window. Existing content is kept.
    pub fn set_clear_after(&mut self, clear_after: Duration) {
        self.clear_after = clear_after;
    }

    /// Drop everything typed so far.
    pub fn reset(&mut self) {
        self.chars.clear();
    }

    /// Append `c` typed at `now`, keeping at most `max_len` newest characters.
    pub fn append(&mut self, c: char, now: Instant, max_len: usize) {
        if let Some(last) = self.last_update {
            if now.saturating_duration_since(last) > self.clear_after {
                self.reset();
            }
        }
        self.chars.push_back(c);
        while self.chars.len() > max_len {
            self.chars.pop_front();
        }
        self.last_update = Some(now);
    }

    /// The last `k` characters, or `None` when fewer than `k` are buffered.
    pub fn suffix(&self, k: usize) -> Option<Candidate> {
        let skip = self.chars.len().checked_sub(k)?;
        Some(Candidate(self.chars.iter().skip(skip).collect()))
    }

    /// Number of buffered characters.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}
