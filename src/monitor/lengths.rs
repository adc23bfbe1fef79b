//! Watched password lengths for the current configuration epoch.

use std::collections::BTreeSet;

/// Set of password lengths currently being watched.
///
/// Immutable once built; a configuration change replaces the whole set.
/// Zero is never a member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateLengthSet {
    watched: BTreeSet<usize>,
}

impl CandidateLengthSet {
    /// Build a set from raw lengths, discarding zeros and duplicates.
    pub fn new(lengths: impl IntoIterator<Item = usize>) -> Self {
        Self {
            watched: lengths.into_iter().filter(|&n| n > 0).collect(),
        }
    }

    /// Whether a password of length `n` is being watched.
    pub fn is_watched(&self, n: usize) -> bool {
        self.watched.contains(&n)
    }

    /// Largest watched length, or 0 when nothing is watched.
    pub fn max_length(&self) -> usize {
        self.watched.last().copied().unwrap_or(0)
    }

    /// True when no length is watched; monitoring must be disabled.
    pub fn is_empty(&self) -> bool {
        self.watched.is_empty()
    }

    /// Watched lengths in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.watched.iter().copied()
    }
}
