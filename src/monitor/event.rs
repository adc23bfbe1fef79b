//! Keystroke events as delivered by the page's input layer.

use serde::{Deserialize, Serialize};

/// Character code carried by events with no distinguishable character.
pub const NO_CHAR: u32 = 0;

/// Character code of the Enter key.
pub const ENTER: u32 = 13;

/// Codes at or below this value are non-printable (controls and space).
const LAST_NON_PRINTABLE: u32 = 0x20;

/// A single keystroke observed on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystrokeEvent {
    /// Character code of the key, or [`NO_CHAR`] for pure modifiers.
    pub char_code: u32,
    /// Host monotonic event time. Must strictly increase across accepted events.
    pub timestamp: u64,
    /// Whether the event is attached to a view. Script-dispatched events are not.
    pub has_origin_view: bool,
}

impl KeystrokeEvent {
    /// A genuine user keystroke.
    pub fn typed(char_code: u32, timestamp: u64) -> Self {
        Self {
            char_code,
            timestamp,
            has_origin_view: true,
        }
    }

    /// Convenience constructor for a typed character.
    pub fn from_char(c: char, timestamp: u64) -> Self {
        Self::typed(u32::from(c), timestamp)
    }

    /// True for ASCII `0`..=`9`.
    pub fn is_digit(&self) -> bool {
        (0x30..=0x39).contains(&self.char_code)
    }

    /// True for codes above space.
    pub fn is_printable(&self) -> bool {
        self.char_code > LAST_NON_PRINTABLE
    }

    /// True for the Enter key.
    pub fn is_enter(&self) -> bool {
        self.char_code == ENTER
    }

    /// The character this event contributes to the rolling buffer, if any.
    ///
    /// Pure modifiers and codes that are not Unicode scalar values contribute
    /// nothing.
    pub fn buffered_char(&self) -> Option<char> {
        if self.char_code == NO_CHAR {
            return None;
        }
        char::from_u32(self.char_code)
    }
}
