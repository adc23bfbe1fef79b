//! Password Alert — keystroke monitoring for credential reuse and phishing.
//!
//! Watches the characters typed into a page and asks an external verifier
//! whether any recent suffix of a watched length is a protected password.
//! Typed text is held only in a bounded in-memory buffer; the secret
//! comparison itself happens elsewhere. After a match, a short-lived tracker
//! watches for a one-time passcode being entered on the same page.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub mod heuristics;
pub mod monitor;
pub mod policy;

pub mod alert;
pub mod session;
pub mod verifier;
