//! Monitoring alerts and the sink that receives them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use crate::policy::PageContext;

/// Something downstream action (banner, report, email) should know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// A watched credential was typed on the page.
    PasswordMatch {
        /// Page it was typed on.
        page: PageContext,
    },
    /// An OTP was entered after a password match.
    OtpObserved {
        /// Page it was typed on.
        page: PageContext,
        /// Whether the page passed the tight login heuristic.
        looks_like_login_page: bool,
    },
    /// The page imitates a login surface and is not whitelisted.
    PhishingSuspected {
        /// Suspect page.
        page: PageContext,
    },
}

impl Alert {
    /// Short machine-readable kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PasswordMatch { .. } => "password_match",
            Self::OtpObserved { .. } => "otp_observed",
            Self::PhishingSuspected { .. } => "phishing_suspected",
        }
    }

    /// Page the alert concerns.
    pub fn page(&self) -> &PageContext {
        match self {
            Self::PasswordMatch { page }
            | Self::OtpObserved { page, .. }
            | Self::PhishingSuspected { page } => page,
        }
    }
}

/// Alert delivery failures. Logged by the caller, never fatal.
#[derive(Debug, Error)]
pub enum AlertError {
    /// The sink could not deliver the alert.
    #[error("alert delivery failed: {0}")]
    Delivery(String),
}

/// Receiver of monitoring alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// A watched credential was typed.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError`] when the alert could not be delivered.
    async fn notify_password_match(&self, page: &PageContext) -> Result<(), AlertError>;

    /// An OTP was typed after a match.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError`] when the alert could not be delivered.
    async fn notify_otp_observed(
        &self,
        page: &PageContext,
        looks_like_login_page: bool,
    ) -> Result<(), AlertError>;

    /// The page looks like a phishing surface.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError`] when the alert could not be delivered.
    async fn notify_phishing_suspected(&self, page: &PageContext) -> Result<(), AlertError>;
}

/// Route `alert` to the matching sink method.
///
/// # Errors
///
/// Propagates the sink's [`AlertError`].
pub async fn deliver(sink: &dyn AlertSink, alert: &Alert) -> Result<(), AlertError> {
    match alert {
        Alert::PasswordMatch { page } => sink.notify_password_match(page).await,
        Alert::OtpObserved {
            page,
            looks_like_login_page,
        } => sink.notify_otp_observed(page, *looks_like_login_page).await,
        Alert::PhishingSuspected { page } => sink.notify_phishing_suspected(page).await,
    }
}

/// Sink that records alerts as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

impl TracingAlertSink {
    fn emit(kind: &str, page: &PageContext, looks_like_login_page: Option<bool>) {
        let at: DateTime<Utc> = Utc::now();
        warn!(
            alert = kind,
            url = %page.url,
            referrer = page.referrer.as_deref().unwrap_or(""),
            looks_like_login_page,
            at = %at.to_rfc3339(),
            "password alert"
        );
    }
}

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn notify_password_match(&self, page: &PageContext) -> Result<(), AlertError> {
        Self::emit("password_match", page, None);
        Ok(())
    }

    async fn notify_otp_observed(
        &self,
        page: &PageContext,
        looks_like_login_page: bool,
    ) -> Result<(), AlertError> {
        Self::emit("otp_observed", page, Some(looks_like_login_page));
        Ok(())
    }

    async fn notify_phishing_suspected(&self, page: &PageContext) -> Result<(), AlertError> {
        Self::emit("phishing_suspected", page, None);
        Ok(())
    }
}
