//! Candidate verification: the request/response pair exchanged with the
//! external credential verifier.
//!
//! The monitor never compares secrets itself. It emits a
//! [`VerificationRequest`] tagged with a correlation token, the host runs a
//! [`Verifier`], and the answer is fed back as a [`VerificationOutcome`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{Host, Url};
use uuid::Uuid;

use crate::monitor::Candidate;
use crate::policy::PageContext;

/// Page details sent alongside a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierContext {
    /// URL of the page the candidate was typed on.
    pub page_url: String,
    /// Referring URL, when known.
    pub referrer: Option<String>,
}

impl From<&PageContext> for VerifierContext {
    fn from(page: &PageContext) -> Self {
        Self {
            page_url: page.url.clone(),
            referrer: page.referrer.clone(),
        }
    }
}

/// A candidate check issued by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    /// Correlation token; echo it back with the outcome.
    pub token: Uuid,
    /// Suffix of the rolling buffer of a watched length.
    pub candidate: Candidate,
    /// Where it was typed.
    pub context: VerifierContext,
}

/// Answer to a [`VerificationRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The candidate is a watched credential.
    Match,
    /// The candidate is not a watched credential.
    NoMatch,
    /// The verifier failed or did not answer in time. Treated as no match.
    Unavailable,
}

impl From<Result<bool, VerifierError>> for VerificationOutcome {
    fn from(result: Result<bool, VerifierError>) -> Self {
        match result {
            Ok(true) => Self::Match,
            Ok(false) => Self::NoMatch,
            Err(_) => Self::Unavailable,
        }
    }
}

/// Verifier failures. None of these are fatal to monitoring.
#[derive(Debug, Error)]
pub enum VerifierError {
    /// Verifier endpoint is unusable.
    #[error("invalid verifier endpoint: {0}")]
    InvalidEndpoint(String),
    /// Transport failure talking to the verifier.
    #[error("verifier request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Verifier answered with a non-success status.
    #[error("verifier returned status {0}")]
    Status(u16),
    /// Verifier did not answer in time.
    #[error("verifier timed out after {0:?}")]
    Timeout(Duration),
    /// Verifier is not reachable at all.
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

/// External capability that knows whether a candidate is a watched credential.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Check one candidate.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError`] when no answer can be produced; the caller
    /// treats that as "no match".
    async fn check_candidate(
        &self,
        candidate: &Candidate,
        context: &VerifierContext,
    ) -> Result<bool, VerifierError>;
}

#[derive(Serialize)]
struct CheckBody<'a> {
    candidate: &'a str,
    page_url: &'a str,
    referrer: Option<&'a str>,
}

#[derive(Deserialize)]
struct CheckReply {
    is_match: bool,
}

/// Verifier backed by a local HTTP service.
///
/// Candidates are POSTed as JSON to an endpoint that must resolve to the
/// local machine; anything else is rejected at construction.
#[derive(Debug, Clone)]
pub struct HttpVerifier {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpVerifier {
    /// Create a verifier posting to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::InvalidEndpoint`] if the URL does not parse or
    /// does not point at a loopback host.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, VerifierError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| VerifierError::InvalidEndpoint(e.to_string()))?;
        if !is_loopback(&endpoint) {
            return Err(VerifierError::InvalidEndpoint(format!(
                "{endpoint} is not a loopback address"
            )));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    /// Endpoint requests are sent to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn send_error(&self, e: reqwest::Error) -> VerifierError {
        if e.is_connect() {
            VerifierError::Unavailable(format!("{}: {e}", self.endpoint))
        } else if e.is_timeout() {
            VerifierError::Timeout(self.timeout)
        } else {
            VerifierError::Transport(e)
        }
    }
}

#[async_trait]
impl Verifier for HttpVerifier {
    async fn check_candidate(
        &self,
        candidate: &Candidate,
        context: &VerifierContext,
    ) -> Result<bool, VerifierError> {
        let body = CheckBody {
            candidate: candidate.expose(),
            page_url: &context.page_url,
            referrer: context.referrer.as_deref(),
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(VerifierError::Status(status.as_u16()));
        }
        let reply: CheckReply = response.json().await?;
        Ok(reply.is_match)
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(addr)) => addr.is_loopback(),
        Some(Host::Ipv6(addr)) => addr.is_loopback(),
        None => false,
    }
}
