//! Page context and the exemption decision that gates monitoring.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{HeuristicsConfig, PolicyConfig};
use crate::heuristics::{
    is_whitelisted_domain, looks_like_login_page, looks_like_login_page_bounded,
};

/// What the monitor knows about the page it is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    /// Page URL.
    pub url: String,
    /// Referring URL, when known.
    pub referrer: Option<String>,
    /// Result of the tight login-page heuristic.
    pub looks_like_login_page: bool,
    /// Whether the page's host is on the domain whitelist.
    pub whitelisted: bool,
}

impl PageContext {
    /// Context for a page that has not been assessed.
    pub fn unassessed(url: impl Into<String>, referrer: Option<String>) -> Self {
        Self {
            url: url.into(),
            referrer,
            looks_like_login_page: false,
            whitelisted: false,
        }
    }

    /// Host component of the page URL, if it parses.
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_owned))
    }

    /// A login look-alike served from a domain that is not whitelisted.
    pub fn phishing_suspected(&self) -> bool {
        self.looks_like_login_page && !self.whitelisted
    }
}

/// Decides whether a page is a safe login surface that must not be monitored.
pub trait SurfacePolicy: Send + Sync {
    /// True when monitoring must stay off for `page`.
    fn is_exempt(&self, page: &PageContext) -> bool;
}

/// Policy that never exempts anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExemptions;

impl SurfacePolicy for NoExemptions {
    fn is_exempt(&self, _page: &PageContext) -> bool {
        false
    }
}

/// Configuration-driven page assessment and exemption policy.
#[derive(Debug, Clone, Default)]
pub struct ProtectionPolicy {
    heuristics: HeuristicsConfig,
    policy: PolicyConfig,
}

impl ProtectionPolicy {
    /// Build from the `[heuristics]` and `[policy]` config sections.
    pub fn new(heuristics: HeuristicsConfig, policy: PolicyConfig) -> Self {
        Self { heuristics, policy }
    }

    /// Assess a page from its URL and rendered HTML.
    pub fn assess(&self, url: &str, referrer: Option<String>, html: &str) -> PageContext {
        let mut page = PageContext::unassessed(url, referrer);
        page.looks_like_login_page = looks_like_login_page_bounded(
            html,
            &self.heuristics.tight_login_snippets,
            self.heuristics.tight_scan_limit,
        );
        page.whitelisted = page
            .host()
            .is_some_and(|host| is_whitelisted_domain(&host, &self.policy.whitelist_domains));
        tracing::debug!(
            url = %page.url,
            looks_like_login_page = page.looks_like_login_page,
            whitelisted = page.whitelisted,
            "page assessed"
        );
        page
    }

    /// Loose heuristic over the whole document.
    pub fn looks_like_login_page_loose(&self, html: &str) -> bool {
        looks_like_login_page(html, &self.heuristics.login_snippets)
    }
}

impl SurfacePolicy for ProtectionPolicy {
    fn is_exempt(&self, page: &PageContext) -> bool {
        let prefixed = self
            .policy
            .exempt_url_prefixes
            .iter()
            .filter(|prefix| !prefix.is_empty())
            .any(|prefix| page.url.starts_with(prefix.as_str()));
        prefixed || page.whitelisted
    }
}
