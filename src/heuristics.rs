//! Page-content heuristics for spotting look-alike login surfaces.
//!
//! Plain substring scans over the rendered document plus a domain-suffix
//! whitelist check. These feed the phishing decision; they are not part of
//! the keystroke state machine.

/// Default number of leading characters scanned by the tight check.
pub const DEFAULT_TIGHT_SCAN_LIMIT: usize = 100_000;

/// Whether any non-empty snippet occurs anywhere in `html`.
pub fn looks_like_login_page(html: &str, snippets: &[String]) -> bool {
    snippets
        .iter()
        .filter(|snippet| !snippet.is_empty())
        .any(|snippet| html.contains(snippet.as_str()))
}

/// Like [`looks_like_login_page`], but only the first `limit` characters of
/// `html` are scanned.
pub fn looks_like_login_page_bounded(html: &str, snippets: &[String], limit: usize) -> bool {
    looks_like_login_page(prefix_chars(html, limit), snippets)
}

/// Whether `domain` equals one of `suffixes` or is a subdomain of one.
///
/// Matching is case-insensitive and respects label boundaries, so
/// `login.accounts.google.com` matches `accounts.google.com` while
/// `accounts.google.com.evil.com` and `evilaccounts.google.com` do not.
pub fn is_whitelisted_domain(domain: &str, suffixes: &[String]) -> bool {
    let domain = normalize_domain(domain);
    if domain.is_empty() {
        return false;
    }
    suffixes.iter().any(|suffix| {
        let suffix = normalize_domain(suffix);
        if suffix.is_empty() {
            return false;
        }
        match domain.strip_suffix(suffix.as_str()) {
            Some("") => true,
            Some(rest) => rest.ends_with('.'),
            None => false,
        }
    })
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Longest prefix of `text` holding at most `limit` characters.
fn prefix_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
