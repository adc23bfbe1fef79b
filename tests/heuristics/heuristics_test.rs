//! Login-page snippet scans and the domain whitelist.

use password_alert::heuristics::{
    is_whitelisted_domain, looks_like_login_page, looks_like_login_page_bounded,
};

fn list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn whitelist_matches_subdomains() {
    let suffixes = list(&["accounts.google.com"]);
    assert!(is_whitelisted_domain("login.accounts.google.com", &suffixes));
    assert!(is_whitelisted_domain("accounts.google.com", &suffixes));
}

#[test]
fn whitelist_rejects_lookalikes() {
    let suffixes = list(&["accounts.google.com"]);
    assert!(!is_whitelisted_domain("accounts.google.com.evil.com", &suffixes));
    assert!(!is_whitelisted_domain("evilaccounts.google.com", &suffixes));
    assert!(!is_whitelisted_domain("google.com", &suffixes));
}

#[test]
fn whitelist_ignores_empty_entries() {
    assert!(!is_whitelisted_domain("example.com", &list(&[""])));
    assert!(!is_whitelisted_domain("", &list(&["example.com"])));
    assert!(!is_whitelisted_domain("example.com", &[]));
}

#[test]
fn loose_scan_covers_whole_document() {
    let snippets = list(&["id=\"gaia_loginform\""]);
    let html = format!("{}<form id=\"gaia_loginform\">", "x".repeat(200_000));
    assert!(looks_like_login_page(&html, &snippets));
    assert!(!looks_like_login_page("<html></html>", &snippets));
}

#[test]
fn bounded_scan_stops_at_limit() {
    let snippets = list(&["Passwd"]);
    let late = format!("{}Passwd", "x".repeat(100_000));
    assert!(!looks_like_login_page_bounded(&late, &snippets, 100_000));

    let early = format!("{}Passwd", "x".repeat(99_994));
    assert!(looks_like_login_page_bounded(&early, &snippets, 100_000));
}

#[test]
fn empty_snippets_never_match() {
    assert!(!looks_like_login_page("anything", &list(&[""])));
    assert!(!looks_like_login_page("anything", &[]));
}
