//! Tests for configuration loading, defaults and env overrides.

use std::io::Write;
use std::time::Duration;

use password_alert::config::Config;
use password_alert::monitor::{MonitorMode, MonitorSettings, DEFAULT_OTP_DIGITS};

#[test]
fn parse_complete_config() {
    let toml_content = r#"
[monitor]
watched_lengths = [12, 8, 0]
otp_required_digits = 8
clear_seconds = 5
clear_otp_seconds = 30
pending_ttl_seconds = 45
mode = "enterprise"

[heuristics]
login_snippets = ["type=\"password\""]
tight_login_snippets = ["gaia_loginform"]
tight_scan_limit = 5000

[policy]
whitelist_domains = ["corp.example.com"]
exempt_url_prefixes = ["https://sso.corp.example.com/"]

[verifier]
url = "http://127.0.0.1:9000/verify"
timeout_ms = 750

[logging]
level = "debug"
dir = "/var/log/password-alert"
"#;

    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("password-alert.toml");
    let mut f = std::fs::File::create(&config_path).expect("create file");
    f.write_all(toml_content.as_bytes()).expect("write");

    let config = Config::load_from(&config_path).expect("parse config");

    assert_eq!(config.monitor.watched_lengths, vec![12, 8, 0]);
    assert_eq!(config.monitor.mode, MonitorMode::Enterprise);
    assert_eq!(config.heuristics.tight_scan_limit, 5000);
    assert_eq!(config.policy.whitelist_domains, vec!["corp.example.com"]);
    assert_eq!(config.verifier.timeout(), Duration::from_millis(750));
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.dir.is_some());

    let settings = MonitorSettings::from(&config.monitor);
    assert_eq!(settings.lengths.iter().collect::<Vec<_>>(), vec![8, 12]);
    assert_eq!(settings.otp_required_digits, 8);
    assert_eq!(settings.clear_after, Duration::from_secs(5));
    assert_eq!(settings.otp_window, Duration::from_secs(30));
    assert_eq!(settings.pending_ttl, Duration::from_secs(45));
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::load_from(&dir.path().join("absent.toml")).expect("defaults");

    assert!(config.monitor.watched_lengths.is_empty());
    assert_eq!(config.monitor.otp_required_digits, DEFAULT_OTP_DIGITS);
    assert_eq!(config.monitor.clear_seconds, 10);
    assert_eq!(config.monitor.clear_otp_seconds, 60);
    assert_eq!(config.heuristics.tight_scan_limit, 100_000);
    assert!(MonitorSettings::from(&config.monitor).lengths.is_empty());
}

#[test]
fn partial_config_keeps_other_defaults() {
    let config = Config::from_toml("[monitor]\nwatched_lengths = [10]\n").expect("parse");
    assert_eq!(config.monitor.watched_lengths, vec![10]);
    assert_eq!(config.monitor.mode, MonitorMode::Consumer);
    assert_eq!(config.verifier.timeout_ms, 2_000);
}

#[test]
fn invalid_toml_returns_error() {
    assert!(Config::from_toml("[monitor\nwatched_lengths = 3").is_err());
    assert!(Config::from_toml("[monitor]\nwatched_lengths = \"eight\"").is_err());
}

#[test]
fn zero_otp_digits_falls_back_to_default() {
    let config = Config::from_toml("[monitor]\notp_required_digits = 0\n").expect("parse");
    let settings = MonitorSettings::from(&config.monitor);
    assert_eq!(settings.otp_required_digits, DEFAULT_OTP_DIGITS);
}

#[test]
fn env_overrides_config_values() {
    let mut config = Config::default();
    config.apply_overrides(|key| match key {
        "PASSWORD_ALERT_WATCHED_LENGTHS" => Some("9, 14".to_owned()),
        "PASSWORD_ALERT_OTP_DIGITS" => Some("8".to_owned()),
        "PASSWORD_ALERT_CLEAR_SECONDS" => Some("20".to_owned()),
        "PASSWORD_ALERT_MODE" => Some("Enterprise".to_owned()),
        "PASSWORD_ALERT_VERIFIER_URL" => Some("http://localhost:1234/".to_owned()),
        _ => None,
    });

    assert_eq!(config.monitor.watched_lengths, vec![9, 14]);
    assert_eq!(config.monitor.otp_required_digits, 8);
    assert_eq!(config.monitor.clear_seconds, 20);
    assert_eq!(config.monitor.mode, MonitorMode::Enterprise);
    assert_eq!(config.verifier.url, "http://localhost:1234/");
}

#[test]
fn invalid_env_values_are_ignored() {
    let mut config = Config::default();
    config.monitor.watched_lengths = vec![8];
    config.apply_overrides(|key| match key {
        "PASSWORD_ALERT_WATCHED_LENGTHS" => Some("8,abc".to_owned()),
        "PASSWORD_ALERT_OTP_DIGITS" => Some("six".to_owned()),
        "PASSWORD_ALERT_MODE" => Some("paranoid".to_owned()),
        _ => None,
    });

    assert_eq!(config.monitor.watched_lengths, vec![8]);
    assert_eq!(config.monitor.otp_required_digits, DEFAULT_OTP_DIGITS);
    assert_eq!(config.monitor.mode, MonitorMode::Consumer);
}
