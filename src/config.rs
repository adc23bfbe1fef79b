//! Configuration loading.
//!
//! Loads settings from `./password-alert.toml` (or `$PASSWORD_ALERT_CONFIG`).
//! Environment variables override file values; file values override defaults.
//! A missing file is not an error: defaults watch nothing, so the monitor
//! simply stays stopped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::heuristics::DEFAULT_TIGHT_SCAN_LIMIT;
use crate::monitor::{
    CandidateLengthSet, MonitorMode, MonitorSettings, DEFAULT_CLEAR_OTP_SECONDS,
    DEFAULT_CLEAR_SECONDS, DEFAULT_OTP_DIGITS, DEFAULT_PENDING_TTL_SECONDS,
};

/// Config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "password-alert.toml";

/// Env var naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "PASSWORD_ALERT_CONFIG";

// ── Top-level config ────────────────────────────────────────────

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Keystroke monitor settings (`[monitor]`).
    pub monitor: MonitorConfig,
    /// Login-page heuristics (`[heuristics]`).
    pub heuristics: HeuristicsConfig,
    /// Exemptions and whitelist (`[policy]`).
    pub policy: PolicyConfig,
    /// Verifier endpoint (`[verifier]`).
    pub verifier: VerifierConfig,
    /// Log output (`[logging]`).
    pub logging: LoggingConfig,
}

impl Config {
    /// Load with precedence: env vars > TOML file > defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific file without env overrides. Missing files yield
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("invalid config at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            )),
        }
    }

    /// Parse a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML or mistyped fields.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }

    /// Resolve the config path using a custom env resolver.
    pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function so tests need not mutate the process
    /// environment. Unparseable values are ignored with a warning.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("PASSWORD_ALERT_WATCHED_LENGTHS") {
            match parse_lengths(&v) {
                Some(lengths) => self.monitor.watched_lengths = lengths,
                None => warn_invalid("PASSWORD_ALERT_WATCHED_LENGTHS", &v),
            }
        }
        override_parsed(
            &env,
            "PASSWORD_ALERT_OTP_DIGITS",
            &mut self.monitor.otp_required_digits,
        );
        override_parsed(
            &env,
            "PASSWORD_ALERT_CLEAR_SECONDS",
            &mut self.monitor.clear_seconds,
        );
        override_parsed(
            &env,
            "PASSWORD_ALERT_CLEAR_OTP_SECONDS",
            &mut self.monitor.clear_otp_seconds,
        );
        if let Some(v) = env("PASSWORD_ALERT_MODE") {
            match v.trim().to_ascii_lowercase().as_str() {
                "consumer" => self.monitor.mode = MonitorMode::Consumer,
                "enterprise" => self.monitor.mode = MonitorMode::Enterprise,
                _ => warn_invalid("PASSWORD_ALERT_MODE", &v),
            }
        }
        if let Some(v) = env("PASSWORD_ALERT_VERIFIER_URL") {
            self.verifier.url = v;
        }
        override_parsed(
            &env,
            "PASSWORD_ALERT_VERIFIER_TIMEOUT_MS",
            &mut self.verifier.timeout_ms,
        );
        if let Some(v) = env("PASSWORD_ALERT_LOG_LEVEL") {
            self.logging.level = v;
        }
    }
}

fn override_parsed<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    target: &mut T,
) {
    if let Some(v) = env(key) {
        match v.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn_invalid(key, &v),
        }
    }
}

fn warn_invalid(key: &'static str, value: &str) {
    tracing::warn!(var = key, value = %value, "ignoring invalid env override");
}

/// Parse a comma-separated list of lengths, e.g. `"8, 12,16"`.
fn parse_lengths(raw: &str) -> Option<Vec<usize>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse().ok())
        .collect()
}

// ── Monitor config ──────────────────────────────────────────────

/// Keystroke monitor settings (`[monitor]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Lengths of the watched credentials. Empty disables monitoring.
    pub watched_lengths: Vec<usize>,
    /// Digits in a one-time passcode.
    pub otp_required_digits: usize,
    /// Idle seconds after which typed characters are forgotten.
    pub clear_seconds: u64,
    /// Seconds an armed OTP tracker stays armed.
    pub clear_otp_seconds: u64,
    /// Whether matches warn the user directly.
    pub mode: MonitorMode,
    /// Seconds an unanswered verifier request is remembered.
    pub pending_ttl_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            watched_lengths: Vec::new(),
            otp_required_digits: DEFAULT_OTP_DIGITS,
            clear_seconds: DEFAULT_CLEAR_SECONDS,
            clear_otp_seconds: DEFAULT_CLEAR_OTP_SECONDS,
            mode: MonitorMode::default(),
            pending_ttl_seconds: DEFAULT_PENDING_TTL_SECONDS,
        }
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        let otp_required_digits = if config.otp_required_digits == 0 {
            DEFAULT_OTP_DIGITS
        } else {
            config.otp_required_digits
        };
        Self {
            lengths: CandidateLengthSet::new(config.watched_lengths.iter().copied()),
            otp_required_digits,
            clear_after: Duration::from_secs(config.clear_seconds),
            otp_window: Duration::from_secs(config.clear_otp_seconds),
            mode: config.mode,
            pending_ttl: Duration::from_secs(config.pending_ttl_seconds),
        }
    }
}

// ── Heuristics config ───────────────────────────────────────────

/// Login-page detection snippets (`[heuristics]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    /// Snippets for the loose whole-document scan.
    pub login_snippets: Vec<String>,
    /// Snippets for the tight, bounded scan.
    pub tight_login_snippets: Vec<String>,
    /// Characters scanned by the tight check.
    pub tight_scan_limit: usize,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            login_snippets: vec![
                "type=\"password\"".to_owned(),
                "name=\"Passwd\"".to_owned(),
            ],
            tight_login_snippets: vec![
                "action=\"https://accounts.google.com/ServiceLoginAuth\"".to_owned(),
                "<input id=\"Passwd\" name=\"Passwd\" type=\"password\"".to_owned(),
            ],
            tight_scan_limit: DEFAULT_TIGHT_SCAN_LIMIT,
        }
    }
}

// ── Policy config ───────────────────────────────────────────────

/// Exemptions (`[policy]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Domains (and their subdomains) where typing the credential is expected.
    pub whitelist_domains: Vec<String>,
    /// URL prefixes of the real login surfaces; never monitored.
    pub exempt_url_prefixes: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            whitelist_domains: vec!["accounts.google.com".to_owned()],
            exempt_url_prefixes: vec!["https://accounts.google.com/".to_owned()],
        }
    }
}

// ── Verifier config ─────────────────────────────────────────────

/// Verifier endpoint (`[verifier]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Loopback URL of the verification service.
    pub url: String,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
}

impl VerifierConfig {
    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8750/check".to_owned(),
            timeout_ms: 2_000,
        }
    }
}

// ── Logging config ──────────────────────────────────────────────

/// Log output (`[logging]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for rotated JSON logs; stderr only when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            dir: None,
        }
    }
}
