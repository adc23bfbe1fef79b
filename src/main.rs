//! `password-alert` CLI entry point.
//!
//! Provides `check-config`, `scan-page` and `replay` subcommands for
//! validating configuration, running the login-page heuristics against a
//! saved page, and replaying recorded keystrokes through a monitor session.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use password_alert::alert::TracingAlertSink;
use password_alert::config::Config;
use password_alert::logging;
use password_alert::monitor::{
    KeystrokeEvent, KeystrokeMonitor, ManualClock, MonitorSettings, ReplayTimeline,
};
use password_alert::policy::{ProtectionPolicy, SurfacePolicy};
use password_alert::session::MonitorSession;
use password_alert::verifier::HttpVerifier;

/// Password Alert: detect watched credentials typed into web pages.
#[derive(Parser)]
#[command(name = "password-alert", version, about)]
struct Cli {
    /// Config file (defaults to `$PASSWORD_ALERT_CONFIG` or `./password-alert.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Load the configuration and report what would be monitored.
    CheckConfig,
    /// Run the login-page heuristics against a saved HTML page.
    ScanPage {
        /// URL the page was served from.
        #[arg(long)]
        url: String,
        /// Saved HTML document.
        #[arg(long)]
        html: PathBuf,
    },
    /// Replay recorded keystrokes (JSON lines) through a monitor session.
    Replay {
        /// URL the keystrokes were typed on.
        #[arg(long)]
        url: String,
        /// Referring URL.
        #[arg(long)]
        referrer: Option<String>,
        /// Recorded events, one JSON object per line.
        #[arg(long)]
        events: PathBuf,
        /// Saved HTML document for the page, used by the heuristics.
        #[arg(long)]
        html: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if cli.config.is_some() {
        config.apply_overrides(|key| std::env::var(key).ok());
    }

    let _logging_guard = match &config.logging.dir {
        Some(dir) => Some(logging::init_production(dir, &config.logging.level)?),
        None => {
            logging::init_cli(&config.logging.level);
            None
        }
    };

    match cli.command {
        Command::CheckConfig => handle_check_config(&config),
        Command::ScanPage { url, html } => handle_scan_page(&config, &url, &html),
        Command::Replay {
            url,
            referrer,
            events,
            html,
        } => handle_replay(&config, &url, referrer, &events, html.as_deref()).await,
    }
}

/// Print the effective monitoring configuration.
fn handle_check_config(config: &Config) -> anyhow::Result<()> {
    let settings = MonitorSettings::from(&config.monitor);
    if settings.lengths.is_empty() {
        println!("monitoring disabled: no watched lengths configured");
    } else {
        let lengths: Vec<String> = settings.lengths.iter().map(|n| n.to_string()).collect();
        println!("watched lengths: {}", lengths.join(", "));
    }
    println!("otp digits: {}", settings.otp_required_digits);
    println!("buffer clears after: {:?}", settings.clear_after);
    println!("otp window: {:?}", settings.otp_window);
    println!("mode: {:?}", settings.mode);
    println!("whitelisted domains: {}", config.policy.whitelist_domains.len());

    HttpVerifier::new(&config.verifier.url, config.verifier.timeout())
        .with_context(|| format!("unusable verifier url {}", config.verifier.url))?;
    println!("verifier: {}", config.verifier.url);
    Ok(())
}

/// Run both login-page heuristics and the exemption check on a saved page.
fn handle_scan_page(config: &Config, url: &str, html_path: &Path) -> anyhow::Result<()> {
    let html = read_html(html_path)?;
    let policy = ProtectionPolicy::new(config.heuristics.clone(), config.policy.clone());
    let page = policy.assess(url, None, &html);

    println!("loose match: {}", policy.looks_like_login_page_loose(&html));
    println!("tight match: {}", page.looks_like_login_page);
    println!("whitelisted: {}", page.whitelisted);
    println!("exempt: {}", policy.is_exempt(&page));
    println!("phishing suspected: {}", page.phishing_suspected());
    Ok(())
}

/// Replay recorded keystrokes, advancing a manual clock by the recorded gaps.
async fn handle_replay(
    config: &Config,
    url: &str,
    referrer: Option<String>,
    events_path: &Path,
    html_path: Option<&Path>,
) -> anyhow::Result<()> {
    let events = read_events(events_path)?;
    let html = match html_path {
        Some(path) => read_html(path)?,
        None => String::new(),
    };

    let policy = Arc::new(ProtectionPolicy::new(
        config.heuristics.clone(),
        config.policy.clone(),
    ));
    let page = policy.assess(url, referrer, &html);
    let clock = ManualClock::new();
    let mut settings = MonitorSettings::from(&config.monitor);
    settings.pending_ttl = settings.pending_ttl.max(config.verifier.timeout());
    let monitor = KeystrokeMonitor::new(
        settings,
        page,
        Arc::new(clock.clone()),
    );
    let verifier = HttpVerifier::new(&config.verifier.url, config.verifier.timeout())
        .with_context(|| format!("unusable verifier url {}", config.verifier.url))?;

    let (handle, task) = MonitorSession::new(
        monitor,
        Arc::new(verifier),
        Arc::new(TracingAlertSink),
        policy,
    )
    .with_verify_timeout(config.verifier.timeout())
    .spawn();

    handle.start().await?;
    let mut timeline = ReplayTimeline::new(clock);
    for event in events {
        timeline.observe(event.timestamp);
        handle.keystroke(event).await?;
        handle.settle().await?;
    }
    handle.shutdown().await?;

    let report = task.await.context("replay session panicked")?;
    info!(
        accepted = report.stats.accepted,
        verifications = report.stats.verifications_issued,
        "replay finished"
    );
    println!("events accepted: {}", report.stats.accepted);
    println!(
        "events dropped: {}",
        report
            .stats
            .dropped_synthetic
            .saturating_add(report.stats.dropped_out_of_order)
    );
    println!("candidate checks: {}", report.stats.verifications_issued);
    println!("verifier failures: {}", report.verifier_failures);
    println!("alerts: {}", report.alerts_delivered);
    Ok(())
}

fn read_html(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Parse JSON-lines keystroke events. Blank lines are skipped; malformed lines
/// are logged and skipped.
fn read_events(path: &Path) -> anyhow::Result<Vec<KeystrokeEvent>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut events = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<KeystrokeEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => warn!(line = index.saturating_add(1), error = %e, "skipping malformed event"),
        }
    }
    Ok(events)
}
