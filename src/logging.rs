//! Logging setup
//!
//! Text or JSON output on stdout, filtered by the configured level unless
//! `RUST_LOG` is set.

use crate::config::LogConfig;
use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of log records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Map a configured level onto a tracing filter directive.
///
/// Accepts `debug`, `info`, `warning` (or `warn`) and `error`, case
/// insensitive. Returns `None` for anything else.
pub fn parse_level(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warning" | "warn" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

/// Map a configured format name. Returns `None` for unknown formats.
pub fn parse_format(format: &str) -> Option<LogFormat> {
    match format.trim().to_ascii_lowercase().as_str() {
        "text" => Some(LogFormat::Text),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

/// Initialize the global subscriber from configuration.
///
/// Unknown levels fall back to `info` and unknown formats to `text`; both
/// are reported once the subscriber is installed.
///
/// # Errors
///
/// Returns error if the filter cannot be built or a global subscriber is
/// already installed
///
/// # Examples
///
/// ```no_run
/// use loginapp::config::LogConfig;
/// use loginapp::logging::init_logging;
///
/// let config = LogConfig {
///     level: "debug".to_string(),
///     format: "json".to_string(),
/// };
/// init_logging(&config).unwrap();
/// ```
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let level = parse_level(&config.level);
    let format = parse_format(&config.format);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or("info")))?;
    let registry = tracing_subscriber::registry().with(env_filter);

    match format.unwrap_or(LogFormat::Text) {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true);
            registry.with(layer).try_init()?;
        }
        LogFormat::Text => {
            let layer = fmt::layer().with_target(true).with_level(true);
            registry.with(layer).try_init()?;
        }
    }

    if level.is_none() {
        tracing::warn!("Unknown log level '{}', using info", config.level);
    }
    if format.is_none() {
        tracing::warn!("Unknown log format '{}', using text", config.format);
    }

    Ok(())
}

/// Subscriber used before the configuration is known.
///
/// Scoped with [`tracing::subscriber::with_default`] while loading the
/// configuration, so warnings emitted during loading are not lost.
pub fn bootstrap_subscriber(verbose: bool) -> impl tracing::Subscriber + Send + Sync {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_target(false)
        .finish()
}
