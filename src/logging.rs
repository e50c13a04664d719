//! # Structured Logging
//!
//! Environment-aware tracing initialization for the broker core. Console
//! output by default; JSON output when `LIBSHARE_LOG_FORMAT=json` for log
//! shippers. Level defaults follow the environment and can always be
//! overridden with `RUST_LOG`.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process. Safe to call from tests
/// and embedders; a subscriber installed elsewhere is left in place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_log_level(&environment)));

        let json_output = std::env::var("LIBSHARE_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let subscriber = tracing_subscriber::registry();
        let result = if json_output {
            subscriber
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_ansi(false)
                        .with_filter(filter),
                )
                .try_init()
        } else {
            subscriber
                .with(fmt::layer().with_target(true).with_filter(filter))
                .try_init()
        };

        if result.is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(environment = %environment, json = json_output, "Structured logging initialized");
        }
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("LIBSHARE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn default_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
