//! Logging initialization for the module host
//!
//! - Respects the RUST_LOG environment variable (always takes precedence)
//! - Falls back to the filter from [`LoggingConfig`], then to "info"
//! - Optional JSON output behind the `json-logging` feature
//!
//! # Usage
//! ```rust
//! use modhost::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "info"
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Build the filter: RUST_LOG, then the configured filter, then "info".
fn build_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or("info"))
}

/// Initialize human-readable logging
///
/// Returns `false` if a global subscriber was already installed (for example
/// by a host application or another test), in which case nothing changes.
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g. "info", "modhost::module=debug").
///   If None, uses RUST_LOG or defaults to "info"
pub fn init_logging(filter: Option<&str>) -> bool {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(build_filter(filter))
        .try_init()
        .is_ok()
}

/// Initialize logging with JSON output (for production/monitoring)
///
/// Includes target, current span and span list for log aggregation systems.
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) -> bool {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(build_filter(filter))
        .try_init()
        .is_ok()
}

/// Initialize logging from [`LoggingConfig`]
///
/// Without the `json-logging` feature a JSON request falls back to
/// human-readable output.
pub fn init_logging_from_config(config: Option<&LoggingConfig>) -> bool {
    let filter = config.and_then(|c| c.filter.as_deref());

    if config.map(|c| c.json_format).unwrap_or(false) {
        #[cfg(feature = "json-logging")]
        {
            return init_json_logging(filter);
        }
        #[cfg(not(feature = "json-logging"))]
        {
            return init_logging(filter);
        }
    }

    init_logging(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_initialization_is_harmless() {
        // Whichever call wins, the other must not panic
        let first = init_logging(Some("debug"));
        let second = init_logging_from_config(Some(&LoggingConfig::default()));
        assert!(!(first && second));
    }
}
