//! # Operator Logging
//!
//! `tally` prints results on stdout (identifiers, sealed payloads, opened
//! JSON) and everything else on stderr, so the output can be piped into
//! another tool without scrubbing.
//!
//! What shows up at the default `info` level:
//!
//! - `tally_protocol` commits: one event per create, update and delete,
//!   with `kind` and a shortened `identifier`.
//! - `tally_protocol` warnings: rejected party signatures and exhausted
//!   card allocation budgets.
//! - `tally_contracts`: contract status changes, at `debug`.
//! - `tally`: config and store setup.
//!
//! Secrets never reach a log line, whatever the level.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive used when neither `RUST_LOG` nor `--log-level` parse.
const FALLBACK_DIRECTIVE: &str = "info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines for a terminal.
    Pretty,
    /// One JSON object per event, for shipping to an aggregator.
    Json,
}

/// `RUST_LOG` wins; then `default_level`; then plain `info`.
fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_DIRECTIVE))
}

/// Install the global subscriber. Call once, before the engine opens.
///
/// `default_level` is an `EnvFilter` directive such as
/// `tally=info,tally_protocol=debug`. To trace a single record kind's
/// commits while debugging:
///
/// ```text
/// RUST_LOG=tally_protocol::engine=debug tally tx update ...
/// ```
pub fn init_logging(default_level: &str, format: LogFormat) {
    let filter = build_filter(default_level);

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_file(false),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(false),
                )
                .init();
        }
    }

    tracing::debug!(?format, "logging ready");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!(LogFormat::from_str("JSON", true).unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("pretty", true).unwrap(), LogFormat::Pretty);
        assert!(LogFormat::from_str("xml", true).is_err());
    }

    #[test]
    fn default_directive_applies_without_rust_log() {
        // Only meaningful when the test runner has no RUST_LOG of its own.
        if std::env::var_os("RUST_LOG").is_none() {
            let filter = build_filter("tally=debug");
            assert_eq!(filter.to_string(), "tally=debug");
        }
    }
}
