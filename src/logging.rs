//! Logging setup
//!
//! `tracing` output goes to stdout, non-blocking, with the format switchable
//! between a human-readable layer (default) and JSON (`--log-json`, for
//! shipping to a log aggregator in production).

use crate::config::BourseConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the global `tracing` subscriber.
///
/// Returns a [`WorkerGuard`] that must be kept alive for the lifetime of the
/// process — dropping it flushes and tears down the non-blocking writer.
pub fn init_logging(config: &BourseConfig) -> WorkerGuard {
    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.log_json {
        let layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(non_blocking);
        registry.with(layer).init();
    } else {
        let layer = fmt::layer().with_target(true).with_writer(non_blocking);
        registry.with(layer).init();
    }

    guard
}
