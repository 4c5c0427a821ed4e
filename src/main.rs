//! `bourse` — a continuous double-auction exchange for a single fungible
//! instrument.
//!
//! This binary only parses arguments, sets up logging, and hands off to
//! [`bourse::server::run`], which owns the accept loop and the shutdown
//! sequence. All of the concurrent state machinery lives in the library.

use bourse::config::BourseConfig;
use bourse::logging;
use bourse::server;
use clap::Parser;
use std::process::ExitCode;

/// A multi-client continuous double-auction exchange for a single
/// instrument.
#[derive(Debug, Parser)]
#[command(name = "bourse", version = env!("GIT_HASH"))]
struct Cli {
    /// TCP port to listen on.
    #[arg(short = 'p', long)]
    port: u16,

    /// Per-process cap on distinct accounts the ledger will create.
    #[arg(long, default_value_t = 10_000)]
    max_accounts: usize,

    /// Per-process cap on concurrently registered sessions.
    #[arg(long, default_value_t = 10_000)]
    max_sessions: usize,

    /// `tracing` filter directive, e.g. "info" or "bourse::exchange=debug".
    /// Overridden by the `RUST_LOG` environment variable if set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit structured JSON logs instead of human-readable text.
    #[arg(long)]
    log_json: bool,
}

impl From<Cli> for BourseConfig {
    fn from(cli: Cli) -> Self {
        Self {
            port: cli.port,
            max_accounts: cli.max_accounts,
            max_sessions: cli.max_sessions,
            log_level: cli.log_level,
            log_json: cli.log_json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = BourseConfig::from(cli);
    let _log_guard = logging::init_logging(&config);

    match server::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "bourse exited with an error");
            ExitCode::FAILURE
        }
    }
}
