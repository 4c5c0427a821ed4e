//! Runtime configuration for the exchange process
//!
//! Unlike the multi-asset/multi-symbol configuration a broader trading
//! platform would load from CSV, this system trades a single fungible
//! instrument, so there is nothing to load from disk: the whole
//! configuration surface is the handful of knobs the CLI accepts.

/// Complete server configuration, built once in `main` and handed by
/// reference to every subsystem constructor.
#[derive(Debug, Clone)]
pub struct BourseConfig {
    /// TCP port to listen on.
    pub port: u16,
    /// Per-process cap on distinct accounts the ledger will create (C1).
    pub max_accounts: usize,
    /// Per-process cap on concurrently registered sessions (C2).
    pub max_sessions: usize,
    /// `tracing` filter directive, e.g. "info" or "bourse::exchange=debug".
    pub log_level: String,
    /// Emit structured JSON logs instead of human-readable text.
    pub log_json: bool,
}

impl Default for BourseConfig {
    fn default() -> Self {
        Self {
            port: 9000,
            max_accounts: 10_000,
            max_sessions: 10_000,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}
