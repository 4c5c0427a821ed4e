//! Process wiring: constructs C1–C4 in leaf order, runs the accept loop,
//! and drives the shutdown sequence in reverse order.
//!
//! Split into [`bind`] / [`serve`] / [`run`] so integration tests can bind
//! an ephemeral port, read back the real one, and request shutdown directly
//! through a shared flag instead of raising a process-wide OS signal.

use crate::client;
use crate::config::BourseConfig;
use crate::connection_registry::ConnectionRegistry;
use crate::exchange::Exchange;
use crate::ledger::AccountLedger;
use crate::metrics::ExchangeMetrics;
use crate::session::SessionRegistry;
use anyhow::Context;
use signal_hook::consts::SIGHUP;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

/// Process-wide context handed to every client session thread.
pub struct ServerContext {
    pub ledger: Arc<AccountLedger>,
    pub sessions: Arc<SessionRegistry>,
    pub connections: Arc<ConnectionRegistry>,
    pub exchange: Arc<Exchange>,
    pub metrics: Arc<ExchangeMetrics>,
}

/// Binds the listen socket. Separate from [`serve`] so a caller (or a test)
/// can read back the bound address — e.g. after binding port 0 — before
/// handing the listener off.
pub fn bind(config: &BourseConfig) -> anyhow::Result<TcpListener> {
    TcpListener::bind(("0.0.0.0", config.port))
        .with_context(|| format!("failed to bind port {}", config.port))
}

/// Builds C1–C4, accepts connections on `listener` until `shutdown_requested`
/// flips (or a fatal accept error sets it), then tears the process down in
/// C3 → C4 → C2 → C1 order — the reverse of construction.
pub fn serve(
    listener: TcpListener,
    config: &BourseConfig,
    shutdown_requested: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let metrics = Arc::new(ExchangeMetrics::new());
    let ledger = Arc::new(AccountLedger::new(config.max_accounts));
    let sessions = Arc::new(SessionRegistry::new(config.max_sessions));
    let connections = Arc::new(ConnectionRegistry::new());
    let exchange = Exchange::new(Arc::clone(&sessions), Arc::clone(&metrics));
    let matcher = Arc::clone(&exchange).run_matcher();

    let ctx = Arc::new(ServerContext {
        ledger,
        sessions: Arc::clone(&sessions),
        connections: Arc::clone(&connections),
        exchange: Arc::clone(&exchange),
        metrics: Arc::clone(&metrics),
    });

    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "bourse listening");

    // `TcpListener::accept` has no cross-thread wakeup of its own; once the
    // flag flips (from a signal handler, a test, or this function itself on
    // a fatal accept error below) this thread connects to the listener
    // purely to unblock the pending `accept()` call.
    let watcher_flag = Arc::clone(&shutdown_requested);
    let watcher = thread::spawn(move || {
        while !watcher_flag.load(Ordering::Acquire) {
            thread::sleep(Duration::from_millis(20));
        }
        let _ = TcpStream::connect(local_addr);
    });

    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                if shutdown_requested.load(Ordering::Acquire) {
                    drop(stream);
                    break;
                }
                let conn_ctx = Arc::clone(&ctx);
                thread::spawn(move || client::handle_connection(stream, conn_ctx));
            }
            Err(e) => {
                error!(error = %e, "accept failed, shutting down");
                shutdown_requested.store(true, Ordering::Release);
                break;
            }
        }
    }

    let _ = watcher.join();

    info!("shutdown: closing client connections");
    connections.shutdown_all();
    connections.wait_for_empty();

    info!("shutdown: draining exchange");
    exchange.shutdown(matcher);

    info!(metrics = %metrics.snapshot(), "final metrics");
    Ok(())
}

/// Binds, installs the SIGHUP handler, and serves until that signal fires.
/// This is what `main` calls; tests use [`bind`]/[`serve`] directly with
/// their own shutdown flag instead.
pub fn run(config: BourseConfig) -> anyhow::Result<()> {
    let listener = bind(&config)?;

    let shutdown_requested = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGHUP, Arc::clone(&shutdown_requested))
        .context("failed to install SIGHUP handler")?;

    serve(listener, &config, shutdown_requested)
}
