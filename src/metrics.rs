//! In-process exchange metrics
//!
//! Plain atomic counters, logged at shutdown — there is no metrics
//! transport wired up (the corpus's own `perf.rs` is likewise in-process
//! and dumped at the end of a run rather than pushed to a collector).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters updated by C2/C4/C5 as requests are processed.
#[derive(Default)]
pub struct ExchangeMetrics {
    logins: AtomicU64,
    orders_posted: AtomicU64,
    orders_canceled: AtomicU64,
    trades_executed: AtomicU64,
    active_sessions: AtomicU64,
}

impl ExchangeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_login(&self) {
        self.logins.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_logout(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_order_posted(&self) {
        self.orders_posted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_order_canceled(&self) {
        self.orders_canceled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_trade(&self) {
        self.trades_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            logins: self.logins.load(Ordering::Relaxed),
            orders_posted: self.orders_posted.load(Ordering::Relaxed),
            orders_canceled: self.orders_canceled.load(Ordering::Relaxed),
            trades_executed: self.trades_executed.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub logins: u64,
    pub orders_posted: u64,
    pub orders_canceled: u64,
    pub trades_executed: u64,
    pub active_sessions: u64,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "logins={} orders_posted={} orders_canceled={} trades_executed={} active_sessions={}",
            self.logins, self.orders_posted, self.orders_canceled, self.trades_executed, self.active_sessions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_lifecycle() {
        let m = ExchangeMetrics::new();
        m.record_login();
        m.record_order_posted();
        m.record_order_posted();
        m.record_trade();
        m.record_order_canceled();
        m.record_logout();

        let snap = m.snapshot();
        assert_eq!(snap.logins, 1);
        assert_eq!(snap.orders_posted, 2);
        assert_eq!(snap.orders_canceled, 1);
        assert_eq!(snap.trades_executed, 1);
        assert_eq!(snap.active_sessions, 0);
    }
}
