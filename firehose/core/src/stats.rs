//! Stream counters
//!
//! Lock-free counters shared by a client and every connection it installs.
//! This is the observability hook for things the consumer never sees:
//! dropped lines and background reconnects.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for a client
#[derive(Debug, Default)]
pub struct StreamStats {
    connections_opened: AtomicU64,
    records_delivered: AtomicU64,
    heartbeats: AtomicU64,
    malformed_lines: AtomicU64,
    reconnect_attempts: AtomicU64,
    reconnect_failures: AtomicU64,
}

/// Point-in-time copy of [`StreamStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Successful handshakes (initial and reconnects)
    pub connections_opened: u64,
    /// Records pushed onto the output queue
    pub records_delivered: u64,
    /// Blank keep-alive lines received
    pub heartbeats: u64,
    /// Lines dropped because they did not decode
    pub malformed_lines: u64,
    /// Reconnect handshakes started by read loops
    pub reconnect_attempts: u64,
    /// Reconnects that failed (transport error or non-2xx)
    pub reconnect_failures: u64,
}

impl StreamStats {
    pub(crate) fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.records_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn heartbeat(&self) {
        self.heartbeats.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn malformed_line(&self) {
        self.malformed_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reconnect_failure(&self) {
        self.reconnect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            malformed_lines: self.malformed_lines.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            reconnect_failures: self.reconnect_failures.load(Ordering::Relaxed),
        }
    }
}
