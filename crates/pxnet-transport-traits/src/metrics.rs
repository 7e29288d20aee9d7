//! Connector metrics types.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A serializable snapshot of a connector's traffic and attempt counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorMetrics {
    /// Total number of bytes written.
    pub bytes_sent: u64,

    /// Total number of bytes read, handshake included.
    pub bytes_received: u64,

    /// Total number of messages sent.
    pub messages_sent: u64,

    /// Total number of decoded messages received.
    pub messages_received: u64,

    /// Total number of reconnect attempts.
    pub attempts: u64,

    /// Total number of failed reconnect attempts.
    pub failed_attempts: u64,

    /// Total number of sessions established by a successful handshake.
    pub sessions: u64,

    /// Sessions currently established (0 or 1 for a single connector).
    pub active_sessions: u64,
}

/// A lock-free, atomic structure for metrics updates from the worker and callers.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    /// Total bytes sent (atomic counter).
    pub bytes_sent: AtomicU64,

    /// Total bytes received (atomic counter).
    pub bytes_received: AtomicU64,

    /// Total messages sent (atomic counter).
    pub messages_sent: AtomicU64,

    /// Total messages received (atomic counter).
    pub messages_received: AtomicU64,

    /// Total reconnect attempts (atomic counter).
    pub attempts: AtomicU64,

    /// Failed reconnect attempts (atomic counter).
    pub failed_attempts: AtomicU64,

    /// Established sessions (atomic counter).
    pub sessions: AtomicU64,

    /// Currently established sessions (atomic gauge).
    pub active_sessions: AtomicU64,
}

impl AtomicMetrics {
    /// Creates a new `AtomicMetrics` instance with all counters initialized to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one sent frame of `bytes` bytes.
    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Records `bytes` bytes read from the stream.
    pub fn record_read(&self, bytes: usize) {
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Records a session becoming established.
    pub fn session_opened(&self) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an established session ending. Saturates at zero.
    pub fn session_closed(&self) {
        let _ = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Creates a serializable `ConnectorMetrics` snapshot from the current atomic values.
    pub fn snapshot(&self) -> ConnectorMetrics {
        ConnectorMetrics {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            sessions: self.sessions.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
        }
    }

    /// Resets all atomic metric counters to zero.
    pub fn reset(&self) {
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
        self.messages_sent.store(0, Ordering::Relaxed);
        self.messages_received.store(0, Ordering::Relaxed);
        self.attempts.store(0, Ordering::Relaxed);
        self.failed_attempts.store(0, Ordering::Relaxed);
        self.sessions.store(0, Ordering::Relaxed);
        self.active_sessions.store(0, Ordering::Relaxed);
    }
}
