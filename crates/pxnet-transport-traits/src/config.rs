//! Transport configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bound on a buffered handshake line (64 KiB).
pub const DEFAULT_MAX_HANDSHAKE_SIZE: usize = 64 * 1024;

/// Default bound on a single buffered message and on an outgoing frame (1 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Configuration for handshake, message and send size limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum number of bytes buffered while waiting for the handshake line terminator.
    pub max_handshake_size: usize,

    /// Maximum size of a buffered, not yet delimited incoming message.
    /// `None` = unlimited
    pub max_message_size: Option<usize>,

    /// Maximum size of an outgoing frame (payload plus delimiter).
    /// `None` = unlimited
    pub max_send_size: Option<usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_handshake_size: DEFAULT_MAX_HANDSHAKE_SIZE,
            max_message_size: Some(DEFAULT_MAX_MESSAGE_SIZE),
            max_send_size: Some(DEFAULT_MAX_MESSAGE_SIZE),
        }
    }
}

impl LimitsConfig {
    /// Create a configuration with no message or send limits.
    ///
    /// The handshake bound stays in place: a peer that never sends a line
    /// terminator must not grow the buffer without bound.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_handshake_size: DEFAULT_MAX_HANDSHAKE_SIZE,
            max_message_size: None,
            max_send_size: None,
        }
    }

    /// Create a configuration with strict limits for untrusted servers.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            max_handshake_size: 4 * 1024,
            max_message_size: Some(256 * 1024), // 256KB
            max_send_size: Some(256 * 1024),
        }
    }
}

/// Configuration for connect, handshake, read and write timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Transport open (TCP connect) timeout.
    pub connect: Duration,

    /// Bound on receiving the complete handshake line.
    /// `None` = no timeout
    pub handshake: Option<Duration>,

    /// Idle bound on a single read of an established session.
    /// `None` = no timeout
    pub read: Option<Duration>,

    /// Bound on a single send write.
    /// `None` = no timeout
    pub write: Option<Duration>,

    /// How long `disconnect` waits for the worker before aborting it.
    pub shutdown: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            handshake: Some(Duration::from_secs(30)),
            read: None,
            write: Some(Duration::from_secs(30)),
            shutdown: Duration::from_secs(5),
        }
    }
}

impl TimeoutConfig {
    /// Create a configuration with short timeouts for local or test peers.
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            connect: Duration::from_secs(2),
            handshake: Some(Duration::from_secs(2)),
            read: None,
            write: Some(Duration::from_secs(2)),
            shutdown: Duration::from_secs(1),
        }
    }

    /// Create a configuration with no handshake, read or write timeouts.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            connect: Duration::from_secs(30),
            handshake: None,
            read: None,
            write: None,
            shutdown: Duration::from_secs(5),
        }
    }

    /// Create a configuration with long timeouts for slow links.
    #[must_use]
    pub const fn patient() -> Self {
        Self {
            connect: Duration::from_secs(60),
            handshake: Some(Duration::from_secs(120)), // 2 minutes
            read: None,
            write: Some(Duration::from_secs(120)),
            shutdown: Duration::from_secs(10),
        }
    }
}
