//! Core transport types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lowest port accepted by `Connector::connect`.
///
/// Port 0 means "any port" to the OS and cannot be dialed.
pub const MIN_PORT: u16 = 1;

/// Enumerates the kinds of byte-stream transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    /// TCP sockets for network communication.
    Tcp,
    /// An in-process stream, used by tests and embedders.
    Memory,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Represents the current state of a session connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConnectionState {
    /// No worker is running and no session is established.
    Disconnected = 0,
    /// A reconnect attempt (open + handshake) is in progress.
    Connecting = 1,
    /// The handshake succeeded and messages are being framed.
    Connected = 2,
}

impl ConnectionState {
    /// Returns `true` if the state machine allows moving from `self` to `next`.
    ///
    /// Legal moves are Disconnected→Connecting, Connecting→Connecting (next
    /// attempt), Connecting→Connected, Connecting→Disconnected (budget
    /// exhausted or stopped) and Connected→Disconnected.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Connecting)
                | (Self::Connecting, Self::Connected)
                | (Self::Connecting, Self::Disconnected)
                | (Self::Connected, Self::Disconnected)
        )
    }

    /// Decodes the `repr(u8)` discriminant; unknown values map to `Disconnected`.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}
