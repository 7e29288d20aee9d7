//! Error types for the session client.

use thiserror::Error;

use pxnet_transport_traits::{ConnectionState, TransportError};

/// A specialized `Result` type for connector operations.
pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;

/// Errors surfaced synchronously to callers of the [`Connector`](crate::Connector).
///
/// Transient failures inside the reconnect loop never appear here; they are
/// reported through `Reconnecting`/`Disconnected` notifications instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectorError {
    /// A caller-supplied argument was rejected.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument {
        /// Name of the offending argument
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The operation is not valid in the connector's current state.
    #[error("invalid state: expected {expected}, connector is {actual}")]
    InvalidState {
        /// State the operation requires
        expected: ConnectionState,
        /// State observed when the operation was attempted
        actual: ConnectionState,
    },

    /// The transport failed while serving the call.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The connector was configured with invalid parameters.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ConnectorError {
    pub(crate) fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

impl From<ProtocolError> for ConnectorError {
    fn from(err: ProtocolError) -> Self {
        Self::Transport(err.into())
    }
}

/// Wire-level protocol violations found while decoding the stream.
///
/// Inside the reconnect loop these only ever count as one failed attempt
/// (handshake) or end the session (framing).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The handshake line carried fewer than two space-separated tokens.
    #[error("handshake line has no delimiter token")]
    MissingDelimiter,

    /// The handshake announced an empty delimiter.
    #[error("handshake announced an empty delimiter")]
    EmptyDelimiter,

    /// No CR LF arrived within the handshake size bound.
    #[error("handshake line exceeds {max} bytes without a CR LF terminator")]
    HandshakeTooLong {
        /// Configured bound in bytes
        max: usize,
    },

    /// A buffered message grew past the message size bound.
    #[error("buffered message of {size} bytes exceeds the {max} byte limit")]
    MessageTooLong {
        /// Bytes buffered without a delimiter
        size: usize,
        /// Configured bound in bytes
        max: usize,
    },

    /// An I/O error reported through the codec interface.
    #[error("I/O error while decoding: {0}")]
    Io(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<ProtocolError> for TransportError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::MessageTooLong { size, max } => Self::ResponseTooLarge { size, max },
            ProtocolError::Io(msg) => Self::Io(msg),
            other => Self::ProtocolError(other.to_string()),
        }
    }
}

/// A state change that would skip or reverse the connection lifecycle.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("illegal state transition {from} -> {to}")]
pub struct InvalidTransition {
    /// State before the rejected transition
    pub from: ConnectionState,
    /// Requested state
    pub to: ConnectionState,
}
