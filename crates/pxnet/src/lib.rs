//! # pxnet
//!
//! A resilient client for session-oriented, delimiter-framed byte streams.
//!
//! The server opens every connection with one CR LF terminated line,
//! `<session-id> <delimiter>`. Every later message is terminated by that
//! delimiter, and messages may be split arbitrarily across reads.
//!
//! ## Components
//!
//! - [`ConnectionStateMachine`]: `Disconnected` → `Connecting` → `Connected`
//! - [`HandshakeCodec`] / [`Session`]: the handshake line
//! - [`DelimiterCodec`]: message framing, seeded with handshake leftovers
//! - [`EventDispatcher`]: fan-out of [`ConnectorEvent`]s
//! - [`Connector`]: `connect` / `send` / `disconnect`, backed by a worker
//!   that retries open + handshake up to [`ReconnectConfig::max_attempts`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pxnet::{Connector, ConnectorEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connector = Connector::tcp();
//!     connector.add_handler(std::sync::Arc::new(|event: &ConnectorEvent| {
//!         if let ConnectorEvent::Message { text } = event {
//!             println!("<< {text}");
//!         }
//!     }));
//!
//!     connector.connect("127.0.0.1", 7000)?;
//!     // ... wait for Connected, then
//!     connector.send("HELLO").await?;
//!     connector.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `tcp` (default): [`Connector::tcp`] over `pxnet-tcp`

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

mod codec;
mod config;
mod connector;
mod error;
mod events;
mod framing;
mod handshake;
mod state;
mod supervisor;

pub use codec::{
    DelimiterCodec, HANDSHAKE_TERMINATOR, HandshakeCodec, Session, decode_ascii, encode_ascii,
};
pub use config::{
    ConnectorConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_MAX_ATTEMPTS, DEFAULT_READ_CHUNK_SIZE,
    ReconnectConfig,
};
pub use connector::Connector;
pub use error::{ConnectorError, ConnectorResult, InvalidTransition, ProtocolError};
pub use events::{ConnectorEvent, ConnectorEventHandler, EventDispatcher};
pub use state::ConnectionStateMachine;

// Re-export the transport seam for convenience
pub use pxnet_transport_traits::{
    ConnectionState, ConnectorMetrics, LimitsConfig, TimeoutConfig, Transport, TransportError,
    TransportResult, TransportType,
};

#[cfg(feature = "tcp")]
pub use pxnet_tcp::{TcpConfig, TcpTransport, TcpTransportBuilder};
