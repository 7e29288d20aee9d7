//! # pxnet TCP Transport
//!
//! TCP socket transport for the pxnet session client.
//! This crate provides the raw byte-stream primitive (open, read, write,
//! close) that the protocol core drives; it performs no framing of its own.
//!
//! ## Features
//!
//! - **Split Halves**: Independent read and write directions on one socket
//! - **Serialized Writes**: Concurrent writers never interleave frames
//! - **Connect Timeout**: Bounded connection establishment
//! - **Reusable**: One transport can be reopened for every reconnect attempt
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pxnet_tcp::TcpTransportBuilder;
//! use pxnet_transport_traits::Transport;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = TcpTransportBuilder::new()
//!         .connect_timeout(Duration::from_secs(5))
//!         .nodelay(true)
//!         .build();
//!
//!     transport.open("127.0.0.1", 7000).await?;
//!     transport.write(b"ping|END|").await?;
//!     Ok(())
//! }
//! ```

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

mod transport;

pub use transport::{TcpConfig, TcpTransport, TcpTransportBuilder};

// Re-export transport traits for convenience
pub use pxnet_transport_traits::{Transport, TransportError, TransportResult, TransportType};
