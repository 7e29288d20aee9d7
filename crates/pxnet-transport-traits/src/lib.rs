//! # pxnet Transport Traits
//!
//! Core transport traits and types for the pxnet session-oriented stream client.
//! This crate provides the foundational abstractions that the protocol core and
//! every byte-stream transport depend on.
//!
//! ## Overview
//!
//! This crate defines:
//! - **Traits**: [`Transport`]
//! - **Types**: [`TransportType`], [`ConnectionState`]
//! - **Errors**: [`TransportError`], [`TransportResult`]
//! - **Config**: [`LimitsConfig`], [`TimeoutConfig`]
//! - **Metrics**: [`ConnectorMetrics`], [`AtomicMetrics`]
//!
//! ## Usage
//!
//! Transport implementations depend on this crate and implement the [`Transport`] trait:
//!
//! ```rust,ignore
//! use pxnet_transport_traits::{Transport, TransportResult, TransportType};
//! use async_trait::async_trait;
//! use bytes::Bytes;
//!
//! #[derive(Debug)]
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     fn transport_type(&self) -> TransportType { TransportType::Memory }
//!     async fn open(&self, host: &str, port: u16) -> TransportResult<()> { /* ... */ }
//!     async fn read(&self, max_bytes: usize) -> TransportResult<Option<Bytes>> { /* ... */ }
//!     // ... other trait methods
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

mod config;
mod error;
mod metrics;
mod traits;
mod types;

// Re-export all public items
pub use config::{
    DEFAULT_MAX_HANDSHAKE_SIZE, DEFAULT_MAX_MESSAGE_SIZE, LimitsConfig, TimeoutConfig,
};
pub use error::{TransportError, TransportResult};
pub use metrics::{AtomicMetrics, ConnectorMetrics};
pub use traits::Transport;
pub use types::{ConnectionState, MIN_PORT, TransportType};

// Re-export validation functions
pub use error::validate_request_size;
