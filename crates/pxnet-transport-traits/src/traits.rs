//! Core transport traits.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportResult;
use crate::types::TransportType;

/// A reusable, full-duplex byte-stream primitive.
///
/// One instance is opened, used and closed once per reconnect attempt. Reads
/// and writes are independent directions: a single reader and a single writer
/// may run concurrently, and implementations serialize concurrent writers.
///
/// Callers that close a transport while a read may be pending must drop that
/// read future first; implementations are free to wait for it.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Returns the type of this transport.
    fn transport_type(&self) -> TransportType;

    /// Opens a fresh stream to `host:port`, replacing any previous stream.
    async fn open(&self, host: &str, port: u16) -> TransportResult<()>;

    /// Reads up to `max_bytes` bytes.
    ///
    /// Returns `Ok(None)` once the peer has closed the stream. Never returns
    /// `Ok(Some(_))` with an empty buffer.
    async fn read(&self, max_bytes: usize) -> TransportResult<Option<Bytes>>;

    /// Writes the whole buffer.
    async fn write(&self, data: &[u8]) -> TransportResult<()>;

    /// Closes the stream. Closing an already closed transport is a no-op.
    async fn close(&self) -> TransportResult<()>;

    /// Returns `true` while the read direction can be used.
    fn is_readable(&self) -> bool;

    /// Returns `true` while the write direction can be used.
    fn is_writable(&self) -> bool;

    /// Returns the endpoint address or identifier for this transport, if applicable.
    fn endpoint(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test that the trait can be used as a trait object
    fn _test_transport_object(_t: &dyn Transport) {}
    fn _test_shared_object(_t: std::sync::Arc<dyn Transport>) {}
}
