//! Handshake exchange over an opened transport.

use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tokio_util::codec::Decoder;
use tracing::debug;

use pxnet_transport_traits::{AtomicMetrics, LimitsConfig, Transport, TransportError};

use crate::codec::{HandshakeCodec, Session};
use crate::error::ProtocolError;

/// Why one open + handshake attempt did not produce a session.
#[derive(Error, Debug)]
pub(crate) enum AttemptFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("stream closed before the handshake line completed")]
    Closed,

    #[error("handshake not completed within {0:?}")]
    Timeout(Duration),
}

/// A completed handshake and the stream bytes that followed the line.
#[derive(Debug)]
pub(crate) struct Handshake {
    pub(crate) session: Session,
    pub(crate) leftover: BytesMut,
}

/// Read until the handshake line is complete and parse it.
///
/// Cancellation and the overall timeout are applied by the caller around
/// this future; dropping it mid-read leaves the transport to be closed.
pub(crate) async fn perform(
    transport: &dyn Transport,
    limits: &LimitsConfig,
    chunk_size: usize,
    metrics: &AtomicMetrics,
) -> Result<Handshake, AttemptFailure> {
    let mut codec = HandshakeCodec::new(limits.max_handshake_size);
    let mut buffer = BytesMut::with_capacity(chunk_size);

    loop {
        if let Some(session) = codec.decode(&mut buffer)? {
            debug!(
                session_id = %session.session_id,
                leftover = buffer.len(),
                "handshake line parsed"
            );
            return Ok(Handshake {
                session,
                leftover: buffer,
            });
        }

        if !transport.is_readable() {
            return Err(AttemptFailure::Closed);
        }
        match transport.read(chunk_size).await? {
            Some(chunk) if !chunk.is_empty() => {
                metrics.record_read(chunk.len());
                buffer.extend_from_slice(&chunk);
            }
            _ => return Err(AttemptFailure::Closed),
        }
    }
}
