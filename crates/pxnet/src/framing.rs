//! Message framing loop for an established session.

use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use pxnet_transport_traits::{Transport, TransportError};

use crate::codec::DelimiterCodec;
use crate::connector::Shared;
use crate::events::ConnectorEvent;
use crate::supervisor::RunContext;

/// How the framing loop ended.
#[derive(Debug)]
pub(crate) enum ReaderExit {
    /// The peer closed the stream or it stopped being readable.
    PeerClosed,
    /// Cancellation was requested or the run already finished.
    Stopped,
    /// A read or decode failure.
    Failed(TransportError),
}

/// Reads the stream in chunks and emits every complete message.
#[derive(Debug)]
pub(crate) struct FramingReader {
    codec: DelimiterCodec,
    buffer: BytesMut,
    chunk_size: usize,
    read_timeout: Option<Duration>,
}

impl FramingReader {
    /// Continue framing from `leftover`, the bytes that followed the handshake line.
    pub(crate) fn new(
        codec: DelimiterCodec,
        leftover: BytesMut,
        chunk_size: usize,
        read_timeout: Option<Duration>,
    ) -> Self {
        Self {
            codec,
            buffer: leftover,
            chunk_size,
            read_timeout,
        }
    }

    pub(crate) async fn run(mut self, shared: &Shared, run: &RunContext) -> ReaderExit {
        let transport = shared.transport.as_ref();
        loop {
            if let Err(exit) = self.drain(shared, run) {
                return exit;
            }

            if !transport.is_readable() {
                debug!("transport no longer readable");
                return ReaderExit::PeerClosed;
            }

            let read = tokio::select! {
                biased;
                () = run.cancelled() => return ReaderExit::Stopped,
                read = self.read_chunk(transport) => read,
            };

            match read {
                Ok(Some(chunk)) if !chunk.is_empty() => {
                    shared.metrics.record_read(chunk.len());
                    trace!(bytes = chunk.len(), buffered = self.buffer.len(), "chunk read");
                    self.buffer.extend_from_slice(&chunk);
                }
                Ok(_) => return ReaderExit::PeerClosed,
                Err(e) => return ReaderExit::Failed(e),
            }
        }
    }

    /// Emit every complete message currently buffered.
    fn drain(&mut self, shared: &Shared, run: &RunContext) -> Result<(), ReaderExit> {
        loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(text)) => {
                    if !run.emit(shared, ConnectorEvent::Message { text }) {
                        return Err(ReaderExit::Stopped);
                    }
                    shared.metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                }
                Ok(None) => return Ok(()),
                Err(e) => return Err(ReaderExit::Failed(e.into())),
            }
        }
    }

    async fn read_chunk(
        &self,
        transport: &dyn Transport,
    ) -> Result<Option<bytes::Bytes>, TransportError> {
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, transport.read(self.chunk_size))
                .await
                .unwrap_or_else(|_| {
                    Err(TransportError::ReadTimeout {
                        operation: "session read".into(),
                        timeout: limit,
                    })
                }),
            None => transport.read(self.chunk_size).await,
        }
    }
}
