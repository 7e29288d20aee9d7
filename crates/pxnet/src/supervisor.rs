//! Reconnect supervisor: the background worker behind one `connect` call.
//!
//! The worker makes up to `max_attempts` open + handshake attempts. The first
//! success hands the stream to the framing loop; once that loop ends, or the
//! budget is spent, or cancellation is requested, the run finishes with exactly
//! one `Disconnected` notification.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{Instrument, debug, info, info_span, warn};

use pxnet_transport_traits::{ConnectionState, TransportError};

use crate::codec::{DelimiterCodec, Session};
use crate::config::ConnectorConfig;
use crate::connector::Shared;
use crate::events::ConnectorEvent;
use crate::framing::{FramingReader, ReaderExit};
use crate::handshake::{self, AttemptFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Running,
    Finishing,
    Finished,
}

/// Per-run cancellation and terminal latch.
///
/// Every notification of a run passes through [`RunContext::emit`]; once
/// [`RunContext::finish`] has claimed the latch nothing but the single
/// `Disconnected` is delivered.
#[derive(Debug, Default)]
pub(crate) struct RunContext {
    cancel: CancellationToken,
    phase: Mutex<Phase>,
    finished: CancellationToken,
}

impl RunContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.is_cancelled()
    }

    /// Resolves once the single `Disconnected` of this run has been delivered.
    pub(crate) fn finished(&self) -> WaitForCancellationFuture<'_> {
        self.finished.cancelled()
    }

    /// Deliver a non-terminal notification unless the run is finishing.
    pub(crate) fn emit(&self, shared: &Shared, event: ConnectorEvent) -> bool {
        let phase = self.phase.lock();
        if *phase != Phase::Running {
            return false;
        }
        shared.events.emit(event);
        true
    }

    /// End the run: cancel, close the transport, reach `Disconnected` and
    /// notify once. Later callers wait for the first one to complete.
    pub(crate) async fn finish(&self, shared: &Shared, reason: &str) {
        self.cancel.cancel();

        let claimed = {
            let mut phase = self.phase.lock();
            if *phase == Phase::Running {
                *phase = Phase::Finishing;
                true
            } else {
                false
            }
        };

        if claimed {
            self.complete(shared, reason).await;
        } else {
            self.finished.cancelled().await;
        }
    }

    /// Finish a run whose worker was aborted, possibly in the middle of
    /// its own `finish`.
    pub(crate) async fn finish_aborted(&self, shared: &Shared) {
        self.cancel.cancel();
        {
            let mut phase = self.phase.lock();
            if *phase == Phase::Running {
                *phase = Phase::Finishing;
            }
        }
        self.complete(shared, "worker aborted").await;
    }

    async fn complete(&self, shared: &Shared, reason: &str) {
        if let Err(e) = shared.transport.close().await {
            debug!(error = %e, "transport close failed during shutdown");
        }

        {
            let mut phase = self.phase.lock();
            if *phase == Phase::Finished {
                return;
            }
            *phase = Phase::Finished;

            match shared.state.transition(ConnectionState::Disconnected) {
                Ok(ConnectionState::Connected) => shared.metrics.session_closed(),
                Ok(_) => {}
                Err(e) => debug!(error = %e, "state already disconnected"),
            }
            info!(reason, "connector disconnected");
            shared.events.emit(ConnectorEvent::Disconnected);
        }
        self.finished.cancel();
    }
}

/// An established session ready for framing.
#[derive(Debug)]
struct Established {
    session: Session,
    codec: DelimiterCodec,
    leftover: bytes::BytesMut,
}

/// Spawnable worker future for one `connect` call.
pub(crate) async fn supervise(
    shared: Arc<Shared>,
    run: Arc<RunContext>,
    host: String,
    port: u16,
    config: ConnectorConfig,
) {
    let span = info_span!("pxnet_worker", %host, port);
    async move {
        let reason = reconnect_loop(&shared, &run, &host, port, &config).await;
        run.finish(&shared, reason).await;
    }
    .instrument(span)
    .await;
}

async fn reconnect_loop(
    shared: &Shared,
    run: &RunContext,
    host: &str,
    port: u16,
    config: &ConnectorConfig,
) -> &'static str {
    let max_attempts = config.reconnect.max_attempts;

    for attempt in 1..=max_attempts {
        if run.is_cancelled() {
            return "disconnect requested";
        }

        let delay = config.reconnect.delay_before(attempt);
        if !delay.is_zero() {
            debug!(attempt, ?delay, "backing off before reconnect attempt");
            tokio::select! {
                biased;
                () = run.cancelled() => return "disconnect requested",
                () = tokio::time::sleep(delay) => {}
            }
        }

        if let Err(e) = shared.state.transition(ConnectionState::Connecting) {
            warn!(error = %e, "unexpected state before reconnect attempt");
            return "state conflict";
        }
        shared.metrics.attempts.fetch_add(1, Ordering::Relaxed);
        if !run.emit(shared, ConnectorEvent::Reconnecting { attempt }) {
            return "disconnect requested";
        }
        debug!(attempt, max_attempts, "reconnect attempt starting");

        let outcome = tokio::select! {
            biased;
            () = run.cancelled() => return "disconnect requested",
            outcome = attempt_once(shared, host, port, config) => outcome,
        };

        match outcome {
            Ok(established) => return serve(shared, run, established, config).await,
            Err(failure) => {
                shared.metrics.failed_attempts.fetch_add(1, Ordering::Relaxed);
                warn!(attempt, max_attempts, error = %failure, "reconnect attempt failed");
                if let Err(e) = shared.transport.close().await {
                    debug!(error = %e, "transport close after failed attempt");
                }
            }
        }
    }

    warn!(max_attempts, "reconnect budget exhausted");
    "reconnect budget exhausted"
}

/// One open + handshake attempt.
async fn attempt_once(
    shared: &Shared,
    host: &str,
    port: u16,
    config: &ConnectorConfig,
) -> Result<Established, AttemptFailure> {
    let transport = shared.transport.as_ref();
    let connect_timeout = config.timeouts.connect;

    tokio::time::timeout(connect_timeout, transport.open(host, port))
        .await
        .map_err(|_| TransportError::ConnectionTimeout {
            operation: format!("open {host}:{port}"),
            timeout: connect_timeout,
        })??;

    let exchange = handshake::perform(
        transport,
        &config.limits,
        config.read_chunk_size,
        &shared.metrics,
    );
    let handshake = match config.timeouts.handshake {
        Some(limit) => tokio::time::timeout(limit, exchange)
            .await
            .map_err(|_| AttemptFailure::Timeout(limit))??,
        None => exchange.await?,
    };

    let codec = DelimiterCodec::new(
        &handshake.session.delimiter,
        config.limits.max_message_size,
    )?;
    Ok(Established {
        session: handshake.session,
        codec,
        leftover: handshake.leftover,
    })
}

/// Publish the session and run the framing loop until the stream ends.
async fn serve(
    shared: &Shared,
    run: &RunContext,
    established: Established,
    config: &ConnectorConfig,
) -> &'static str {
    let Established {
        session,
        codec,
        leftover,
    } = established;

    info!(session_id = %session.session_id, delimiter = %session.delimiter, "session established");
    *shared.session.write() = Some(session);

    if let Err(e) = shared.state.transition(ConnectionState::Connected) {
        warn!(error = %e, "unexpected state after handshake");
        return "state conflict";
    }
    shared.metrics.session_opened();
    if !run.emit(shared, ConnectorEvent::Connected) {
        return "disconnect requested";
    }

    let reader = FramingReader::new(
        codec,
        leftover,
        config.read_chunk_size,
        config.timeouts.read,
    );
    match reader.run(shared, run).await {
        ReaderExit::PeerClosed => {
            info!("peer closed the session stream");
            "peer closed"
        }
        ReaderExit::Stopped => "disconnect requested",
        ReaderExit::Failed(e) => {
            warn!(error = %e, "session stream failed");
            "stream error"
        }
    }
}
