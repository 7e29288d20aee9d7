//! The public connector facade.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::codec::Encoder;
use tracing::{debug, info, trace, warn};

use pxnet_transport_traits::{
    AtomicMetrics, ConnectionState, ConnectorMetrics, MIN_PORT, Transport, TransportError,
    validate_request_size,
};

use crate::codec::{DelimiterCodec, Session};
use crate::config::ConnectorConfig;
use crate::error::{ConnectorError, ConnectorResult};
use crate::events::{ConnectorEvent, ConnectorEventHandler, EventDispatcher};
use crate::state::ConnectionStateMachine;
use crate::supervisor::{self, RunContext};

/// State shared between the facade and its background worker.
pub(crate) struct Shared {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) config: RwLock<ConnectorConfig>,
    pub(crate) state: ConnectionStateMachine,
    pub(crate) session: RwLock<Option<Session>>,
    pub(crate) events: EventDispatcher,
    pub(crate) metrics: AtomicMetrics,
    active: Mutex<Option<ActiveRun>>,
    closing: Mutex<Option<Arc<RunContext>>>,
}

/// The worker of the current `connect` call.
struct ActiveRun {
    run: Arc<RunContext>,
    handle: JoinHandle<()>,
}

/// Client for a session-oriented, delimiter-framed byte stream.
///
/// `connect` starts a background worker that retries open + handshake up to
/// the configured budget, then frames messages until the stream ends.
/// Observers receive [`ConnectorEvent`]s through [`subscribe`](Self::subscribe)
/// or [`add_handler`](Self::add_handler).
///
/// Cloning is cheap; clones drive the same connection.
///
/// # Examples
///
/// ```rust,ignore
/// use pxnet::{Connector, ConnectorEvent};
///
/// let connector = Connector::tcp();
/// let mut events = connector.subscribe();
/// connector.connect("127.0.0.1", 7000)?;
///
/// while let Ok(event) = events.recv().await {
///     match event {
///         ConnectorEvent::Connected => connector.send("PING").await?,
///         ConnectorEvent::Message { text } => println!("{text}"),
///         ConnectorEvent::Disconnected => break,
///         ConnectorEvent::Reconnecting { .. } => {}
///     }
/// }
/// ```
#[derive(Clone)]
pub struct Connector {
    inner: Arc<Shared>,
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("transport", &self.inner.transport)
            .field("state", &self.state())
            .field("session", &self.session())
            .field("events", &self.inner.events)
            .finish()
    }
}

impl Connector {
    /// Connector over `transport` with the default configuration (3 attempts).
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::build(Arc::new(transport), ConnectorConfig::default())
    }

    /// Connector over `transport` with a validated configuration.
    pub fn with_config(
        transport: impl Transport + 'static,
        config: ConnectorConfig,
    ) -> ConnectorResult<Self> {
        config.validate()?;
        Ok(Self::build(Arc::new(transport), config))
    }

    /// Connector over `transport` with a custom reconnect budget.
    pub fn with_max_attempts(
        transport: impl Transport + 'static,
        max_attempts: u32,
    ) -> ConnectorResult<Self> {
        Self::with_config(
            transport,
            ConnectorConfig::default().with_max_attempts(max_attempts),
        )
    }

    /// Connector over an already shared transport.
    pub fn from_shared(
        transport: Arc<dyn Transport>,
        config: ConnectorConfig,
    ) -> ConnectorResult<Self> {
        config.validate()?;
        Ok(Self::build(transport, config))
    }

    fn build(transport: Arc<dyn Transport>, config: ConnectorConfig) -> Self {
        let events = EventDispatcher::new(config.event_capacity);
        Self {
            inner: Arc::new(Shared {
                transport,
                config: RwLock::new(config),
                state: ConnectionStateMachine::new(),
                session: RwLock::new(None),
                events,
                metrics: AtomicMetrics::new(),
                active: Mutex::new(None),
                closing: Mutex::new(None),
            }),
        }
    }

    /// Begin connecting to `host:port` in the background and return at once.
    ///
    /// Does nothing while a previous `connect` is still connecting or
    /// connected. Progress is reported only through notifications.
    pub fn connect(&self, host: &str, port: u16) -> ConnectorResult<()> {
        let current = self.state();
        if current != ConnectionState::Disconnected {
            debug!(state = %current, "connect ignored while a worker is active");
            return Ok(());
        }

        if host.is_empty() {
            return Err(ConnectorError::invalid_argument(
                "host",
                "must be a non empty string",
            ));
        }
        if port < MIN_PORT {
            return Err(ConnectorError::invalid_argument(
                "port",
                "must be between 1 and 65535",
            ));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            ConnectorError::Configuration("connect must be called within a tokio runtime".into())
        })?;

        let mut active = self.inner.active.lock();
        if self
            .inner
            .state
            .try_transition(ConnectionState::Disconnected, ConnectionState::Connecting)
            .is_err()
        {
            debug!("connect lost the race to another caller");
            return Ok(());
        }

        *self.inner.session.write() = None;
        let config = self.inner.config.read().clone();
        let run = Arc::new(RunContext::new());
        info!(
            host,
            port,
            max_attempts = config.reconnect.max_attempts,
            "starting connector worker"
        );

        let handle = runtime.spawn(supervisor::supervise(
            Arc::clone(&self.inner),
            Arc::clone(&run),
            host.to_owned(),
            port,
            config,
        ));
        *active = Some(ActiveRun { run, handle });
        Ok(())
    }

    /// Write `payload` followed by the session delimiter.
    ///
    /// Sends are serialized by the transport. A write failure ends the
    /// session: the worker stops and `Disconnected` is raised before this
    /// call returns the error.
    pub async fn send(&self, payload: &str) -> ConnectorResult<()> {
        let current = self.state();
        if current != ConnectionState::Connected {
            return Err(ConnectorError::InvalidState {
                expected: ConnectionState::Connected,
                actual: current,
            });
        }
        if payload.is_empty() {
            return Err(ConnectorError::invalid_argument(
                "payload",
                "must be a non empty string",
            ));
        }

        let (run, session) = match (self.current_run(), self.session()) {
            (Some(run), Some(session)) if !run.is_cancelled() => (run, session),
            _ => {
                return Err(ConnectorError::InvalidState {
                    expected: ConnectionState::Connected,
                    actual: ConnectionState::Disconnected,
                });
            }
        };

        let (limits, write_timeout) = {
            let config = self.inner.config.read();
            (config.limits.clone(), config.timeouts.write)
        };

        let mut frame = BytesMut::with_capacity(payload.len() + session.delimiter.len());
        DelimiterCodec::new(&session.delimiter, None)?.encode(payload, &mut frame)?;
        validate_request_size(frame.len(), &limits)?;

        let transport = self.inner.transport.as_ref();
        if !transport.is_writable() {
            warn!("send on a transport that is no longer writable");
            run.finish(&self.inner, "transport not writable").await;
            return Err(TransportError::SendFailed("transport is not writable".into()).into());
        }

        let result = match write_timeout {
            Some(limit) => tokio::time::timeout(limit, transport.write(&frame))
                .await
                .unwrap_or_else(|_| {
                    Err(TransportError::WriteTimeout {
                        operation: "send".into(),
                        timeout: limit,
                    })
                }),
            None => transport.write(&frame).await,
        };

        if let Err(e) = result {
            warn!(error = %e, "send failed, ending session");
            run.finish(&self.inner, "send failed").await;
            return Err(e.into());
        }

        self.inner.metrics.record_sent(frame.len());
        trace!(bytes = frame.len(), "message sent");
        Ok(())
    }

    /// Stop the worker, close the transport and wait until the connector is
    /// `Disconnected`.
    ///
    /// Raises `Disconnected` once if a run was still active. A call made while
    /// another `disconnect` is shutting the run down waits for that shutdown.
    /// Calling it again, or without a prior `connect`, is a no-op.
    pub async fn disconnect(&self) -> ConnectorResult<()> {
        let taken = {
            let mut active = self.inner.active.lock();
            let taken = active.take();
            if let Some(ActiveRun { run, .. }) = &taken {
                *self.inner.closing.lock() = Some(Arc::clone(run));
            }
            taken
        };
        let shutdown = self.inner.config.read().timeouts.shutdown;

        let Some(ActiveRun { run, mut handle }) = taken else {
            return self.await_closing(shutdown).await;
        };

        info!("disconnect requested");
        run.cancel();

        match tokio::time::timeout(shutdown, &mut handle).await {
            Ok(Ok(())) => run.finish(&self.inner, "disconnect requested").await,
            Ok(Err(e)) => {
                warn!(error = %e, "connector worker ended abnormally");
                run.finish_aborted(&self.inner).await;
            }
            Err(_) => {
                warn!(?shutdown, "connector worker did not stop in time, aborting");
                handle.abort();
                let _ = handle.await;
                run.finish_aborted(&self.inner).await;
            }
        }

        {
            let mut closing = self.inner.closing.lock();
            if closing.as_ref().is_some_and(|c| Arc::ptr_eq(c, &run)) {
                *closing = None;
            }
        }
        Ok(())
    }

    /// Wait for a shutdown started by a concurrent `disconnect`.
    async fn await_closing(&self, shutdown: Duration) -> ConnectorResult<()> {
        let closing = self.inner.closing.lock().clone();
        let Some(run) = closing.filter(|run| !run.is_finished()) else {
            debug!("disconnect without an active worker");
            return Ok(());
        };

        debug!("disconnect joining an in-flight shutdown");
        // The first caller can spend up to `shutdown` on the worker before it
        // aborts and finishes the run itself.
        if tokio::time::timeout(shutdown * 2, run.finished()).await.is_err() {
            warn!(?shutdown, "in-flight shutdown did not complete, finishing run");
            run.finish_aborted(&self.inner).await;
        }
        Ok(())
    }

    fn current_run(&self) -> Option<Arc<RunContext>> {
        self.inner
            .active
            .lock()
            .as_ref()
            .map(|active| Arc::clone(&active.run))
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.current()
    }

    /// Whether a session is established.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Session parameters of the last successful handshake.
    ///
    /// Kept after the session ends and cleared when the next `connect`
    /// starts a worker.
    pub fn session(&self) -> Option<Session> {
        self.inner.session.read().clone()
    }

    /// Session id of the last successful handshake.
    pub fn session_id(&self) -> Option<String> {
        self.inner
            .session
            .read()
            .as_ref()
            .map(|session| session.session_id.clone())
    }

    /// Reconnect budget for the next `connect` call.
    pub fn max_attempts(&self) -> u32 {
        self.inner.config.read().reconnect.max_attempts
    }

    /// Change the reconnect budget; a running worker keeps its own.
    pub fn set_max_attempts(&self, max_attempts: u32) -> ConnectorResult<()> {
        if max_attempts == 0 {
            return Err(ConnectorError::invalid_argument(
                "max_attempts",
                "must be at least 1",
            ));
        }
        self.inner.config.write().reconnect.max_attempts = max_attempts;
        Ok(())
    }

    /// Snapshot of the configuration.
    pub fn config(&self) -> ConnectorConfig {
        self.inner.config.read().clone()
    }

    /// Receiver for every notification emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectorEvent> {
        self.inner.events.subscribe()
    }

    /// Register a synchronous notification handler.
    pub fn add_handler(&self, handler: Arc<dyn ConnectorEventHandler>) {
        self.inner.events.add_handler(handler);
    }

    /// Traffic and attempt counters.
    pub fn metrics(&self) -> ConnectorMetrics {
        self.inner.metrics.snapshot()
    }

    /// Remote endpoint of the open stream, if the transport reports one.
    pub fn endpoint(&self) -> Option<String> {
        self.inner.transport.endpoint()
    }
}

#[cfg(feature = "tcp")]
impl Connector {
    /// Connector over a TCP socket with the default configuration.
    pub fn tcp() -> Self {
        let config = ConnectorConfig::default();
        Self::build(Arc::new(Self::tcp_transport(&config)), config)
    }

    /// Connector over a TCP socket whose connect timeout follows `config`.
    pub fn tcp_with_config(config: ConnectorConfig) -> ConnectorResult<Self> {
        Self::with_config(Self::tcp_transport(&config), config)
    }

    fn tcp_transport(config: &ConnectorConfig) -> pxnet_tcp::TcpTransport {
        pxnet_tcp::TcpTransportBuilder::new()
            .connect_timeout(config.timeouts.connect)
            .build()
    }
}
