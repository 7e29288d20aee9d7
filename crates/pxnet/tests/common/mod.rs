//! Shared helpers for connector integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use pxnet::{ConnectorEvent, Transport, TransportError, TransportResult, TransportType};

/// Install a test-writer subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// One scripted response to `read`.
#[derive(Debug, Clone)]
pub enum ReadStep {
    Data(Bytes),
    Eof,
    Fail(TransportError),
}

impl ReadStep {
    pub fn data(bytes: &[u8]) -> Self {
        Self::Data(Bytes::copy_from_slice(bytes))
    }
}

/// Script for one `open` call: its result and the reads that follow.
///
/// Once the reads are exhausted further reads pend until the transport is
/// closed or the read is cancelled.
#[derive(Debug, Clone)]
pub struct ScriptedSession {
    pub open: TransportResult<()>,
    pub reads: Vec<ReadStep>,
}

impl ScriptedSession {
    pub fn refused() -> Self {
        Self {
            open: Err(TransportError::ConnectionFailed("refused".into())),
            reads: Vec::new(),
        }
    }

    pub fn silent() -> Self {
        Self {
            open: Ok(()),
            reads: Vec::new(),
        }
    }

    pub fn reads(reads: Vec<ReadStep>) -> Self {
        Self {
            open: Ok(()),
            reads,
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    sessions: VecDeque<ScriptedSession>,
    current: VecDeque<ReadStep>,
    writes: Vec<Bytes>,
}

/// In-memory transport replaying a script of sessions.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
    open: AtomicBool,
    fail_writes: AtomicBool,
    opens: AtomicUsize,
    closes: AtomicUsize,
    reads_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(sessions: Vec<ScriptedSession>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                sessions: sessions.into(),
                ..Script::default()
            }),
            ..Self::default()
        })
    }

    pub fn writes(&self) -> Vec<Bytes> {
        self.script.lock().writes.clone()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn reads_in_flight(&self) -> usize {
        self.reads_in_flight.load(Ordering::SeqCst)
    }

    /// Queue more reads on the current session.
    pub fn push_read(&self, step: ReadStep) {
        self.script.lock().current.push_back(step);
    }
}

/// Decrements the in-flight counter when a read finishes or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Memory
    }

    async fn open(&self, _host: &str, _port: u16) -> TransportResult<()> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let session = self.script.lock().sessions.pop_front();
        let session = session.unwrap_or_else(ScriptedSession::silent);
        session.open?;

        self.script.lock().current = session.reads.into();
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, max_bytes: usize) -> TransportResult<Option<Bytes>> {
        self.reads_in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight(&self.reads_in_flight);

        loop {
            if !self.open.load(Ordering::SeqCst) {
                return Err(TransportError::NotConnected);
            }
            let step = self.script.lock().current.pop_front();
            match step {
                Some(ReadStep::Data(mut bytes)) => {
                    if bytes.len() > max_bytes {
                        let rest = bytes.split_off(max_bytes);
                        self.script.lock().current.push_front(ReadStep::Data(rest));
                    }
                    return Ok(Some(bytes));
                }
                Some(ReadStep::Eof) => {
                    self.open.store(false, Ordering::SeqCst);
                    return Ok(None);
                }
                Some(ReadStep::Fail(e)) => return Err(e),
                None => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        }
    }

    async fn write(&self, data: &[u8]) -> TransportResult<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("scripted write failure".into()));
        }
        self.script.lock().writes.push(Bytes::copy_from_slice(data));
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_readable(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn is_writable(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn endpoint(&self) -> Option<String> {
        Some("memory://scripted".into())
    }
}

/// Receive events until `Disconnected`, failing after `limit`.
pub async fn collect_until_disconnected(
    rx: &mut broadcast::Receiver<ConnectorEvent>,
    limit: Duration,
) -> Vec<ConnectorEvent> {
    let mut events = Vec::new();
    let finished = tokio::time::timeout(limit, async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
    })
    .await;
    assert!(
        finished.is_ok(),
        "no Disconnected within {limit:?}, saw {events:?}"
    );
    events
}

/// Receive the next event, failing after `limit`.
pub async fn next_event(
    rx: &mut broadcast::Receiver<ConnectorEvent>,
    limit: Duration,
) -> ConnectorEvent {
    tokio::time::timeout(limit, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Assert nothing else arrives within `window`.
pub async fn assert_quiet(rx: &mut broadcast::Receiver<ConnectorEvent>, window: Duration) {
    if let Ok(Ok(event)) = tokio::time::timeout(window, rx.recv()).await {
        panic!("unexpected event {event:?}");
    }
}
