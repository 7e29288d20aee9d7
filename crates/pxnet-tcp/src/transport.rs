//! TCP transport implementation

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info, trace, warn};

use pxnet_transport_traits::{Transport, TransportError, TransportResult, TransportType};

/// TCP transport implementation
pub struct TcpTransport {
    /// Transport configuration (immutable)
    config: TcpConfig,
    /// Read half of the current stream (tokio mutex - crosses await)
    reader: tokio::sync::Mutex<Option<OwnedReadHalf>>,
    /// Write half of the current stream (tokio mutex - serializes writers)
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    /// Read direction usable
    readable: AtomicBool,
    /// Write direction usable
    writable: AtomicBool,
    /// Remote address of the current stream (std mutex - short-lived)
    peer_addr: StdMutex<Option<SocketAddr>>,
}

// Manual Debug implementation since the stream halves are not interesting to print
impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("config", &self.config)
            .field("readable", &self.readable.load(Ordering::Relaxed))
            .field("writable", &self.writable.load(Ordering::Relaxed))
            .field("peer_addr", &self.peer_addr())
            .finish()
    }
}

impl TcpTransport {
    /// Create a new, unopened TCP transport
    #[must_use]
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config,
            reader: tokio::sync::Mutex::new(None),
            writer: tokio::sync::Mutex::new(None),
            readable: AtomicBool::new(false),
            writable: AtomicBool::new(false),
            peer_addr: StdMutex::new(None),
        }
    }

    /// Transport configuration
    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    /// Remote address of the currently open stream
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        *self.peer_addr.lock().expect("peer_addr mutex poisoned")
    }

    async fn connect_stream(&self, host: &str, port: u16) -> TransportResult<TcpStream> {
        let operation = format!("connect {host}:{port}");
        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| TransportError::ConnectionTimeout {
                operation,
                timeout: self.config.connect_timeout,
            })?
            .map_err(|e| {
                TransportError::ConnectionFailed(format!("Failed to connect to {host}:{port}: {e}"))
            })?;

        if self.config.nodelay
            && let Err(e) = stream.set_nodelay(true)
        {
            warn!("Failed to set TCP_NODELAY for {}:{}: {}", host, port, e);
        }
        Ok(stream)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Tcp
    }

    async fn open(&self, host: &str, port: u16) -> TransportResult<()> {
        // A reconnect attempt always starts from a fresh socket
        self.close().await?;

        info!("Connecting to TCP server at {}:{}", host, port);
        let stream = self.connect_stream(host, port).await?;
        let peer = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();

        *self.reader.lock().await = Some(read_half);
        *self.writer.lock().await = Some(write_half);
        *self.peer_addr.lock().expect("peer_addr mutex poisoned") = peer;
        self.readable.store(true, Ordering::Release);
        self.writable.store(true, Ordering::Release);

        debug!("TCP stream open to {:?}", peer);
        Ok(())
    }

    async fn read(&self, max_bytes: usize) -> TransportResult<Option<Bytes>> {
        let mut guard = self.reader.lock().await;
        let Some(half) = guard.as_mut() else {
            return Err(TransportError::NotConnected);
        };

        let mut buf = vec![0u8; max_bytes.max(1)];
        match half.read(&mut buf).await {
            Ok(0) => {
                debug!("TCP peer closed the stream");
                self.readable.store(false, Ordering::Release);
                Ok(None)
            }
            Ok(n) => {
                buf.truncate(n);
                trace!("Read {} bytes from TCP stream", n);
                Ok(Some(Bytes::from(buf)))
            }
            Err(e) => {
                self.readable.store(false, Ordering::Release);
                Err(TransportError::from(e))
            }
        }
    }

    async fn write(&self, data: &[u8]) -> TransportResult<()> {
        let mut guard = self.writer.lock().await;
        let Some(half) = guard.as_mut() else {
            return Err(TransportError::NotConnected);
        };

        let result = async {
            half.write_all(data).await?;
            half.flush().await
        }
        .await;

        if let Err(e) = result {
            self.writable.store(false, Ordering::Release);
            return Err(TransportError::SendFailed(format!(
                "Failed to write {} bytes to TCP stream: {e}",
                data.len()
            )));
        }

        trace!("Wrote {} bytes to TCP stream", data.len());
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        self.readable.store(false, Ordering::Release);
        self.writable.store(false, Ordering::Release);

        if let Some(mut half) = self.writer.lock().await.take() {
            if let Err(e) = half.shutdown().await {
                debug!("TCP shutdown during close failed: {}", e);
            }
            info!("Closed TCP stream to {:?}", self.peer_addr());
        }
        self.reader.lock().await.take();
        *self.peer_addr.lock().expect("peer_addr mutex poisoned") = None;
        Ok(())
    }

    fn is_readable(&self) -> bool {
        self.readable.load(Ordering::Acquire)
    }

    fn is_writable(&self) -> bool {
        self.writable.load(Ordering::Acquire)
    }

    fn endpoint(&self) -> Option<String> {
        self.peer_addr().map(|addr| format!("tcp://{addr}"))
    }
}

/// TCP transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Disable Nagle's algorithm on opened sockets
    pub nodelay: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            nodelay: true,
        }
    }
}

/// TCP transport builder
#[derive(Debug, Default)]
pub struct TcpTransportBuilder {
    config: TcpConfig,
}

impl TcpTransportBuilder {
    /// Create a new TCP transport builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TcpConfig::default(),
        }
    }

    /// Set connection timeout
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Enable or disable TCP_NODELAY
    #[must_use]
    pub const fn nodelay(mut self, enabled: bool) -> Self {
        self.config.nodelay = enabled;
        self
    }

    /// Build the TCP transport
    #[must_use]
    pub fn build(self) -> TcpTransport {
        TcpTransport::new(self.config)
    }
}
