//! Wire-level connector tests against real TCP listeners.

#![cfg(feature = "tcp")]

mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use common::{assert_quiet, collect_until_disconnected, init_tracing, next_event};
use pxnet::{
    ConnectionState, Connector, ConnectorConfig, ConnectorError, ConnectorEvent, TimeoutConfig,
};

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(200);

async fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn tcp_connector(max_attempts: u32) -> Connector {
    let timeouts = TimeoutConfig {
        handshake: Some(Duration::from_millis(200)),
        ..TimeoutConfig::fast()
    };
    Connector::tcp_with_config(
        ConnectorConfig::new()
            .with_max_attempts(max_attempts)
            .with_timeouts(timeouts),
    )
    .unwrap()
}

/// Accept one client and write `chunks` with a pause between them.
fn serve_once(listener: TcpListener, chunks: Vec<&'static str>) -> JoinHandle<TcpStream> {
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        for chunk in chunks {
            socket.write_all(chunk.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        socket
    })
}

fn message(text: &str) -> ConnectorEvent {
    ConnectorEvent::Message { text: text.into() }
}

#[tokio::test]
async fn test_server_that_never_handshakes() {
    init_tracing();
    let (listener, port) = listener().await;
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let connector = tcp_connector(3);
    let mut rx = connector.subscribe();
    connector.connect("127.0.0.1", port).unwrap();

    let events = collect_until_disconnected(&mut rx, WAIT).await;
    assert_eq!(
        events,
        vec![
            ConnectorEvent::Reconnecting { attempt: 1 },
            ConnectorEvent::Reconnecting { attempt: 2 },
            ConnectorEvent::Reconnecting { attempt: 3 },
            ConnectorEvent::Disconnected,
        ]
    );
    assert_eq!(connector.state(), ConnectionState::Disconnected);
    assert_eq!(connector.metrics().failed_attempts, 3);
}

#[tokio::test]
async fn test_refused_connection_exhausts_budget() {
    init_tracing();
    let (listener, port) = listener().await;
    drop(listener);

    let connector = tcp_connector(2);
    let mut rx = connector.subscribe();
    connector.connect("127.0.0.1", port).unwrap();

    let events = collect_until_disconnected(&mut rx, WAIT).await;
    assert_eq!(
        events,
        vec![
            ConnectorEvent::Reconnecting { attempt: 1 },
            ConnectorEvent::Reconnecting { attempt: 2 },
            ConnectorEvent::Disconnected,
        ]
    );
}

#[tokio::test]
async fn test_handshake_and_message_in_one_write() {
    init_tracing();
    let (listener, port) = listener().await;
    let _server = serve_once(listener, vec!["abc123 |END|\r\nHELLO|END|"]);

    let connector = tcp_connector(3);
    let mut rx = connector.subscribe();
    connector.connect("127.0.0.1", port).unwrap();

    assert_eq!(
        next_event(&mut rx, WAIT).await,
        ConnectorEvent::Reconnecting { attempt: 1 }
    );
    assert_eq!(next_event(&mut rx, WAIT).await, ConnectorEvent::Connected);
    assert_eq!(next_event(&mut rx, WAIT).await, message("HELLO"));

    let session = connector.session().unwrap();
    assert_eq!(session.session_id, "abc123");
    assert_eq!(session.delimiter, "|END|");
    assert!(connector.endpoint().unwrap().starts_with("tcp://127.0.0.1:"));

    connector.disconnect().await.unwrap();
    assert_eq!(next_event(&mut rx, WAIT).await, ConnectorEvent::Disconnected);
}

#[tokio::test]
async fn test_handshake_split_inside_delimiter() {
    init_tracing();
    let (listener, port) = listener().await;
    let _server = serve_once(listener, vec!["abc123 |EN", "D|\r\nHELLO|END|"]);

    let connector = tcp_connector(1);
    let mut rx = connector.subscribe();
    connector.connect("127.0.0.1", port).unwrap();

    assert_eq!(
        next_event(&mut rx, WAIT).await,
        ConnectorEvent::Reconnecting { attempt: 1 }
    );
    assert_eq!(next_event(&mut rx, WAIT).await, ConnectorEvent::Connected);
    assert_eq!(next_event(&mut rx, WAIT).await, message("HELLO"));
    assert_eq!(connector.session_id().as_deref(), Some("abc123"));
    assert_eq!(connector.session().unwrap().delimiter, "|END|");

    connector.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_trailing_partial_message_is_retained() {
    init_tracing();
    let (listener, port) = listener().await;
    let server = serve_once(listener, vec!["abc123 |END|\r\n", "A|END|B|END|C"]);

    let connector = tcp_connector(1);
    let mut rx = connector.subscribe();
    connector.connect("127.0.0.1", port).unwrap();

    assert_eq!(
        next_event(&mut rx, WAIT).await,
        ConnectorEvent::Reconnecting { attempt: 1 }
    );
    assert_eq!(next_event(&mut rx, WAIT).await, ConnectorEvent::Connected);
    assert_eq!(next_event(&mut rx, WAIT).await, message("A"));
    assert_eq!(next_event(&mut rx, WAIT).await, message("B"));
    assert_quiet(&mut rx, QUIET).await;

    let mut socket = server.await.unwrap();
    socket.write_all(b"|END|").await.unwrap();
    assert_eq!(next_event(&mut rx, WAIT).await, message("C"));

    connector.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_peer_close_fires_one_disconnected() {
    init_tracing();
    let (listener, port) = listener().await;
    let server = serve_once(listener, vec!["abc123 |END|\r\nONE|END|"]);

    let connector = tcp_connector(3);
    let mut rx = connector.subscribe();
    connector.connect("127.0.0.1", port).unwrap();

    drop(server.await.unwrap());
    let events = collect_until_disconnected(&mut rx, WAIT).await;
    assert_eq!(
        events,
        vec![
            ConnectorEvent::Reconnecting { attempt: 1 },
            ConnectorEvent::Connected,
            message("ONE"),
            ConnectorEvent::Disconnected,
        ]
    );
    assert_quiet(&mut rx, QUIET).await;
    assert_eq!(connector.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_send_writes_payload_and_delimiter() {
    init_tracing();
    let (listener, port) = listener().await;
    let server = serve_once(listener, vec!["abc123 |END|\r\n"]);

    let connector = tcp_connector(1);
    let mut rx = connector.subscribe();

    let err = connector.send("PING").await.unwrap_err();
    assert!(matches!(err, ConnectorError::InvalidState { .. }));

    connector.connect("127.0.0.1", port).unwrap();
    assert_eq!(
        next_event(&mut rx, WAIT).await,
        ConnectorEvent::Reconnecting { attempt: 1 }
    );
    assert_eq!(next_event(&mut rx, WAIT).await, ConnectorEvent::Connected);

    connector.send("PING").await.unwrap();
    let mut socket = server.await.unwrap();
    let mut received = [0u8; 9];
    tokio::time::timeout(WAIT, socket.read_exact(&mut received))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&received, b"PING|END|");

    connector.disconnect().await.unwrap();
    assert_eq!(next_event(&mut rx, WAIT).await, ConnectorEvent::Disconnected);

    // The client closed its side
    let mut rest = Vec::new();
    let read = tokio::time::timeout(WAIT, socket.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read, 0);
}

#[tokio::test]
async fn test_disconnect_during_handshake() {
    init_tracing();
    let (listener, port) = listener().await;
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(socket);
    });

    let connector = Connector::tcp_with_config(
        ConnectorConfig::new().with_timeouts(TimeoutConfig::unlimited()),
    )
    .unwrap();
    let mut rx = connector.subscribe();
    connector.connect("127.0.0.1", port).unwrap();
    assert_eq!(
        next_event(&mut rx, WAIT).await,
        ConnectorEvent::Reconnecting { attempt: 1 }
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    tokio::time::timeout(WAIT, connector.disconnect())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(connector.state(), ConnectionState::Disconnected);
    assert_eq!(next_event(&mut rx, WAIT).await, ConnectorEvent::Disconnected);
    assert_quiet(&mut rx, QUIET).await;

    connector.disconnect().await.unwrap();
    assert_quiet(&mut rx, QUIET).await;
    server.abort();
}
