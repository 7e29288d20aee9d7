//! Connector notifications and their fan-out.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Lifecycle and data notifications raised by a connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectorEvent {
    /// The handshake completed and the session is established.
    Connected,
    /// An open + handshake attempt is starting (1-indexed).
    Reconnecting {
        /// Attempt number within the current `connect` call
        attempt: u32,
    },
    /// The connector reached `Disconnected`; raised once per `connect` call.
    Disconnected,
    /// A complete delimiter-terminated message, delimiter excluded.
    Message {
        /// Decoded ASCII text
        text: String,
    },
}

impl ConnectorEvent {
    /// Whether this notification ends the current run.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

/// Receives connector notifications synchronously, in emission order.
///
/// Handlers run on the connector's worker (or on the task calling `send` /
/// `disconnect` for the final notification) and must not block.
pub trait ConnectorEventHandler: Send + Sync {
    /// Called once per notification.
    fn on_event(&self, event: &ConnectorEvent);
}

impl<F> ConnectorEventHandler for F
where
    F: Fn(&ConnectorEvent) + Send + Sync,
{
    fn on_event(&self, event: &ConnectorEvent) {
        self(event);
    }
}

/// Fans notifications out to registered handlers and broadcast subscribers.
pub struct EventDispatcher {
    sender: broadcast::Sender<ConnectorEvent>,
    handlers: RwLock<Vec<Arc<dyn ConnectorEventHandler>>>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handlers.read().len())
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl EventDispatcher {
    /// Create a dispatcher whose subscribers buffer up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// New receiver for every event emitted from now on.
    ///
    /// A receiver that falls more than `capacity` events behind observes
    /// `RecvError::Lagged` and skips ahead.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectorEvent> {
        self.sender.subscribe()
    }

    /// Register a handler; it sees every event emitted after registration.
    pub fn add_handler(&self, handler: Arc<dyn ConnectorEventHandler>) {
        self.handlers.write().push(handler);
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Deliver `event` to every handler in registration order, then to subscribers.
    pub fn emit(&self, event: ConnectorEvent) {
        // Snapshot so a handler may register further handlers
        let handlers = self.handlers.read().clone();
        for handler in &handlers {
            handler.on_event(&event);
        }

        trace!(?event, handlers = handlers.len(), "emitting connector event");
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_handlers_run_in_registration_order() {
        let dispatcher = EventDispatcher::new(8);
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            dispatcher.add_handler(Arc::new(move |event: &ConnectorEvent| {
                seen.lock().push((tag, event.clone()));
            }));
        }
        assert_eq!(dispatcher.handler_count(), 2);

        dispatcher.emit(ConnectorEvent::Connected);
        assert_eq!(
            *seen.lock(),
            vec![
                ("first", ConnectorEvent::Connected),
                ("second", ConnectorEvent::Connected),
            ]
        );
    }

    #[test]
    fn test_emit_without_observers() {
        let dispatcher = EventDispatcher::new(1);
        dispatcher.emit(ConnectorEvent::Disconnected);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let dispatcher = EventDispatcher::new(8);
        let mut rx = dispatcher.subscribe();

        dispatcher.emit(ConnectorEvent::Reconnecting { attempt: 1 });
        dispatcher.emit(ConnectorEvent::Connected);
        dispatcher.emit(ConnectorEvent::Message {
            text: "HELLO".into(),
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            ConnectorEvent::Reconnecting { attempt: 1 }
        );
        assert_eq!(rx.recv().await.unwrap(), ConnectorEvent::Connected);
        assert_eq!(
            rx.recv().await.unwrap(),
            ConnectorEvent::Message {
                text: "HELLO".into()
            }
        );
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&ConnectorEvent::Reconnecting { attempt: 2 }).unwrap();
        assert_eq!(json, r#"{"type":"reconnecting","attempt":2}"#);
        assert!(ConnectorEvent::Disconnected.is_terminal());
        assert!(!ConnectorEvent::Connected.is_terminal());
    }
}
