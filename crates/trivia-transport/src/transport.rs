//! The session transport contract.

use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use trivia_core::ConnectionState;

/// A named event as it came off the wire, before decoding.
#[derive(Clone, Debug, PartialEq)]
pub struct RawEvent {
    /// Event name.
    pub name: String,
    /// Event payload.
    pub payload: Value,
}

impl RawEvent {
    /// Build an event.
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// One persistent bidirectional connection to a game server.
///
/// Implementations never surface errors through these methods. Failures show
/// up as a [`ConnectionState`] transition plus a log line.
pub trait Transport: Send + Sync {
    /// Connection state feed. The current value is readable immediately.
    ///
    /// The feed closes once the transport has stopped for good: after
    /// [`Transport::disconnect`], a server-side close, or when reconnecting
    /// is off or has given up.
    fn state(&self) -> watch::Receiver<ConnectionState>;

    /// Number of connections established so far.
    ///
    /// Bumped before the state turns `Connected`, so two connections are
    /// told apart even when the drop between them was never observed.
    fn connection_epoch(&self) -> u64;

    /// Feed of every inbound event.
    ///
    /// Only events delivered after subscribing are seen.
    fn subscribe(&self) -> broadcast::Receiver<RawEvent>;

    /// Feed of inbound events named `event`.
    fn on(&self, event: &str) -> EventSubscription {
        EventSubscription::new(event, self.subscribe())
    }

    /// Send a named event without waiting for acknowledgement.
    ///
    /// Events sent through one transport keep their order.
    fn emit(&self, event: &str, payload: Value);

    /// Close the connection and stop reconnecting. Idempotent.
    fn disconnect(&self);
}

/// Inbound payloads of a single named event.
pub struct EventSubscription {
    name: String,
    rx: broadcast::Receiver<RawEvent>,
}

impl EventSubscription {
    /// Filter `rx` down to events named `name`.
    pub fn new(name: impl Into<String>, rx: broadcast::Receiver<RawEvent>) -> Self {
        Self {
            name: name.into(),
            rx,
        }
    }

    /// Event name this subscription follows.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the next matching payload.
    ///
    /// Returns `None` once the transport is gone.
    pub async fn recv(&mut self) -> Option<Value> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.name == self.name => return Some(event.payload),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(event = %self.name, skipped, "subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
