//! In-process loopback transport.
//!
//! [`MemoryTransport`] implements [`Transport`] without a network; the paired
//! [`MemoryServer`] plays the game server: it drives the connection state,
//! pushes inbound events, and observes what the client emitted. Closing the
//! server ends the state feed the way a transport that gave up would.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use trivia_core::ConnectionState;

use crate::transport::{RawEvent, Transport};

struct Shared {
    /// `None` once the server has closed.
    state_tx: Mutex<Option<watch::Sender<ConnectionState>>>,
    epoch: AtomicU64,
    events_tx: broadcast::Sender<RawEvent>,
    emitted_tx: mpsc::UnboundedSender<RawEvent>,
    emitted: Mutex<Vec<RawEvent>>,
    disconnects: AtomicUsize,
}

/// Client side of the loopback.
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

/// Server side of the loopback.
pub struct MemoryServer {
    shared: Arc<Shared>,
    emitted_rx: mpsc::UnboundedReceiver<RawEvent>,
}

impl MemoryTransport {
    /// Create a disconnected transport and its server side.
    pub fn pair(event_buffer: usize) -> (Self, MemoryServer) {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, _) = broadcast::channel(event_buffer.max(1));
        let (emitted_tx, emitted_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            state_tx: Mutex::new(Some(state_tx)),
            epoch: AtomicU64::new(0),
            events_tx,
            emitted_tx,
            emitted: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
        });
        (
            Self {
                shared: shared.clone(),
            },
            MemoryServer { shared, emitted_rx },
        )
    }
}

impl Shared {
    fn current(&self) -> ConnectionState {
        self.state_tx
            .lock()
            .as_ref()
            .map_or(ConnectionState::Disconnected, |tx| *tx.borrow())
    }

    fn publish(&self, state: ConnectionState) {
        if let Some(tx) = self.state_tx.lock().as_ref() {
            if state == ConnectionState::Connected {
                let _ = self.epoch.fetch_add(1, Ordering::SeqCst);
            }
            let _ = tx.send_replace(state);
        }
    }
}

impl Transport for MemoryTransport {
    fn state(&self) -> watch::Receiver<ConnectionState> {
        match self.shared.state_tx.lock().as_ref() {
            Some(tx) => tx.subscribe(),
            None => watch::channel(ConnectionState::Disconnected).1,
        }
    }

    fn connection_epoch(&self) -> u64 {
        self.shared.epoch.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<RawEvent> {
        self.shared.events_tx.subscribe()
    }

    fn emit(&self, event: &str, payload: Value) {
        if self.shared.current() != ConnectionState::Connected {
            tracing::warn!(event, "not connected, dropping event");
            return;
        }
        let event = RawEvent::new(event, payload);
        self.shared.emitted.lock().push(event.clone());
        let _ = self.shared.emitted_tx.send(event);
    }

    fn disconnect(&self) {
        let _ = self.shared.disconnects.fetch_add(1, Ordering::Relaxed);
        self.shared.publish(ConnectionState::Disconnected);
    }
}

impl MemoryServer {
    /// Move the client through `Connecting` to `Connected`.
    pub fn accept(&self) {
        self.set_state(ConnectionState::Connecting);
        self.set_state(ConnectionState::Connected);
    }

    /// Drop the connection as a network failure would.
    pub fn drop_connection(&self) {
        self.set_state(ConnectionState::Disconnected);
    }

    /// Set the connection state directly. Entering `Connected` starts a new
    /// connection epoch. No effect once closed.
    pub fn set_state(&self, state: ConnectionState) {
        self.shared.publish(state);
    }

    /// Give up for good: disconnect and end the state feed.
    pub fn close(&self) {
        if let Some(tx) = self.shared.state_tx.lock().take() {
            let _ = tx.send_replace(ConnectionState::Disconnected);
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.current()
    }

    /// Deliver an event to every current subscriber. Returns how many saw it.
    pub fn push(&self, event: &str, payload: Value) -> usize {
        self.shared
            .events_tx
            .send(RawEvent::new(event, payload))
            .unwrap_or(0)
    }

    /// Everything the client has emitted so far.
    pub fn emitted(&self) -> Vec<RawEvent> {
        self.shared.emitted.lock().clone()
    }

    /// Names of everything the client has emitted so far.
    pub fn emitted_names(&self) -> Vec<String> {
        self.shared
            .emitted
            .lock()
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    /// Wait for the next emitted event.
    pub async fn next_emitted(&mut self) -> Option<RawEvent> {
        self.emitted_rx.recv().await
    }

    /// How many times the client called `disconnect`.
    pub fn disconnect_calls(&self) -> usize {
        self.shared.disconnects.load(Ordering::Relaxed)
    }
}
