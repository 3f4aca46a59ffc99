//! WebSocket-backed Socket.IO transport.
//!
//! [`SocketClient::connect`] spawns a connection task that owns the socket.
//! The client handle talks to it over a command channel; inbound events fan
//! out over a broadcast channel and connection changes over a watch channel.
//!
//! ```text
//! Connecting ──open + 40──▶ Connected ──drop──▶ Disconnected ──backoff──▶ Connecting
//!                                      └─41 / disconnect()──▶ Disconnected (final)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trivia_core::{ConnectionState, ReconnectPolicy, TransportError};

use crate::socketio::{Handshake, Packet, endpoint_url};
use crate::transport::{RawEvent, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection options.
#[derive(Clone, Debug)]
pub struct ConnectOptions {
    /// Reconnect after an unexpected drop.
    pub reconnect: bool,
    /// Force TLS.
    pub secure: bool,
    /// Backoff between reconnect attempts.
    pub reconnect_policy: ReconnectPolicy,
    /// Limit on opening the socket plus the Socket.IO handshake.
    pub connect_timeout: Duration,
    /// Inbound event buffer per subscriber.
    pub event_buffer: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            reconnect: true,
            secure: false,
            reconnect_policy: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            event_buffer: 64,
        }
    }
}

enum Command {
    Emit { name: String, payload: Value },
    Disconnect,
}

/// Handle to one Socket.IO connection.
///
/// Dropping the handle disconnects.
pub struct SocketClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    events_tx: broadcast::Sender<RawEvent>,
    epoch: Arc<AtomicU64>,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

impl SocketClient {
    /// Start connecting to `server_url`.
    ///
    /// Returns immediately; progress is reported through [`Transport::state`].
    /// Must be called from within a tokio runtime.
    pub fn connect(server_url: &str, options: ConnectOptions) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (events_tx, _) = broadcast::channel(options.event_buffer.max(1));
        let epoch = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();

        let task = match endpoint_url(server_url, options.secure) {
            Ok(url) => {
                let actor = ConnectionTask {
                    url,
                    options,
                    cmd_rx,
                    state_tx,
                    events_tx: events_tx.clone(),
                    epoch: epoch.clone(),
                    cancel: cancel.clone(),
                };
                tokio::spawn(actor.run())
            }
            Err(error) => {
                warn!(%error, "not connecting");
                let _ = state_tx.send_replace(ConnectionState::Disconnected);
                tokio::spawn(async {})
            }
        };

        Self {
            cmd_tx,
            state_rx,
            events_tx,
            epoch,
            cancel,
            _task: task,
        }
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }
}

impl Transport for SocketClient {
    fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    fn connection_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<RawEvent> {
        self.events_tx.subscribe()
    }

    fn emit(&self, event: &str, payload: Value) {
        let cmd = Command::Emit {
            name: event.to_string(),
            payload,
        };
        if self.cmd_tx.send(cmd).is_err() {
            warn!(event, "connection task gone, dropping event");
        }
    }

    fn disconnect(&self) {
        // Queued behind pending emits so they still go out first.
        if self.cmd_tx.send(Command::Disconnect).is_err() {
            debug!("connection task already stopped");
        }
    }
}

impl Drop for SocketClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ─── Connection task ─────────────────────────────────────────────────────────

/// Why a connected session stopped.
#[derive(Debug)]
enum SessionEnd {
    /// The client asked to disconnect.
    Local,
    /// The server closed the session on purpose.
    Server,
    /// The connection failed.
    Lost(String),
}

struct ConnectionTask {
    url: String,
    options: ConnectOptions,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<RawEvent>,
    epoch: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl ConnectionTask {
    async fn run(mut self) {
        let mut failures: u32 = 0;

        loop {
            self.set_state(ConnectionState::Connecting);
            let Some(opened) = self.open_or_stop().await else {
                break;
            };

            match opened {
                Ok((ws, handshake)) => {
                    failures = 0;
                    let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
                    info!(url = %self.url, sid = %handshake.sid, epoch, "connected");
                    self.set_state(ConnectionState::Connected);
                    match self.pump(ws, &handshake).await {
                        SessionEnd::Local => {
                            info!("disconnected");
                            break;
                        }
                        SessionEnd::Server => {
                            info!("server closed the session");
                            break;
                        }
                        SessionEnd::Lost(reason) => warn!(%reason, "connection lost"),
                    }
                }
                Err(error) => warn!(%error, attempt = failures, "connect failed"),
            }

            self.set_state(ConnectionState::Disconnected);
            if !self.options.reconnect {
                break;
            }
            if failures >= self.options.reconnect_policy.max_attempts {
                warn!(attempts = failures, "giving up reconnecting");
                break;
            }
            let delay = self.options.reconnect_policy.delay_for(failures);
            failures += 1;
            debug!(?delay, attempt = failures, "reconnecting");
            if !self.wait_offline(delay).await {
                break;
            }
        }

        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    /// Open the connection unless asked to stop first. Emits issued while
    /// connecting are dropped.
    async fn open_or_stop(&mut self) -> Option<Result<(WsStream, Handshake), TransportError>> {
        let opening = open(&self.url, self.options.connect_timeout);
        tokio::pin!(opening);
        loop {
            tokio::select! {
                result = &mut opening => return Some(result),
                () = self.cancel.cancelled() => return None,
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Emit { name, .. }) => {
                        warn!(event = %name, "still connecting, dropping event");
                    }
                    Some(Command::Disconnect) | None => return None,
                },
            }
        }
    }

    /// Sleep out a backoff delay while offline. Returns `false` on shutdown.
    async fn wait_offline(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = &mut sleep => return true,
                () = self.cancel.cancelled() => return false,
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Emit { name, .. }) => {
                        warn!(event = %name, "not connected, dropping event");
                    }
                    Some(Command::Disconnect) | None => return false,
                },
            }
        }
    }

    /// Shuttle frames until the session ends.
    async fn pump(&mut self, ws: WsStream, handshake: &Handshake) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();
        let window = handshake.liveness_window();
        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                // Drain queued commands before honouring cancellation.
                biased;

                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Emit { name, payload }) => {
                        debug!(event = %name, "emit");
                        let frame = Packet::event(name, payload).encode();
                        if let Err(e) = sink.send(Message::Text(frame.into())).await {
                            return SessionEnd::Lost(e.to_string());
                        }
                    }
                    Some(Command::Disconnect) | None => {
                        close(&mut sink).await;
                        return SessionEnd::Local;
                    }
                },
                () = self.cancel.cancelled() => {
                    close(&mut sink).await;
                    return SessionEnd::Local;
                }
                () = &mut deadline => {
                    return SessionEnd::Lost("ping timeout".into());
                }
                msg = stream.next() => {
                    let msg = match msg {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                        None => return SessionEnd::Lost("stream ended".into()),
                    };
                    let text = match msg {
                        Message::Text(text) => text,
                        Message::Close(_) => return SessionEnd::Lost("closed by peer".into()),
                        _ => continue,
                    };
                    match Packet::decode(text.as_str()) {
                        Ok(Packet::Ping) => {
                            deadline.as_mut().reset(Instant::now() + window);
                            let pong = Message::Text(Packet::Pong.encode().into());
                            if let Err(e) = sink.send(pong).await {
                                return SessionEnd::Lost(e.to_string());
                            }
                        }
                        Ok(Packet::Event { name, payload }) => {
                            debug!(event = %name, "received");
                            // No subscribers is not an error.
                            let _ = self.events_tx.send(RawEvent { name, payload });
                        }
                        Ok(Packet::Disconnect | Packet::Close) => return SessionEnd::Server,
                        Ok(other) => debug!(?other, "ignoring packet"),
                        Err(error) => warn!(%error, "dropping malformed frame"),
                    }
                }
            }
        }
    }
}

async fn close<S>(sink: &mut S)
where
    S: futures::Sink<Message> + Unpin,
{
    let _ = sink
        .send(Message::Text(Packet::Disconnect.encode().into()))
        .await;
    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
}

/// Open the WebSocket and complete the Engine.IO and Socket.IO handshakes.
async fn open(url: &str, timeout: Duration) -> Result<(WsStream, Handshake), TransportError> {
    tokio::time::timeout(timeout, handshake(url))
        .await
        .map_err(|_| {
            TransportError::Handshake(format!("timed out after {}ms", timeout.as_millis()))
        })?
}

async fn handshake(url: &str) -> Result<(WsStream, Handshake), TransportError> {
    let (mut ws, _) = connect_async(url)
        .await
        .map_err(|e| TransportError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let open = loop {
        match next_packet(&mut ws).await? {
            Packet::Open(handshake) => break handshake,
            other => debug!(?other, "packet before open"),
        }
    };

    ws.send(Message::Text(Packet::Connect(None).encode().into()))
        .await
        .map_err(|e| TransportError::Send(e.to_string()))?;

    loop {
        match next_packet(&mut ws).await? {
            Packet::Connect(_) => break,
            Packet::ConnectError(data) => return Err(TransportError::Handshake(data.to_string())),
            Packet::Ping => ws
                .send(Message::Text(Packet::Pong.encode().into()))
                .await
                .map_err(|e| TransportError::Send(e.to_string()))?,
            other => debug!(?other, "packet before connect ack"),
        }
    }

    Ok((ws, open))
}

async fn next_packet(ws: &mut WsStream) -> Result<Packet, TransportError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return Packet::decode(text.as_str())
                    .map_err(|e| TransportError::Handshake(e.to_string()));
            }
            Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(TransportError::Handshake(e.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
