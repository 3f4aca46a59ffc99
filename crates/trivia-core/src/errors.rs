//! Error taxonomy shared across the session crates.
//!
//! - [`TransportError`]: the persistent connection could not be opened or used
//! - [`ProtocolError`]: a frame or event payload could not be decoded
//! - [`SubmissionError`]: the final score could not be submitted
//!
//! Transport and protocol errors stay inside the crates that produce them and
//! become state changes plus log lines. Only [`SubmissionError`] is meant to
//! be shown to a player.

use thiserror::Error;

/// Failure to open or use the persistent connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server URL could not be turned into a socket endpoint.
    #[error("invalid server URL {url}: {reason}")]
    InvalidUrl {
        /// URL as configured.
        url: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The WebSocket connection could not be established.
    #[error("connect to {url} failed: {reason}")]
    Connect {
        /// Endpoint that was dialled.
        url: String,
        /// Underlying cause.
        reason: String,
    },

    /// The socket opened but the session handshake did not complete.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// A frame could not be written.
    #[error("send failed: {0}")]
    Send(String),

    /// The connection is closed.
    #[error("connection closed")]
    Closed,
}

/// A frame or event payload the client could not make sense of.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The raw frame does not follow the packet framing.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// The event payload is not the expected JSON shape.
    #[error("malformed `{event}` payload: {reason}")]
    MalformedPayload {
        /// Event name.
        event: String,
        /// Decoder message.
        reason: String,
    },

    /// A required field is absent.
    #[error("`{event}` payload is missing `{field}`")]
    MissingField {
        /// Event name.
        event: String,
        /// Missing field name.
        field: &'static str,
    },
}

/// The score submission request failed.
///
/// The message is meant for display.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SubmissionError {
    /// User-facing failure text.
    pub message: String,
}

impl SubmissionError {
    /// Wrap a failure message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
