//! Engine.IO v4 / Socket.IO v5 packet framing over WebSocket text frames.
//!
//! Each text frame starts with an Engine.IO packet type digit. Message
//! packets (`4`) carry a Socket.IO packet whose own type digit follows, so an
//! event is `42["name", payload]`. Binary attachments and custom namespaces
//! are not used by the game server and are not supported.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use trivia_core::{ProtocolError, TransportError};

/// Path of the Socket.IO endpoint on the server.
pub const SOCKET_IO_PATH: &str = "/socket.io/";

/// Engine.IO open handshake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Engine.IO session id.
    pub sid: String,
    /// Transports the server could upgrade to.
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Server ping period in ms.
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    /// Grace period after a missed ping in ms.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
    /// Largest payload the server accepts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

fn default_ping_interval() -> u64 {
    25_000
}
fn default_ping_timeout() -> u64 {
    20_000
}

impl Handshake {
    /// How long the connection may stay silent before it is considered lost.
    pub fn liveness_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

/// One decoded frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    /// `0`: Engine.IO open.
    Open(Handshake),
    /// `1`: Engine.IO close.
    Close,
    /// `2`: server heartbeat.
    Ping,
    /// `3`: heartbeat reply.
    Pong,
    /// `5`: transport upgrade.
    Upgrade,
    /// `6`: no-op.
    Noop,
    /// `40`: namespace connect (request or acknowledgement).
    Connect(Option<Value>),
    /// `41`: namespace disconnect.
    Disconnect,
    /// `42`: named event.
    Event {
        /// Event name.
        name: String,
        /// First event argument, `Null` when absent.
        payload: Value,
    },
    /// `43`: acknowledgement.
    Ack,
    /// `44`: namespace connect refused.
    ConnectError(Value),
}

impl Packet {
    /// Build an event packet.
    pub fn event(name: impl Into<String>, payload: Value) -> Self {
        Self::Event {
            name: name.into(),
            payload,
        }
    }

    /// Decode one text frame.
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| ProtocolError::MalformedPacket("empty frame".into()))?;
        let rest = chars.as_str();
        match kind {
            '0' => serde_json::from_str(rest)
                .map(Self::Open)
                .map_err(|e| ProtocolError::MalformedPacket(format!("open: {e}"))),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping),
            '3' => Ok(Self::Pong),
            '4' => decode_message(rest),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(ProtocolError::MalformedPacket(format!(
                "unknown packet type {other:?}"
            ))),
        }
    }

    /// Encode as a text frame.
    pub fn encode(&self) -> String {
        match self {
            Self::Open(handshake) => {
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            Self::Close => "1".into(),
            Self::Ping => "2".into(),
            Self::Pong => "3".into(),
            Self::Upgrade => "5".into(),
            Self::Noop => "6".into(),
            Self::Connect(None) => "40".into(),
            Self::Connect(Some(data)) => format!("40{data}"),
            Self::Disconnect => "41".into(),
            Self::Event { name, payload } => {
                let args = if payload.is_null() {
                    serde_json::json!([name])
                } else {
                    serde_json::json!([name, payload])
                };
                format!("42{args}")
            }
            Self::Ack => "43[]".into(),
            Self::ConnectError(data) => format!("44{data}"),
        }
    }
}

fn decode_message(body: &str) -> Result<Packet, ProtocolError> {
    let mut chars = body.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ProtocolError::MalformedPacket("empty message packet".into()))?;
    let rest = strip_namespace(chars.as_str());
    match kind {
        '0' => Ok(Packet::Connect(parse_optional_json(rest)?)),
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(rest.trim_start_matches(|c: char| c.is_ascii_digit())),
        '3' => Ok(Packet::Ack),
        '4' => Ok(Packet::ConnectError(
            parse_optional_json(rest)?.unwrap_or(Value::Null),
        )),
        '5' | '6' => Err(ProtocolError::MalformedPacket(
            "binary packets are not supported".into(),
        )),
        other => Err(ProtocolError::MalformedPacket(format!(
            "unknown message type {other:?}"
        ))),
    }
}

/// Drop a leading `/namespace,` if present.
fn strip_namespace(rest: &str) -> &str {
    if rest.starts_with('/') {
        rest.split_once(',').map_or("", |(_, tail)| tail)
    } else {
        rest
    }
}

fn parse_optional_json(rest: &str) -> Result<Option<Value>, ProtocolError> {
    if rest.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(rest)
        .map(Some)
        .map_err(|e| ProtocolError::MalformedPacket(e.to_string()))
}

fn decode_event(rest: &str) -> Result<Packet, ProtocolError> {
    let value: Value = serde_json::from_str(rest)
        .map_err(|e| ProtocolError::MalformedPacket(format!("event: {e}")))?;
    let Value::Array(mut args) = value else {
        return Err(ProtocolError::MalformedPacket(
            "event arguments are not an array".into(),
        ));
    };
    if args.is_empty() {
        return Err(ProtocolError::MalformedPacket("event without a name".into()));
    }
    let Value::String(name) = args.remove(0) else {
        return Err(ProtocolError::MalformedPacket("event name is not a string".into()));
    };
    let payload = if args.is_empty() {
        Value::Null
    } else {
        args.swap_remove(0)
    };
    Ok(Packet::Event { name, payload })
}

/// Build the WebSocket endpoint for a server base URL.
///
/// `http`/`https` map to `ws`/`wss`; `secure` forces `wss`. Any path on the
/// base URL is replaced by the Socket.IO path.
pub fn endpoint_url(base: &str, secure: bool) -> Result<String, TransportError> {
    let invalid = |reason: &str| TransportError::InvalidUrl {
        url: base.to_string(),
        reason: reason.to_string(),
    };

    let (scheme, rest) = base
        .trim()
        .split_once("://")
        .ok_or_else(|| invalid("missing scheme"))?;
    let tls = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => secure,
        "https" | "wss" => true,
        _ => return Err(invalid("unsupported scheme")),
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if authority.is_empty() {
        return Err(invalid("missing host"));
    }

    let ws_scheme = if tls { "wss" } else { "ws" };
    Ok(format!(
        "{ws_scheme}://{authority}{SOCKET_IO_PATH}?EIO=4&transport=websocket"
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn decodes_open_handshake() {
        let frame = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
        let packet = Packet::decode(frame).unwrap();
        let Packet::Open(h) = packet else {
            panic!("expected open");
        };
        assert_eq!(h.sid, "abc");
        assert_eq!(h.liveness_window().as_millis(), 45_000);
    }

    #[test]
    fn open_defaults_ping_timings() {
        let Packet::Open(h) = Packet::decode(r#"0{"sid":"x"}"#).unwrap() else {
            panic!("expected open");
        };
        assert_eq!(h.ping_interval, 25_000);
        assert_eq!(h.ping_timeout, 20_000);
    }

    #[test]
    fn decodes_heartbeat_and_control() {
        assert_eq!(Packet::decode("2").unwrap(), Packet::Ping);
        assert_eq!(Packet::decode("3").unwrap(), Packet::Pong);
        assert_eq!(Packet::decode("1").unwrap(), Packet::Close);
        assert_eq!(Packet::decode("6").unwrap(), Packet::Noop);
        assert_eq!(Packet::decode("41").unwrap(), Packet::Disconnect);
    }

    #[test]
    fn decodes_connect_ack_with_sid() {
        let packet = Packet::decode(r#"40{"sid":"ns-sid"}"#).unwrap();
        assert_matches!(packet, Packet::Connect(Some(v)) if v["sid"] == "ns-sid");
        assert_eq!(Packet::decode("40").unwrap(), Packet::Connect(None));
    }

    #[test]
    fn decodes_connect_error() {
        let packet = Packet::decode(r#"44{"message":"Not authorized"}"#).unwrap();
        assert_matches!(packet, Packet::ConnectError(v) if v["message"] == "Not authorized");
    }

    #[test]
    fn decodes_event_with_object_payload() {
        let packet = Packet::decode(r#"42["question",{"ID":1}]"#).unwrap();
        assert_eq!(packet, Packet::event("question", json!({"ID": 1})));
    }

    #[test]
    fn decodes_event_without_payload() {
        let packet = Packet::decode(r#"42["end"]"#).unwrap();
        assert_eq!(packet, Packet::event("end", Value::Null));
    }

    #[test]
    fn decodes_event_with_ack_id_and_namespace() {
        let packet = Packet::decode(r#"42/game,17["guest added","Ada"]"#).unwrap();
        assert_eq!(packet, Packet::event("guest added", json!("Ada")));
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(Packet::decode("").is_err());
        assert!(Packet::decode("9").is_err());
        assert!(Packet::decode("42{}").is_err());
        assert!(Packet::decode("42[]").is_err());
        assert!(Packet::decode("42[1,2]").is_err());
        assert!(Packet::decode(r#"45["bin"]"#).is_err());
        assert!(Packet::decode("0not json").is_err());
    }

    #[test]
    fn encodes_control_packets() {
        assert_eq!(Packet::Pong.encode(), "3");
        assert_eq!(Packet::Connect(None).encode(), "40");
        assert_eq!(Packet::Disconnect.encode(), "41");
    }

    #[test]
    fn encodes_event_with_string_payload() {
        let frame = Packet::event("leave", json!("{\"name\":\"Ada\"}")).encode();
        assert_eq!(frame, r#"42["leave","{\"name\":\"Ada\"}"]"#);
        assert_eq!(
            Packet::decode(&frame).unwrap(),
            Packet::event("leave", json!("{\"name\":\"Ada\"}"))
        );
    }

    #[test]
    fn endpoint_maps_http_to_ws() {
        assert_eq!(
            endpoint_url("http://127.0.0.1:8000", false).unwrap(),
            "ws://127.0.0.1:8000/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn endpoint_maps_https_to_wss_and_drops_path() {
        assert_eq!(
            endpoint_url("https://trivia.example/app/", false).unwrap(),
            "wss://trivia.example/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn endpoint_secure_forces_wss() {
        assert!(
            endpoint_url("http://trivia.example", true)
                .unwrap()
                .starts_with("wss://")
        );
    }

    #[test]
    fn endpoint_rejects_bad_urls() {
        assert_matches!(
            endpoint_url("trivia.example", false),
            Err(TransportError::InvalidUrl { .. })
        );
        assert_matches!(
            endpoint_url("ftp://trivia.example", false),
            Err(TransportError::InvalidUrl { .. })
        );
        assert_matches!(
            endpoint_url("http:///path", false),
            Err(TransportError::InvalidUrl { .. })
        );
    }
}
