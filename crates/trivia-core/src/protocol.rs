//! Game event protocol.
//!
//! Outbound events are built from typed payloads and only turned into a
//! name plus JSON at the transport boundary. Inbound events are decoded once,
//! right where they leave the transport, into [`InboundMessage`]; nothing past
//! that point matches on event-name strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProtocolError;
use crate::lenient;
use crate::types::{QuestionRound, SessionIdentity};

/// Event names as the game server spells them.
pub mod events {
    /// Outbound: announce presence after connecting.
    pub const JOINED: &str = "joined";
    /// Outbound: host asks the server to start the round.
    pub const START_GAME: &str = "start game";
    /// Outbound: host registers itself as a ready guest.
    pub const ADD_GUEST: &str = "add guest";
    /// Outbound: graceful exit.
    pub const LEAVE: &str = "leave";
    /// Inbound: a guest is ready and play is starting.
    pub const GUEST_ADDED: &str = "guest added";
    /// Inbound: a new question.
    pub const QUESTION: &str = "question";
    /// Inbound: the game is over.
    pub const END: &str = "end";
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────────────────────────────────────

/// How outbound payload objects are placed on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    /// The object is serialized to a JSON string first.
    #[default]
    String,
    /// The object is sent as-is.
    Object,
}

/// Payload of `joined`, `start game`, and `add guest`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    /// Participant display name.
    pub name: String,
    /// Game being joined.
    pub game_code: String,
    /// Whether the sender is the host.
    pub is_host: bool,
    /// Topic id, empty when unknown.
    pub topic: String,
    /// Bearer token of the participant.
    pub token: String,
}

impl JoinPayload {
    /// Build the payload for `identity` authenticated by `token`.
    pub fn new(identity: &SessionIdentity, token: &str) -> Self {
        Self {
            name: identity.participant_name.clone(),
            game_code: identity.game_code.as_str().to_string(),
            is_host: identity.is_host,
            topic: identity.topic_id.clone(),
            token: token.to_string(),
        }
    }
}

/// Payload of `leave`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeavePayload {
    /// Participant display name.
    pub name: String,
    /// Game being left.
    pub game_code: String,
}

impl LeavePayload {
    /// Build the payload for `identity`.
    pub fn new(identity: &SessionIdentity) -> Self {
        Self {
            name: identity.participant_name.clone(),
            game_code: identity.game_code.as_str().to_string(),
        }
    }
}

/// An event the client sends to the game server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundEvent {
    /// Announce presence.
    Joined(JoinPayload),
    /// Host starts the round.
    StartGame(JoinPayload),
    /// Host registers as a ready guest.
    AddGuest(JoinPayload),
    /// Graceful exit.
    Leave(LeavePayload),
}

impl OutboundEvent {
    /// Wire event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Joined(_) => events::JOINED,
            Self::StartGame(_) => events::START_GAME,
            Self::AddGuest(_) => events::ADD_GUEST,
            Self::Leave(_) => events::LEAVE,
        }
    }

    /// Payload as a JSON object.
    pub fn payload(&self) -> Value {
        let result = match self {
            Self::Joined(p) | Self::StartGame(p) | Self::AddGuest(p) => serde_json::to_value(p),
            Self::Leave(p) => serde_json::to_value(p),
        };
        // Plain string/bool structs always serialize.
        result.unwrap_or(Value::Null)
    }

    /// Payload as it should be placed on the wire.
    pub fn encode_payload(&self, encoding: PayloadEncoding) -> Value {
        let object = self.payload();
        match encoding {
            PayloadEncoding::Object => object,
            PayloadEncoding::String => Value::String(object.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────────────────────────

/// A decoded event from the game server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundMessage {
    /// A guest is ready; play begins.
    GuestAdded(Value),
    /// A new question supersedes the previous one.
    Question(QuestionRound),
    /// The game is over.
    End(Value),
}

impl InboundMessage {
    /// Wire event name this message was decoded from.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::GuestAdded(_) => events::GUEST_ADDED,
            Self::Question(_) => events::QUESTION,
            Self::End(_) => events::END,
        }
    }
}

/// Decode a named event into an [`InboundMessage`].
///
/// Returns `Ok(None)` for event names the client does not handle. Payloads
/// may arrive as JSON objects or as strings holding a JSON object.
pub fn decode_inbound(event: &str, payload: Value) -> Result<Option<InboundMessage>, ProtocolError> {
    let payload = unwrap_stringified(payload);
    let message = match event {
        events::GUEST_ADDED => InboundMessage::GuestAdded(payload),
        events::QUESTION => InboundMessage::Question(decode_question(payload)?),
        events::END => InboundMessage::End(payload),
        _ => return Ok(None),
    };
    Ok(Some(message))
}

fn unwrap_stringified(payload: Value) -> Value {
    if let Value::String(ref s) = payload {
        if let Ok(inner @ (Value::Object(_) | Value::Array(_))) = serde_json::from_str::<Value>(s) {
            return inner;
        }
    }
    payload
}

#[derive(Deserialize)]
struct WireQuestion {
    #[serde(rename = "ID", default)]
    id: i64,
    #[serde(default)]
    image_url: Option<String>,
    option1: Option<String>,
    option2: Option<String>,
    option3: Option<String>,
    option4: Option<String>,
    answer: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    topic_id: Option<String>,
}

fn decode_question(payload: Value) -> Result<QuestionRound, ProtocolError> {
    if !payload.is_object() {
        return Err(ProtocolError::MalformedPayload {
            event: events::QUESTION.into(),
            reason: "expected a JSON object".into(),
        });
    }
    let wire: WireQuestion =
        serde_json::from_value(payload).map_err(|e| ProtocolError::MalformedPayload {
            event: events::QUESTION.into(),
            reason: e.to_string(),
        })?;

    let required = |value: Option<String>, field: &'static str| {
        value.ok_or_else(|| ProtocolError::MissingField {
            event: events::QUESTION.into(),
            field,
        })
    };

    Ok(QuestionRound {
        id: wire.id,
        image_url: wire.image_url.filter(|url| !url.is_empty()),
        options: [
            required(wire.option1, "option1")?,
            required(wire.option2, "option2")?,
            required(wire.option3, "option3")?,
            required(wire.option4, "option4")?,
        ],
        correct_answer: required(wire.answer, "answer")?,
        topic_id: wire.topic_id.unwrap_or_default(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
