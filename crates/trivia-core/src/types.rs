//! Session data model.
//!
//! Everything here is plain data. Ownership of the live values sits with the
//! session state machine and the transport; these types only describe them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::GameCode;
use crate::lenient;

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Who the local participant is within one session.
///
/// Fixed for the lifetime of the session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    /// Code of the game being created or joined.
    pub game_code: GameCode,
    /// Whether this participant created the game and may start it.
    pub is_host: bool,
    /// Topic chosen by the host. Empty for joining participants.
    #[serde(default)]
    pub topic_id: String,
    /// Category chosen by the host. Empty for joining participants.
    #[serde(default)]
    pub category_id: String,
    /// Display name of the local participant.
    pub participant_name: String,
}

impl SessionIdentity {
    /// Identity of a host creating `game_code` on the given topic.
    #[must_use]
    pub fn host(
        game_code: GameCode,
        participant_name: impl Into<String>,
        topic_id: impl Into<String>,
        category_id: impl Into<String>,
    ) -> Self {
        Self {
            game_code,
            is_host: true,
            topic_id: topic_id.into(),
            category_id: category_id.into(),
            participant_name: participant_name.into(),
        }
    }

    /// Identity of a participant joining `game_code` without a known topic.
    #[must_use]
    pub fn guest(game_code: GameCode, participant_name: impl Into<String>) -> Self {
        Self {
            game_code,
            is_host: false,
            topic_id: String::new(),
            category_id: String::new(),
            participant_name: participant_name.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rounds
// ─────────────────────────────────────────────────────────────────────────────

/// One question broadcast to every participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRound {
    /// Server-assigned question id.
    pub id: i64,
    /// Optional illustration.
    pub image_url: Option<String>,
    /// The four answer options, in display order.
    pub options: [String; 4],
    /// Text of the correct option.
    pub correct_answer: String,
    /// Topic the question belongs to.
    pub topic_id: String,
}

impl QuestionRound {
    /// Whether `option` is the correct answer.
    pub fn is_correct(&self, option: &str) -> bool {
        option == self.correct_answer
    }

    /// Option text by 1-based position, as shown to players.
    pub fn option_at(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.options.get(i))
            .map(String::as_str)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// The local participant's final score record, submitted once at session end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalResult {
    /// Topic the game was played on.
    pub topic_id: String,
    /// Code of the finished game.
    #[serde(rename = "code")]
    pub game_code: GameCode,
    /// Final score. Travels as a decimal string.
    #[serde(
        serialize_with = "lenient::serialize_score",
        deserialize_with = "lenient::deserialize_score"
    )]
    pub player_score: u32,
    /// Display name of the participant.
    pub player_name: String,
}

/// One line of the ranked participant list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// Participant display name.
    pub player_name: String,
    /// Participant score.
    #[serde(
        serialize_with = "lenient::serialize_score",
        deserialize_with = "lenient::deserialize_score"
    )]
    pub player_score: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// State enums
// ─────────────────────────────────────────────────────────────────────────────

/// Life-cycle phase of a session from the local participant's view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    /// Created, not yet connected.
    #[default]
    Idle,
    /// Joined, waiting for the host to start.
    AwaitingPeers,
    /// A question is live.
    InQuestion,
    /// The current question is resolved; waiting for the next one.
    AwaitingNextQuestion,
    /// The game is over and the score is being submitted.
    Ending,
    /// Terminal.
    Finished,
}

impl SessionPhase {
    /// Whether the session has reached its terminal phase.
    pub fn is_terminal(self) -> bool {
        self == Self::Finished
    }

    /// Whether the session is between joining and the end of the game.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::AwaitingPeers | Self::InQuestion | Self::AwaitingNextQuestion
        )
    }

    /// Stable lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingPeers => "awaiting_peers",
            Self::InQuestion => "in_question",
            Self::AwaitingNextQuestion => "awaiting_next_question",
            Self::Ending => "ending",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the persistent connection, as reported by the transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Handshake complete.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
