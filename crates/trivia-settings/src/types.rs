//! Settings types.
//!
//! Every struct uses camelCase JSON keys and `#[serde(default)]`, so a user
//! file only needs the keys it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use trivia_core::{PayloadEncoding, PollPolicy, ReconnectPolicy};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriviaSettings {
    /// Server endpoints.
    pub server: ServerSettings,
    /// Socket transport behavior.
    pub transport: TransportSettings,
    /// Game rules.
    pub game: GameSettings,
    /// Ranking retrieval.
    pub ranking: RankingSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Game server endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Base URL of the REST API.
    pub api_base_url: String,
    /// Base URL of the realtime socket server.
    pub socket_url: String,
    /// Per-request timeout for REST calls in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            socket_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl ServerSettings {
    /// REST request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Realtime transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportSettings {
    /// Reconnect automatically after the connection drops.
    pub reconnect: bool,
    /// Force a TLS (`wss`) connection.
    pub secure: bool,
    /// Reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,
    /// Base reconnect delay in milliseconds.
    pub reconnect_base_delay_ms: u64,
    /// Reconnect delay cap in milliseconds.
    pub reconnect_max_delay_ms: u64,
    /// Timeout for opening the socket and completing the handshake.
    pub connect_timeout_ms: u64,
    /// How outbound payload objects are placed on the wire.
    pub payload_encoding: PayloadEncoding,
    /// Inbound event buffer per subscriber.
    pub event_buffer_capacity: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            reconnect: true,
            secure: false,
            max_reconnect_attempts: 5,
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 5_000,
            connect_timeout_ms: 10_000,
            payload_encoding: PayloadEncoding::String,
            event_buffer_capacity: 64,
        }
    }
}

impl TransportSettings {
    /// Backoff policy derived from these settings.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_reconnect_attempts,
            base_delay_ms: self.reconnect_base_delay_ms,
            max_delay_ms: self.reconnect_max_delay_ms,
            ..ReconnectPolicy::default()
        }
    }

    /// Connect and handshake timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Scoring and timing rules.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameSettings {
    /// Countdown start value for every question.
    pub countdown_seconds: u32,
    /// Points awarded for a correct first answer.
    pub correct_answer_points: u32,
    /// Countdown tick period in milliseconds.
    pub tick_interval_ms: u64,
    /// Re-send `joined` when the connection comes back mid-session.
    pub rejoin_on_reconnect: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            countdown_seconds: 5,
            correct_answer_points: 10,
            tick_interval_ms: 1_000,
            rejoin_on_reconnect: true,
        }
    }
}

impl GameSettings {
    /// Countdown tick period.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Ranking retrieval settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankingSettings {
    /// Delay between fetches while the list is empty, in milliseconds.
    pub poll_interval_ms: u64,
    /// Fetch ceiling before the ranking is reported unavailable.
    pub max_attempts: u32,
}

impl Default for RankingSettings {
    fn default() -> Self {
        let policy = PollPolicy::default();
        Self {
            poll_interval_ms: policy.interval_ms,
            max_attempts: policy.max_attempts,
        }
    }
}

impl RankingSettings {
    /// Poll policy derived from these settings.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval_ms: self.poll_interval_ms,
            max_attempts: self.max_attempts,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit newline-delimited JSON instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: trivia_core::logging::DEFAULT_LEVEL.to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let s = TriviaSettings::default();
        assert_eq!(s.game.countdown_seconds, 5);
        assert_eq!(s.game.correct_answer_points, 10);
        assert_eq!(s.game.tick_interval(), Duration::from_secs(1));
        assert!(s.game.rejoin_on_reconnect);
        assert!(s.transport.reconnect);
        assert!(!s.transport.secure);
        assert_eq!(s.transport.payload_encoding, PayloadEncoding::String);
        assert_eq!(s.ranking.poll_interval_ms, 1_000);
        assert_eq!(s.ranking.max_attempts, 30);
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(TriviaSettings::default()).unwrap();
        assert!(json["server"]["apiBaseUrl"].is_string());
        assert!(json["transport"]["maxReconnectAttempts"].is_number());
        assert!(json["game"]["correctAnswerPoints"].is_number());
        assert_eq!(json["transport"]["payloadEncoding"], "string");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: TriviaSettings =
            serde_json::from_str(r#"{"game": {"countdownSeconds": 8}}"#).unwrap();
        assert_eq!(s.game.countdown_seconds, 8);
        assert_eq!(s.game.correct_answer_points, 10);
        assert_eq!(s.ranking.max_attempts, 30);
    }

    #[test]
    fn derived_policies() {
        let mut s = TriviaSettings::default();
        s.transport.max_reconnect_attempts = 2;
        s.ranking.poll_interval_ms = 250;
        s.ranking.max_attempts = 4;

        let reconnect = s.transport.reconnect_policy();
        assert_eq!(reconnect.max_attempts, 2);
        assert_eq!(reconnect.base_delay_ms, 500);

        let poll = s.ranking.poll_policy();
        assert_eq!(poll.interval(), Duration::from_millis(250));
        assert_eq!(poll.max_attempts, 4);
    }
}
