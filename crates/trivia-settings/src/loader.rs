//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TriviaSettings::default()`]
//! 2. If `~/.trivia/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `TRIVIA_*` environment variable overrides (highest priority)
//! 4. Validate the endpoint URLs
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::TriviaSettings;

/// Resolve the client data directory (`~/.trivia`).
pub fn trivia_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".trivia")
}

/// Resolve the path to the settings file (`~/.trivia/settings.json`).
pub fn settings_path() -> PathBuf {
    trivia_dir().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TriviaSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<TriviaSettings> {
    let defaults = serde_json::to_value(TriviaSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: TriviaSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides(settings: &mut TriviaSettings) {
    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TRIVIA_API_URL") {
        settings.server.api_base_url = v;
    }
    if let Some(v) = read_env_string("TRIVIA_SOCKET_URL") {
        settings.server.socket_url = v;
    }

    // ── Transport ───────────────────────────────────────────────────
    if let Some(v) = read_env_bool("TRIVIA_RECONNECT") {
        settings.transport.reconnect = v;
    }
    if let Some(v) = read_env_bool("TRIVIA_SECURE") {
        settings.transport.secure = v;
    }

    // ── Game ────────────────────────────────────────────────────────
    if let Some(v) = read_env_u32("TRIVIA_COUNTDOWN_SECS", 1, 600) {
        settings.game.countdown_seconds = v;
    }
    if let Some(v) = read_env_u32("TRIVIA_POINTS", 1, 10_000) {
        settings.game.correct_answer_points = v;
    }

    // ── Ranking ─────────────────────────────────────────────────────
    if let Some(v) = read_env_u32("TRIVIA_RANKING_MAX_ATTEMPTS", 1, 10_000) {
        settings.ranking.max_attempts = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TRIVIA_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Reject endpoint URLs with an unusable scheme.
pub fn validate(settings: &TriviaSettings) -> Result<()> {
    let api = &settings.server.api_base_url;
    if !has_scheme(api, &["http://", "https://"]) {
        return Err(SettingsError::InvalidValue(format!(
            "server.apiBaseUrl must be an http(s) URL, got {api:?}"
        )));
    }
    let socket = &settings.server.socket_url;
    if !has_scheme(socket, &["http://", "https://", "ws://", "wss://"]) {
        return Err(SettingsError::InvalidValue(format!(
            "server.socketUrl must be an http(s) or ws(s) URL, got {socket:?}"
        )));
    }
    Ok(())
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    let lower = url.to_ascii_lowercase();
    schemes.iter().any(|s| lower.starts_with(s))
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    let val = std::env::var(name).ok()?;
    let result = parse_u32_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u32 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
