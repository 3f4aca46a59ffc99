//! # trivia-settings
//!
//! Configuration for the trivia client, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`TriviaSettings::default()`]
//! 2. **User file**: `~/.trivia/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `TRIVIA_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path, trivia_dir};
pub use types::*;
