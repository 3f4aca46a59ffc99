//! Game code newtype.
//!
//! A game session is identified by a short code that players read aloud or
//! type. Codes are six distinct characters drawn from `A-Z0-9`.

use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Characters a generated code may contain.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of a generated code.
pub const CODE_LENGTH: usize = 6;

/// Human-shareable identifier of one game session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameCode(String);

impl GameCode {
    /// Generate a fresh code using the thread-local RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Generate a code from the given RNG.
    ///
    /// The alphabet is shuffled and the first [`CODE_LENGTH`] characters are
    /// taken, so no character repeats within a code.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut alphabet = CODE_ALPHABET.to_vec();
        alphabet.shuffle(rng);
        Self(
            alphabet[..CODE_LENGTH]
                .iter()
                .map(|&b| char::from(b))
                .collect(),
        )
    }

    /// Normalize user input into a code.
    ///
    /// Surrounding whitespace is trimmed and letters are upper-cased. Returns
    /// `None` when nothing is left.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let code = input.trim().to_ascii_uppercase();
        (!code.is_empty()).then_some(Self(code))
    }

    /// Create from an existing string value without normalization.
    #[must_use]
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume self and return the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::ops::Deref for GameCode {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
