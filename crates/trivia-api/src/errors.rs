//! API error types.

use thiserror::Error;

/// Message used when a failed response carries no usable error text.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Errors from the game REST API or the credential store.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be sent or the response could not be read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message from the `{"error": ...}` body.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// Credential file could not be read or written.
    #[error("credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Credential file could not be serialized.
    #[error("credential store JSON invalid: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// Text suitable for showing to a player.
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
