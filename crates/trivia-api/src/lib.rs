//! # trivia-api
//!
//! Request/response side of a game session:
//!
//! - [`client`]: the [`GameApi`] contract and its HTTP implementation
//! - [`reporter`]: one-shot score submission and bounded ranking polling
//! - [`credentials`]: where the bearer token and username live
//! - [`errors`]: [`ApiError`]

#![deny(unsafe_code)]

pub mod client;
pub mod credentials;
pub mod errors;
pub mod reporter;

pub use client::{GameApi, HttpGameApi};
pub use credentials::{CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore};
pub use errors::ApiError;
pub use reporter::{RankingOutcome, ResultReporter, SubmitOutcome};
