//! # trivia-core
//!
//! Foundation types shared by every trivia crate:
//!
//! - [`ids`]: the human-shareable [`GameCode`]
//! - [`types`]: session identity, question rounds, results, and state enums
//! - [`protocol`]: event names, outbound payloads, and the decoded inbound message type
//! - [`errors`]: transport, protocol, and submission error taxonomy
//! - [`retry`]: poll and reconnect policies with backoff math
//! - [`logging`]: tracing subscriber setup

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod protocol;
pub mod retry;
pub mod types;

mod lenient;

pub use errors::{ProtocolError, SubmissionError, TransportError};
pub use ids::GameCode;
pub use protocol::{InboundMessage, OutboundEvent, PayloadEncoding};
pub use retry::{PollPolicy, ReconnectPolicy};
pub use types::{
    ConnectionState, FinalResult, QuestionRound, RankingEntry, SessionIdentity, SessionPhase,
};
