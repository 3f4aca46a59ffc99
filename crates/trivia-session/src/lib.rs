//! # trivia-session
//!
//! One game session from the local participant's point of view.
//!
//! - [`scoring`]: the score tally and the per-question countdown
//! - [`machine`]: the session state machine as a pure transition function
//! - [`snapshot`]: the read-only view published to observers
//! - [`driver`]: the task that feeds the machine from the transport, the
//!   ticker, the UI, and result reporting, one input at a time
//!
//! All session state is mutated by the driver task alone. Observers read
//! [`SessionSnapshot`]s from a watch channel and send intents through a
//! [`SessionHandle`].

#![deny(unsafe_code)]

pub mod driver;
pub mod machine;
pub mod scoring;
pub mod snapshot;

pub use driver::{DriverConfig, SessionHandle, spawn_session};
pub use machine::{SessionAction, SessionConfig, SessionInput, SessionMachine};
pub use scoring::{Countdown, Scoreboard, Tick};
pub use snapshot::{AnswerState, RankingState, SessionSnapshot, SubmissionState};
