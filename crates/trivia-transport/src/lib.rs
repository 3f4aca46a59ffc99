//! # trivia-transport
//!
//! The persistent connection between one session and the game server.
//!
//! - [`transport`]: the [`Transport`] contract and named-event subscriptions
//! - [`socketio`]: Engine.IO v4 / Socket.IO packet framing
//! - [`client`]: [`SocketClient`], a WebSocket-backed transport with reconnect
//! - [`memory`]: [`MemoryTransport`], an in-process loopback

#![deny(unsafe_code)]

pub mod client;
pub mod memory;
pub mod socketio;
pub mod transport;

pub use client::{ConnectOptions, SocketClient};
pub use memory::{MemoryServer, MemoryTransport};
pub use transport::{EventSubscription, RawEvent, Transport};
