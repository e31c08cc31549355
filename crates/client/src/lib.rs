//! Colloquy Client
//!
//! Connects to a conversation server over WebSocket and keeps a
//! `SessionController` in sync with it:
//!
//! - `client`: The background driver and the `SessionClient` handle.
//! - `backoff`: Exponential reconnect delays.
//! - `config`: Environment-driven client configuration.
//! - `error`: The `ClientError` type.

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;

pub use backoff::{Backoff, ReconnectPolicy};
pub use client::{LinkState, SessionClient};
pub use config::ClientConfig;
pub use error::ClientError;
