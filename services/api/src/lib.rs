//! Colloquy API Library Crate
//!
//! This library contains the reference backend for the conversation streaming
//! protocol: configuration, shared state, routing and the WebSocket session
//! logic. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod router;
pub mod state;
pub mod ws;
