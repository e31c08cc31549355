//! WebSocket Conversation Streaming
//!
//! This module contains the backend side of the conversation protocol:
//!
//! - `session`: Manages the WebSocket connection lifecycle and dispatches client events.
//! - `simulation`: Produces the simulated multi-agent conversation that is streamed back.

pub mod session;
pub mod simulation;

pub use session::ws_handler;
