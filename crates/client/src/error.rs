use colloquy_core::SessionError;
use tokio_tungstenite::tungstenite;

/// Errors surfaced by `SessionClient` operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The operation is not valid in the current session state.
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Not connected to the conversation server")]
    NotConnected,
    #[error("WebSocket transport error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("Failed to encode client event: {0}")]
    Encode(#[from] serde_json::Error),
    /// The background driver has shut down.
    #[error("Session client is closed")]
    Closed,
}
