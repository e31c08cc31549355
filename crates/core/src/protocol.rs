//! Defines the WebSocket message protocol between the conversation client and the backend.
//!
//! Frames are JSON text, internally tagged by `type`.

use crate::{
    agent::Roster,
    session_config::{SessionConfig, Toxicity},
    transcript::TranscriptEntry,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Messages sent from the client to the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Starts a conversation. Sent once per session.
    StartConversation {
        topic: String,
        /// Roster flattened as `"name (role), name (role)"`.
        agents: String,
        /// The same roster as structured data. Absent from older clients.
        #[serde(default, skip_serializing_if = "Roster::is_empty")]
        roster: Roster,
        prompt: String,
        toxicity: Toxicity,
        mediator: bool,
    },
    /// Asks the backend to halt generation.
    StopConversation,
}

impl ClientEvent {
    pub fn start(config: &SessionConfig) -> Self {
        Self::StartConversation {
            topic: config.topic.clone(),
            agents: config.agents.flatten(),
            roster: config.agents.clone(),
            prompt: config.prompt.clone(),
            toxicity: config.toxicity,
            mediator: config.mediator,
        }
    }
}

/// Messages sent from the server to the client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// One complete transcript entry.
    ConversationResponse(TranscriptEntry),
    /// An agent is composing its next message.
    AgentTyping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
    },
    /// A backend-reported error. Not fatal to the session.
    ///
    /// The payload is owned by the backend: `message` may be missing, sent as
    /// `error`, or be any JSON value, which is then rendered as text.
    Error {
        #[serde(default, alias = "error", deserialize_with = "error_text")]
        message: String,
    },
}

fn error_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
