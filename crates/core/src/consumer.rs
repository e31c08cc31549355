//! Event Stream Consumer
//!
//! Applies server events to the transcript and the typing indicator. Each
//! turn moves `Silent -> Typing -> Silent` with the message appended; an
//! error returns to `Silent` without appending. Events are applied in
//! delivery order with no reordering or deduplication.

use crate::{protocol::ServerEvent, transcript::Transcript, transcript::TranscriptEntry};
use serde::Serialize;
use tracing::warn;

const UNSPECIFIED_ERROR: &str = "The server reported an error.";

/// What has been said so far and whether something is being said right now.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    transcript: Transcript,
    typing: bool,
    typing_agent: Option<String>,
    last_error: Option<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// True while a response is expected imminently.
    pub fn is_typing(&self) -> bool {
        self.typing
    }

    /// The agent announced by the last typing event, if the backend named one.
    pub fn typing_agent(&self) -> Option<&str> {
        self.typing_agent.as_deref()
    }

    /// The most recent backend error, kept until the next message or session start.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn apply(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::ConversationResponse(entry) => self.on_message(entry),
            ServerEvent::AgentTyping { agent } => self.on_typing(agent),
            ServerEvent::Error { message } => self.on_error(message),
        }
    }

    pub fn on_message(&mut self, entry: TranscriptEntry) {
        self.transcript.append(entry);
        self.last_error = None;
        self.stop_typing();
    }

    pub fn on_typing(&mut self, agent: Option<String>) {
        self.typing = true;
        if agent.is_some() {
            self.typing_agent = agent;
        }
    }

    /// Records a backend error. A blank message is replaced with a generic one.
    pub fn on_error(&mut self, message: String) {
        let message = if message.trim().is_empty() {
            UNSPECIFIED_ERROR.to_string()
        } else {
            message
        };
        warn!(error = %message, "Backend reported an error");
        self.last_error = Some(message);
        self.stop_typing();
    }

    pub(crate) fn begin_waiting(&mut self) {
        self.typing = true;
        self.typing_agent = None;
        self.last_error = None;
    }

    pub(crate) fn stop_typing(&mut self) {
        self.typing = false;
        self.typing_agent = None;
    }
}
