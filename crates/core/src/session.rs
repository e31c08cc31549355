//! Session Controller
//!
//! Owns the lifecycle of one conversation session over a long-lived
//! transport. The controller is sans-IO: operations return the
//! `ClientEvent` the transport must send, and inbound `ServerEvent`s are
//! handed to it in delivery order. Every transition is published on a
//! `watch` channel so rendering layers can subscribe instead of polling.

use crate::{
    consumer::Conversation,
    protocol::{ClientEvent, ServerEvent},
    session_config::{ConfigForm, SessionConfig},
    transcript::TranscriptEntry,
};
use serde::Serialize;
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Top-level lifecycle of a session.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Configuring,
    Active,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Configuring => write!(f, "configuring"),
            SessionState::Active => write!(f, "active"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Errors for operations attempted in the wrong state.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("A session is already active")]
    AlreadyActive,
    #[error("No session is active (state: {0})")]
    NotActive(SessionState),
}

/// The observable state of a session.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub conversation: Conversation,
}

impl SessionSnapshot {
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn is_typing(&self) -> bool {
        self.conversation.is_typing()
    }
}

pub struct SessionController {
    snapshot_tx: watch::Sender<SessionSnapshot>,
    form: ConfigForm,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionController {
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            snapshot_tx,
            form: ConfigForm::new(),
        }
    }

    /// Returns a receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.snapshot_tx.borrow().state
    }

    pub fn is_typing(&self) -> bool {
        self.snapshot_tx.borrow().conversation.is_typing()
    }

    pub fn form(&self) -> &ConfigForm {
        &self.form
    }

    /// Opens the configuration view for editing.
    ///
    /// The form is disabled while a session is active.
    pub fn configure(&mut self) -> Result<&mut ConfigForm, SessionError> {
        self.ensure_not_active()?;
        self.set_state(SessionState::Configuring);
        Ok(&mut self.form)
    }

    /// Clears topic, roster and prompt and returns to the configuration view.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.ensure_not_active()?;
        self.form.reset();
        self.set_state(SessionState::Configuring);
        Ok(())
    }

    /// Starts a session with the current form contents.
    pub fn start_from_form(&mut self) -> Result<ClientEvent, SessionError> {
        let config = self.form.build();
        self.start(&config)
    }

    /// Starts a session.
    ///
    /// The typing indicator is raised immediately since the first server
    /// event may take a while. The transcript carries over from earlier
    /// sessions on the same transport.
    pub fn start(&mut self, config: &SessionConfig) -> Result<ClientEvent, SessionError> {
        self.ensure_not_active()?;
        info!(
            topic = %config.topic,
            agents = config.agents.len(),
            toxicity = %config.toxicity,
            mediator = config.mediator,
            "Starting conversation session"
        );
        self.snapshot_tx.send_modify(|snapshot| {
            snapshot.state = SessionState::Active;
            snapshot.conversation.begin_waiting();
        });
        Ok(ClientEvent::start(config))
    }

    /// Stops the active session without waiting for the backend.
    pub fn stop(&mut self) -> Result<ClientEvent, SessionError> {
        let state = self.state();
        if state != SessionState::Active {
            return Err(SessionError::NotActive(state));
        }
        info!("Stopping conversation session");
        self.snapshot_tx.send_modify(|snapshot| {
            snapshot.state = SessionState::Stopped;
            snapshot.conversation.stop_typing();
        });
        Ok(ClientEvent::StopConversation)
    }

    /// Applies an inbound server event.
    ///
    /// Events arriving while no session is active (typically in-flight
    /// frames after a local stop) are dropped.
    pub fn handle_event(&mut self, event: ServerEvent) {
        if self.state() != SessionState::Active {
            debug!(?event, "Dropping server event outside an active session");
            return;
        }
        self.snapshot_tx
            .send_modify(|snapshot| snapshot.conversation.apply(event));
    }

    pub fn on_message(&mut self, entry: TranscriptEntry) {
        self.handle_event(ServerEvent::ConversationResponse(entry));
    }

    pub fn on_typing(&mut self) {
        self.handle_event(ServerEvent::AgentTyping { agent: None });
    }

    pub fn on_error(&mut self, message: impl Into<String>) {
        self.handle_event(ServerEvent::Error {
            message: message.into(),
        });
    }

    /// Ends the session after the transport was lost. The transcript is kept.
    pub fn on_disconnect(&mut self) {
        if self.state() == SessionState::Active {
            warn!("Transport lost during an active session");
        }
        self.snapshot_tx.send_modify(|snapshot| {
            if snapshot.state == SessionState::Active {
                snapshot.state = SessionState::Stopped;
            }
            snapshot.conversation.stop_typing();
        });
    }

    fn ensure_not_active(&self) -> Result<(), SessionError> {
        if self.state() == SessionState::Active {
            return Err(SessionError::AlreadyActive);
        }
        Ok(())
    }

    fn set_state(&self, state: SessionState) {
        self.snapshot_tx.send_if_modified(|snapshot| {
            let changed = snapshot.state != state;
            snapshot.state = state;
            changed
        });
    }
}
