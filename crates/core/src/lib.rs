pub mod agent;
pub mod consumer;
pub mod protocol;
pub mod session;
pub mod session_config;
pub mod transcript;

pub use agent::{Agent, Roster};
pub use consumer::Conversation;
pub use protocol::{ClientEvent, ServerEvent};
pub use session::{SessionController, SessionError, SessionSnapshot, SessionState};
pub use session_config::{ConfigError, ConfigForm, SessionConfig, Toxicity};
pub use transcript::{Transcript, TranscriptEntry};
