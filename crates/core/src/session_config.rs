//! Session Configuration Model
//!
//! Assembles the per-run parameters of a conversation. `ConfigForm` is the
//! editable draft the user fills in; `SessionConfig` is the immutable value
//! built from it at start time.

use crate::agent::{Agent, Roster};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors raised while building configuration values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Toxicity level {0} is out of range (expected {min}..={max})", min = Toxicity::MIN, max = Toxicity::MAX)]
    ToxicityOutOfRange(u8),
}

/// How permissive the agents' language may be, from 0 (civil) to 5.
///
/// Values outside `0..=5` cannot be constructed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub struct Toxicity(u8);

impl Toxicity {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 5;

    pub fn new(level: u8) -> Result<Self, ConfigError> {
        if level > Self::MAX {
            return Err(ConfigError::ToxicityOutOfRange(level));
        }
        Ok(Self(level))
    }

    /// Builds a level, clamping anything above the maximum.
    pub fn saturating(level: u8) -> Self {
        Self(level.min(Self::MAX))
    }

    pub fn level(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Toxicity {
    type Error = ConfigError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<Toxicity> for u8 {
    fn from(toxicity: Toxicity) -> Self {
        toxicity.0
    }
}

impl fmt::Display for Toxicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The parameters of one conversation run, sent once at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub topic: String,
    pub agents: Roster,
    pub prompt: String,
    pub toxicity: Toxicity,
    pub mediator: bool,
}

/// Editable draft of a `SessionConfig`.
///
/// Mirrors the configuration view: top-level fields plus the pending
/// name/role inputs used to add agents one at a time.
#[derive(Debug, Clone, Default)]
pub struct ConfigForm {
    pub topic: String,
    pub prompt: String,
    pub toxicity: Toxicity,
    pub mediator: bool,
    pub agent_name: String,
    pub agent_role: String,
    roster: Roster,
}

impl ConfigForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Commits the pending name/role inputs as a new agent.
    ///
    /// Returns `false` and leaves everything untouched when the pending name
    /// is blank. On success the inputs are cleared and the agent is stored
    /// with surrounding whitespace removed.
    pub fn add_agent(&mut self) -> bool {
        let name = self.agent_name.trim();
        if name.is_empty() {
            return false;
        }
        self.roster.push(Agent::new(name, self.agent_role.trim()));
        self.agent_name.clear();
        self.agent_role.clear();
        true
    }

    /// Clears topic, roster and prompt. Toxicity and the mediator flag keep
    /// their current values.
    pub fn reset(&mut self) {
        self.topic.clear();
        self.roster.clear();
        self.prompt.clear();
    }

    pub fn build(&self) -> SessionConfig {
        SessionConfig {
            topic: self.topic.clone(),
            agents: self.roster.clone(),
            prompt: self.prompt.clone(),
            toxicity: self.toxicity,
            mediator: self.mediator,
        }
    }
}
