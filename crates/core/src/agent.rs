//! Conversation Participants
//!
//! This module defines the agents taking part in a simulated conversation and
//! the ordered roster they are collected into. The roster keeps insertion order
//! and does not enforce unique names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single participant in the conversation.
///
/// The `role` is free text describing the agent's stance (e.g. "Skeptic") and
/// may be empty.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub name: String,
    #[serde(default)]
    pub role: String,
}

impl Agent {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.role)
    }
}

/// The ordered list of agents configured for one session.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Roster {
    agents: Vec<Agent>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an agent at the end of the roster.
    pub fn push(&mut self, agent: Agent) {
        self.agents.push(agent);
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Agent> {
        self.agents.iter()
    }

    pub fn clear(&mut self) {
        self.agents.clear();
    }

    /// Names of all agents, in roster order.
    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    /// Renders the roster as the flattened wire string `"name (role), name (role)"`.
    ///
    /// An empty role still renders its parentheses, so `Bob` with no role
    /// becomes `"Bob ()"`.
    pub fn flatten(&self) -> String {
        self.agents
            .iter()
            .map(Agent::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Parses a flattened roster string back into structured agents.
    ///
    /// Entries are separated by `", "`. Each entry may end with a
    /// parenthesised role; entries without one get an empty role. Blank
    /// entries are skipped.
    pub fn parse_flattened(flat: &str) -> Self {
        let agents = flat
            .split(", ")
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.strip_suffix(')') {
                Some(head) => match head.rfind(" (") {
                    Some(idx) => Agent::new(&head[..idx], &head[idx + 2..]),
                    None => Agent::new(entry, ""),
                },
                None => Agent::new(entry, ""),
            })
            .collect();
        Self { agents }
    }
}

impl From<Vec<Agent>> for Roster {
    fn from(agents: Vec<Agent>) -> Self {
        Self { agents }
    }
}

impl<'a> IntoIterator for &'a Roster {
    type Item = &'a Agent;
    type IntoIter = std::slice::Iter<'a, Agent>;

    fn into_iter(self) -> Self::IntoIter {
        self.agents.iter()
    }
}
