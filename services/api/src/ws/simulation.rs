//! Simulated multi-agent conversation.
//!
//! Produces canned lines for each agent on the configured topic. Agents
//! speak round-robin; before each line a typing event is emitted, then the
//! line itself, with configurable pauses in between. The conversation
//! runs until the task is aborted or the receiving side goes away.

use colloquy_core::{Roster, ServerEvent, Toxicity, TranscriptEntry};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Everything the simulation needs from a `start_conversation` request.
#[derive(Debug, Clone)]
pub struct ConversationPlan {
    pub topic: String,
    pub agents: Vec<String>,
    pub toxicity: Toxicity,
    pub mediator: bool,
}

impl ConversationPlan {
    /// Resolves the speaking agents, preferring the structured roster and
    /// falling back to the flattened `agents` string from older clients.
    ///
    /// Returns `None` when no agent could be found.
    pub fn new(
        topic: String,
        flat_agents: &str,
        roster: Roster,
        toxicity: Toxicity,
        mediator: bool,
    ) -> Option<Self> {
        let roster = if roster.is_empty() {
            Roster::parse_flattened(flat_agents)
        } else {
            roster
        };
        if roster.is_empty() {
            return None;
        }
        Some(Self {
            topic,
            agents: roster.names(),
            toxicity,
            mediator,
        })
    }

    /// The endless sequence of transcript entries this plan produces.
    pub fn script(&self) -> impl Iterator<Item = TranscriptEntry> + '_ {
        (0..LINES_PER_AGENT).cycle().flat_map(move |line| {
            self.agents
                .iter()
                .map(move |agent| TranscriptEntry::new(agent, agent_line(agent, &self.topic, line)))
        })
    }
}

/// Delays between simulated events.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub typing_delay: Duration,
    pub turn_delay: Duration,
}

const LINES_PER_AGENT: usize = 5;

fn agent_line(agent: &str, topic: &str, index: usize) -> String {
    match index % LINES_PER_AGENT {
        0 => format!("{agent} thinks {topic} is interesting."),
        1 => format!("{agent} wants to know more about {topic}."),
        2 => format!("{agent} agrees with the other agent on {topic}."),
        3 => format!("{agent} is considering different perspectives on {topic}."),
        _ => format!("{agent} raises a point about {topic}."),
    }
}

/// Streams the conversation into `tx` until aborted or `tx` is closed.
pub async fn run(plan: ConversationPlan, pacing: Pacing, tx: mpsc::Sender<ServerEvent>) {
    if plan.agents.is_empty() {
        return;
    }
    info!(
        topic = %plan.topic,
        agents = ?plan.agents,
        toxicity = %plan.toxicity,
        mediator = plan.mediator,
        "Conversation simulation started"
    );
    for entry in plan.script() {
        let typing = ServerEvent::AgentTyping {
            agent: Some(entry.agent.clone()),
        };
        if tx.send(typing).await.is_err() {
            break;
        }
        tokio::time::sleep(pacing.typing_delay).await;

        if tx.send(ServerEvent::ConversationResponse(entry)).await.is_err() {
            break;
        }
        tokio::time::sleep(pacing.turn_delay).await;
    }
    debug!("Conversation simulation ended: receiver closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::Agent;

    fn plan(names: &[&str]) -> ConversationPlan {
        ConversationPlan {
            topic: "tea".into(),
            agents: names.iter().map(|n| n.to_string()).collect(),
            toxicity: Toxicity::default(),
            mediator: false,
        }
    }

    #[test]
    fn test_plan_prefers_structured_roster() {
        let roster = Roster::from(vec![Agent::new("Alice", "Skeptic")]);
        let plan = ConversationPlan::new(
            "t".into(),
            "Someone (else)",
            roster,
            Toxicity::default(),
            false,
        )
        .unwrap();
        assert_eq!(plan.agents, vec!["Alice"]);
    }

    #[test]
    fn test_plan_falls_back_to_flattened_agents() {
        let plan = ConversationPlan::new(
            "t".into(),
            "Alice (Skeptic), Bob (Optimist)",
            Roster::new(),
            Toxicity::default(),
            true,
        )
        .unwrap();
        assert_eq!(plan.agents, vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_plan_without_agents_is_rejected() {
        assert!(
            ConversationPlan::new("t".into(), "", Roster::new(), Toxicity::default(), false)
                .is_none()
        );
    }

    #[test]
    fn test_script_alternates_agents() {
        let entries: Vec<_> = plan(&["Alice", "Bob"]).script().take(4).collect();
        assert_eq!(
            entries,
            vec![
                TranscriptEntry::new("Alice", "Alice thinks tea is interesting."),
                TranscriptEntry::new("Bob", "Bob thinks tea is interesting."),
                TranscriptEntry::new("Alice", "Alice wants to know more about tea."),
                TranscriptEntry::new("Bob", "Bob wants to know more about tea."),
            ]
        );
    }

    #[test]
    fn test_script_cycles_after_last_line() {
        let entries: Vec<_> = plan(&["Solo"]).script().take(6).collect();
        assert_eq!(entries[5], entries[0]);
        assert_eq!(entries[4].message, "Solo raises a point about tea.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_emits_typing_before_each_response() {
        let (tx, mut rx) = mpsc::channel(4);
        let pacing = Pacing {
            typing_delay: Duration::from_secs(2),
            turn_delay: Duration::from_secs(2),
        };
        let handle = tokio::spawn(run(plan(&["Alice", "Bob"]), pacing, tx));

        let mut events = Vec::new();
        for _ in 0..4 {
            events.push(rx.recv().await.unwrap());
        }
        handle.abort();

        assert_eq!(
            events[0],
            ServerEvent::AgentTyping {
                agent: Some("Alice".into())
            }
        );
        assert_eq!(
            events[1],
            ServerEvent::ConversationResponse(TranscriptEntry::new(
                "Alice",
                "Alice thinks tea is interesting."
            ))
        );
        assert_eq!(
            events[2],
            ServerEvent::AgentTyping {
                agent: Some("Bob".into())
            }
        );
        assert!(matches!(events[3], ServerEvent::ConversationResponse(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ends_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let pacing = Pacing {
            typing_delay: Duration::from_millis(10),
            turn_delay: Duration::from_millis(10),
        };
        tokio::time::timeout(Duration::from_secs(1), run(plan(&["Alice"]), pacing, tx))
            .await
            .expect("simulation should stop once the receiver is gone");
    }
}
