//! Manages the WebSocket connection lifecycle for a conversation client.

use super::simulation::{self, ConversationPlan, Pacing};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use colloquy_core::{ClientEvent, ServerEvent};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{Instrument, error, info, instrument, warn};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// One connection carries any number of start/stop cycles. At most one
/// conversation runs at a time; a new `start_conversation` replaces the
/// running one.
#[instrument(name = "ws_connection", skip_all, fields(connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id: u32 = rand::random();
    tracing::Span::current().record("connection_id", connection_id);
    info!("New WebSocket connection.");

    if let Err(e) = run_connection(socket, state).await {
        error!(error = ?e, "Connection terminated with error.");
    }
    info!("WebSocket connection closed.");
}

/// A running simulation and the receiving end of its private event channel.
///
/// Dropping the receiver closes the channel, so a task that outlives its
/// abort cannot deliver anything further.
struct Running {
    handle: JoinHandle<()>,
    events: mpsc::Receiver<ServerEvent>,
}

async fn run_connection(socket: WebSocket, state: Arc<AppState>) -> Result<()> {
    let (mut socket_tx, mut socket_rx) = socket.split();
    let mut conversation: Option<Running> = None;
    let pacing = Pacing {
        typing_delay: state.config.typing_delay,
        turn_delay: state.config.turn_delay,
    };

    let result = loop {
        tokio::select! {
            msg_result = socket_rx.next() => {
                let ws_msg = match msg_result {
                    Some(Ok(ws_msg)) => ws_msg,
                    Some(Err(e)) => {
                        error!("Error receiving from client WebSocket: {:?}", e);
                        break Ok(());
                    }
                    None => {
                        info!("Client disconnected.");
                        break Ok(());
                    }
                };
                match ws_msg {
                    Message::Text(text) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                        Ok(ClientEvent::StartConversation { topic, agents, roster, toxicity, mediator, .. }) => {
                            halt(&mut conversation);
                            match ConversationPlan::new(topic, &agents, roster, toxicity, mediator) {
                                Some(plan) => conversation = Some(launch(plan, pacing)),
                                None => {
                                    warn!("Rejected start_conversation without agents.");
                                    let error = ServerEvent::Error { message: "No agents configured".to_string() };
                                    if let Err(e) = send_msg(&mut socket_tx, &error).await {
                                        break Err(e);
                                    }
                                }
                            }
                        }
                        Ok(ClientEvent::StopConversation) => {
                            halt(&mut conversation);
                            info!("Conversation stopped by client.");
                        }
                        Err(e) => {
                            warn!(error = %e, "Ignoring malformed client message.");
                            let error = ServerEvent::Error { message: format!("Malformed message: {e}") };
                            if let Err(e) = send_msg(&mut socket_tx, &error).await {
                                break Err(e);
                            }
                        }
                    },
                    Message::Close(_) => {
                        info!("Client sent close frame. Shutting down connection.");
                        break Ok(());
                    }
                    Message::Binary(_) => warn!("Ignoring binary frame."),
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            },
            Some(event) = next_event(&mut conversation) => {
                if let Err(e) = send_msg(&mut socket_tx, &event).await {
                    break Err(e);
                }
            },
        }
    };

    halt(&mut conversation);
    result
}

/// Spawns the simulation for `plan` on a fresh event channel.
fn launch(plan: ConversationPlan, pacing: Pacing) -> Running {
    let (tx, events) = mpsc::channel::<ServerEvent>(32);
    let span = tracing::info_span!("conversation", topic = %plan.topic);
    let handle = tokio::spawn(simulation::run(plan, pacing, tx).instrument(span));
    Running { handle, events }
}

/// Waits for the next event of the running conversation. Pends forever when
/// nothing is running.
async fn next_event(conversation: &mut Option<Running>) -> Option<ServerEvent> {
    match conversation {
        Some(running) => running.events.recv().await,
        None => std::future::pending().await,
    }
}

/// Aborts the running conversation, if any, and drops everything it queued.
fn halt(conversation: &mut Option<Running>) {
    if let Some(Running { handle, events }) = conversation.take() {
        handle.abort();
        drop(events);
        info!("Aborted running conversation.");
    }
}

/// A helper function to serialize and send a `ServerEvent` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: &ServerEvent,
) -> Result<()> {
    let serialized = serde_json::to_string(msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
