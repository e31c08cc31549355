//! Drives a `SessionController` over a WebSocket connection.
//!
//! A single background task owns the controller and the socket. User
//! commands arrive on an `mpsc` channel and inbound frames are decoded into
//! `ServerEvent`s; both are applied one at a time, in arrival order.
//! Observers follow the session through `watch` receivers.

use crate::{backoff::Backoff, config::ClientConfig, error::ClientError};
use colloquy_core::{ClientEvent, ServerEvent, SessionConfig, SessionController, SessionSnapshot};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::time::Duration;
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message as WsMessage,
};
use tracing::{Instrument, debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Reply = oneshot::Sender<Result<(), ClientError>>;

/// Health of the underlying transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Connected,
    /// Waiting `delay` before reconnect attempt number `attempt`.
    Reconnecting { attempt: u32, delay: Duration },
    /// The driver has stopped and will not reconnect.
    Closed,
}

#[derive(Debug)]
enum Command {
    Start(SessionConfig, Reply),
    Stop(Reply),
    Shutdown,
}

enum Exit {
    Shutdown,
    Lost(String),
}

/// Handle to a background conversation session.
pub struct SessionClient {
    cmd_tx: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    link_rx: watch::Receiver<LinkState>,
    driver: JoinHandle<()>,
}

impl SessionClient {
    /// Spawns the driver task. The connection is established in the
    /// background and re-established after failures.
    pub fn spawn(config: ClientConfig) -> Self {
        let controller = SessionController::new();
        let snapshot_rx = controller.subscribe();
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (link_tx, link_rx) = watch::channel(LinkState::Connecting);

        let span = tracing::info_span!("session_client", url = %config.server_url);
        let driver = tokio::spawn(drive(config, controller, cmd_rx, link_tx).instrument(span));

        Self {
            cmd_tx,
            snapshot_rx,
            link_rx,
            driver,
        }
    }

    /// Observes every session transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Observes the transport's connection state.
    pub fn link(&self) -> watch::Receiver<LinkState> {
        self.link_rx.clone()
    }

    /// Resolves once the transport is connected.
    pub async fn wait_connected(&self) -> Result<(), ClientError> {
        let mut link = self.link_rx.clone();
        let connected = link
            .wait_for(|state| matches!(state, LinkState::Connected | LinkState::Closed))
            .await
            .map(|state| *state == LinkState::Connected)
            .unwrap_or(false);
        if connected {
            Ok(())
        } else {
            Err(ClientError::Closed)
        }
    }

    /// Sends `start_conversation` and marks the session active.
    pub async fn start(&self, config: SessionConfig) -> Result<(), ClientError> {
        self.request(|reply| Command::Start(config, reply)).await
    }

    /// Sends `stop_conversation`. The local session stops immediately.
    pub async fn stop(&self) -> Result<(), ClientError> {
        self.request(Command::Stop).await
    }

    /// Closes the transport and waits for the driver to finish.
    pub async fn disconnect(self) {
        let _ = self.cmd_tx.send(Command::Shutdown).await;
        if let Err(e) = self.driver.await {
            error!("Session driver task failed: {}", e);
        }
    }

    async fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<(), ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| ClientError::Closed)?;
        reply_rx.await.map_err(|_| ClientError::Closed)?
    }
}

/// Owns the controller for the lifetime of the client: connects, runs the
/// connection until it is lost, then backs off and reconnects.
async fn drive(
    config: ClientConfig,
    mut controller: SessionController,
    mut cmd_rx: mpsc::Receiver<Command>,
    link_tx: watch::Sender<LinkState>,
) {
    let mut backoff = Backoff::new(config.reconnect.clone());

    loop {
        link_tx.send_replace(LinkState::Connecting);
        match connect_async(config.server_url.as_str()).await {
            Ok((ws, _)) => {
                info!("Connected to conversation server.");
                backoff.reset();
                link_tx.send_replace(LinkState::Connected);
                let exit = run_connection(ws, &mut controller, &mut cmd_rx).await;
                controller.on_disconnect();
                match exit {
                    Exit::Shutdown => break,
                    Exit::Lost(reason) => warn!(%reason, "Connection lost."),
                }
            }
            Err(e) => warn!(error = %e, "Failed to connect to conversation server."),
        }

        let Some(delay) = backoff.next_delay() else {
            error!(
                attempts = backoff.attempt(),
                "Giving up on reconnecting to conversation server."
            );
            break;
        };
        link_tx.send_replace(LinkState::Reconnecting {
            attempt: backoff.attempt(),
            delay,
        });
        debug!(?delay, "Waiting before reconnect.");
        if wait_offline(delay, &mut controller, &mut cmd_rx).await.is_err() {
            break;
        }
    }

    controller.on_disconnect();
    link_tx.send_replace(LinkState::Closed);
    info!("Session client stopped.");
}

/// Answers commands while no transport is available. Returns `Err` on shutdown.
async fn wait_offline(
    delay: Duration,
    controller: &mut SessionController,
    cmd_rx: &mut mpsc::Receiver<Command>,
) -> Result<(), ()> {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return Ok(()),
            cmd = cmd_rx.recv() => match cmd {
                None | Some(Command::Shutdown) => return Err(()),
                Some(Command::Start(_, reply)) => {
                    let _ = reply.send(Err(ClientError::NotConnected));
                }
                Some(Command::Stop(reply)) => {
                    let result = controller.stop().map(|_| ()).map_err(ClientError::from);
                    let _ = reply.send(result);
                }
            },
        }
    }
}

/// Runs one connected transport until it is lost or shutdown is requested.
async fn run_connection(
    ws: WsStream,
    controller: &mut SessionController,
    cmd_rx: &mut mpsc::Receiver<Command>,
) -> Exit {
    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                None | Some(Command::Shutdown) => {
                    if let Err(e) = ws_tx.send(WsMessage::Close(None)).await {
                        debug!(error = %e, "Failed to send close frame.");
                    }
                    return Exit::Shutdown;
                }
                Some(Command::Start(config, reply)) => {
                    let outcome = match controller.start(&config) {
                        Ok(event) => send_event(&mut ws_tx, &event).await,
                        Err(e) => Err(e.into()),
                    };
                    if let Some(exit) = reply_or_exit(reply, outcome) {
                        return exit;
                    }
                }
                Some(Command::Stop(reply)) => {
                    let outcome = match controller.stop() {
                        Ok(event) => send_event(&mut ws_tx, &event).await,
                        Err(e) => Err(e.into()),
                    };
                    if let Some(exit) = reply_or_exit(reply, outcome) {
                        return exit;
                    }
                }
            },
            frame = ws_rx.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(text.as_str()) {
                        Ok(event) => controller.handle_event(event),
                        Err(e) => warn!(error = %e, "Skipping undecodable server frame."),
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    return Exit::Lost(format!("server closed the connection: {frame:?}"));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Exit::Lost(e.to_string()),
                None => return Exit::Lost("stream ended".to_string()),
            },
        }
    }
}

/// Delivers the outcome of a command. A transport failure also ends the connection.
fn reply_or_exit(reply: Reply, outcome: Result<(), ClientError>) -> Option<Exit> {
    let exit = match &outcome {
        Err(ClientError::Transport(e)) => Some(Exit::Lost(e.to_string())),
        _ => None,
    };
    let _ = reply.send(outcome);
    exit
}

/// Serializes and sends a `ClientEvent` to the server.
async fn send_event(
    ws_tx: &mut SplitSink<WsStream, WsMessage>,
    event: &ClientEvent,
) -> Result<(), ClientError> {
    let serialized = serde_json::to_string(event)?;
    ws_tx.send(WsMessage::Text(serialized.into())).await?;
    Ok(())
}
