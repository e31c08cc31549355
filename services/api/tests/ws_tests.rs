//! End-to-end tests for the WebSocket conversation endpoint.

use colloquy_api::{config::Config, router::create_router, state::AppState};
use colloquy_core::{Agent, ClientEvent, Roster, ServerEvent, SessionConfig, Toxicity};
use futures_util::{SinkExt, StreamExt};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> SocketAddr {
    let config = Config {
        typing_delay: Duration::from_millis(10),
        turn_delay: Duration::from_millis(10),
        ..Config::default()
    };
    let app = create_router(Arc::new(AppState::new(config)));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

async fn send(ws: &mut Client, event: &ClientEvent) {
    let text = serde_json::to_string(event).unwrap();
    ws.send(Message::text(text)).await.unwrap();
}

async fn recv(ws: &mut Client, wait: Duration) -> Option<ServerEvent> {
    loop {
        let msg = timeout(wait, ws.next()).await.ok()??.unwrap();
        if let Message::Text(text) = msg {
            return Some(serde_json::from_str(text.as_str()).unwrap());
        }
    }
}

fn debate() -> SessionConfig {
    SessionConfig {
        topic: "robots".into(),
        agents: Roster::from(vec![
            Agent::new("Alice", "Skeptic"),
            Agent::new("Bob", "Optimist"),
        ]),
        prompt: "Talk".into(),
        toxicity: Toxicity::new(3).unwrap(),
        mediator: true,
    }
}

#[tokio::test]
async fn test_health_route() {
    let addr = spawn_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("Server is running."));
}

#[tokio::test]
async fn test_start_streams_typing_then_responses() {
    let addr = spawn_server().await;
    let mut ws = connect(addr).await;
    send(&mut ws, &ClientEvent::start(&debate())).await;

    let wait = Duration::from_secs(2);
    assert_eq!(
        recv(&mut ws, wait).await.unwrap(),
        ServerEvent::AgentTyping {
            agent: Some("Alice".into())
        }
    );
    match recv(&mut ws, wait).await.unwrap() {
        ServerEvent::ConversationResponse(entry) => {
            assert_eq!(entry.agent, "Alice");
            assert_eq!(entry.message, "Alice thinks robots is interesting.");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(
        recv(&mut ws, wait).await.unwrap(),
        ServerEvent::AgentTyping {
            agent: Some("Bob".into())
        }
    );
}

#[tokio::test]
async fn test_stop_halts_the_stream() {
    let addr = spawn_server().await;
    let mut ws = connect(addr).await;
    send(&mut ws, &ClientEvent::start(&debate())).await;
    assert!(recv(&mut ws, Duration::from_secs(2)).await.is_some());

    send(&mut ws, &ClientEvent::StopConversation).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    while recv(&mut ws, Duration::from_millis(20)).await.is_some() {}

    assert!(recv(&mut ws, Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn test_restart_after_stop_on_same_connection() {
    let addr = spawn_server().await;
    let mut ws = connect(addr).await;
    for _ in 0..2 {
        send(&mut ws, &ClientEvent::start(&debate())).await;
        assert!(matches!(
            recv(&mut ws, Duration::from_secs(2)).await,
            Some(ServerEvent::AgentTyping { .. })
        ));
        send(&mut ws, &ClientEvent::StopConversation).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        while recv(&mut ws, Duration::from_millis(20)).await.is_some() {}
    }
}

#[tokio::test]
async fn test_legacy_flattened_roster_is_understood() {
    let addr = spawn_server().await;
    let mut ws = connect(addr).await;
    let legacy = serde_json::json!({
        "type": "start_conversation",
        "topic": "tea",
        "agents": "Carol (Host), Dan (Guest)",
        "prompt": "",
        "toxicity": 0,
        "mediator": false
    });
    ws.send(Message::text(legacy.to_string())).await.unwrap();

    assert_eq!(
        recv(&mut ws, Duration::from_secs(2)).await.unwrap(),
        ServerEvent::AgentTyping {
            agent: Some("Carol".into())
        }
    );
}

#[tokio::test]
async fn test_start_without_agents_reports_error() {
    let addr = spawn_server().await;
    let mut ws = connect(addr).await;
    let mut config = debate();
    config.agents = Roster::new();
    send(&mut ws, &ClientEvent::start(&config)).await;

    assert_eq!(
        recv(&mut ws, Duration::from_secs(2)).await.unwrap(),
        ServerEvent::Error {
            message: "No agents configured".into()
        }
    );
}

#[tokio::test]
async fn test_malformed_frame_is_not_fatal() {
    let addr = spawn_server().await;
    let mut ws = connect(addr).await;
    ws.send(Message::text(r#"{"type":"dance"}"#.to_string()))
        .await
        .unwrap();

    match recv(&mut ws, Duration::from_secs(2)).await.unwrap() {
        ServerEvent::Error { message } => assert!(message.starts_with("Malformed message")),
        other => panic!("unexpected event {other:?}"),
    }

    send(&mut ws, &ClientEvent::start(&debate())).await;
    assert!(matches!(
        recv(&mut ws, Duration::from_secs(2)).await,
        Some(ServerEvent::AgentTyping { .. })
    ));
}
