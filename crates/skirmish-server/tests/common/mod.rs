use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use skirmish_core::net::messages::{LobbyJoinedMsg, ServerMessage};
use skirmish_core::net::protocol::decode_server_message;
use skirmish_core::time::now_millis;

use skirmish_server::build_app;
use skirmish_server::config::{ServerConfig, TimingConfig};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _server: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a server with production timing.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    /// Start a server with compressed lobby timers so match-flow tests run
    /// in milliseconds instead of half a minute.
    pub async fn with_fast_timers() -> Self {
        let config = ServerConfig {
            timing: TimingConfig {
                wait_timer_secs: 1,
                countdown_start: 3,
                countdown_tick_ms: 50,
            },
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting.
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _server: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send one client envelope `{type, data, timestamp}`.
pub async fn ws_send(stream: &mut WsStream, msg_type: &str, data: Value) {
    let envelope = json!({
        "type": msg_type,
        "data": data,
        "timestamp": now_millis(),
    });
    stream
        .send(Message::Text(envelope.to_string().into()))
        .await
        .unwrap();
}

/// Read the next server message (5s timeout).
pub async fn ws_read(stream: &mut WsStream) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return decode_server_message(text.as_str()).unwrap();
                }
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Read server messages until one of the given type arrives, skipping others.
pub async fn ws_read_until(stream: &mut WsStream, msg_type: &str) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let msg = ws_read_inner(stream).await;
            if msg.message_type() == msg_type {
                return msg;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Timed out waiting for {msg_type}"))
}

async fn ws_read_inner(stream: &mut WsStream) -> ServerMessage {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                return decode_server_message(text.as_str()).unwrap();
            }
            Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
            Some(Err(e)) => panic!("WebSocket error: {e}"),
            None => panic!("WebSocket stream ended"),
            _ => continue,
        }
    }
}

/// Try to read the next server message, returning `None` on timeout.
pub async fn ws_try_read(stream: &mut WsStream, timeout_ms: u64) -> Option<ServerMessage> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), ws_read_inner(stream))
        .await
        .ok()
}

/// Drain messages until the stream goes quiet for `quiet_ms`.
pub async fn ws_drain(stream: &mut WsStream, quiet_ms: u64) {
    while ws_try_read(stream, quiet_ms).await.is_some() {}
}

/// Join a room and wait for the `lobby_joined` acknowledgement.
pub async fn ws_join(stream: &mut WsStream, room_code: &str, name: &str) -> LobbyJoinedMsg {
    ws_send(
        stream,
        "lobby_join",
        json!({ "roomCode": room_code, "playerName": name }),
    )
    .await;
    match ws_read_until(stream, "lobby_joined").await {
        ServerMessage::LobbyJoined(joined) => joined,
        other => panic!("Expected lobby_joined, got {other:?}"),
    }
}

/// Mark the player ready (or not).
pub async fn ws_ready(stream: &mut WsStream, is_ready: bool) {
    ws_send(stream, "lobby_ready", json!({ "isReady": is_ready })).await;
}

/// Send an authoritative-state proposal.
pub async fn ws_state(stream: &mut WsStream, x: f64, y: f64, vx: f64, vy: f64) {
    ws_send(
        stream,
        "player_state",
        json!({ "x": x, "y": y, "vx": vx, "vy": vy }),
    )
    .await;
}

/// Send an attack intent.
pub async fn ws_attack(stream: &mut WsStream, attack_type: &str, x: f64, y: f64, facing_right: bool) {
    ws_send(
        stream,
        "player_attack",
        json!({
            "attackType": attack_type,
            "x": x,
            "y": y,
            "direction": if facing_right { "right" } else { "left" },
            "facingRight": facing_right,
        }),
    )
    .await;
}

/// Drive two clients into an active match: join, ready, and wait for both
/// `game_starting` messages. Requires a fast-timer server.
pub async fn start_two_player_match(
    server: &TestServer,
    room: &str,
) -> (WsStream, LobbyJoinedMsg, WsStream, LobbyJoinedMsg) {
    let mut alice = ws_connect(&server.ws_url()).await;
    let alice_join = ws_join(&mut alice, room, "Alice").await;
    let mut bob = ws_connect(&server.ws_url()).await;
    let bob_join = ws_join(&mut bob, room, "Bob").await;

    ws_ready(&mut alice, true).await;
    ws_ready(&mut bob, true).await;

    ws_read_until(&mut alice, "game_starting").await;
    ws_read_until(&mut bob, "game_starting").await;

    (alice, alice_join, bob, bob_join)
}
