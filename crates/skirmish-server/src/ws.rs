//! WebSocket endpoint: origin check, upgrade, and the two session tasks
//! (reader and writer/heartbeat).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use skirmish_core::net::protocol::MAX_MESSAGE_SIZE;

use crate::queue::{OutboundQueue, SessionHandle};
use crate::session::Session;
use crate::state::{AppState, ConnectionGuard};

/// Heartbeat cadence: ping every 54s, expect a pong within 60s of the ping,
/// refresh the read deadline on every pong, bound each write at 10s.
const PING_PERIOD: Duration = Duration::from_secs(54);
const PONG_TIMEOUT: Duration = Duration::from_secs(60);
const READ_TIMEOUT: Duration = Duration::from_secs(60);
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<axum::response::Response, StatusCode> {
    if state.shutdown.is_cancelled() {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    // Origin allow-list. A missing Origin header (non-browser client) is
    // allowed; an unlisted one is rejected before upgrade.
    if let Some(origin) = headers.get(header::ORIGIN) {
        let origin = origin.to_str().unwrap_or_default();
        if !state.config.allowed_origins.iter().any(|a| a == origin) {
            tracing::warn!(origin, "Blocked WebSocket upgrade from unlisted origin");
            return Err(StatusCode::FORBIDDEN);
        }
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state)).into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));

    let (ws_sender, ws_receiver) = socket.split();
    let queue = Arc::new(OutboundQueue::new());
    // Child of the process token: a shutdown cancels every session.
    let cancel = state.shutdown.child_token();
    let handle = SessionHandle::new(Arc::clone(&queue), cancel.clone());
    let last_pong = Arc::new(std::sync::Mutex::new(Instant::now()));

    let writer = tokio::spawn(write_loop(
        ws_sender,
        Arc::clone(&queue),
        cancel.clone(),
        Arc::clone(&last_pong),
    ));

    let mut session = Session::new(state.clone(), handle.clone());
    let player_id = session.player_id().clone();
    tracing::info!(player_id = %player_id, "WebSocket session opened");

    read_loop(ws_receiver, &mut session, &cancel, &last_pong).await;

    // Teardown. `close` is idempotent; room removal runs exactly once here,
    // after both loops are done taking locks.
    handle.close();
    if let Some(room) = session.take_room() {
        let emptied = room.remove_player(&player_id).await;
        if emptied {
            let registry = Arc::clone(&state.registry);
            let code = room.code().to_string();
            tokio::spawn(async move {
                registry.remove(&code).await;
            });
        }
    }
    let _ = writer.await;
    tracing::info!(player_id = %player_id, "WebSocket session closed");
}

async fn read_loop(
    mut receiver: SplitStream<WebSocket>,
    session: &mut Session,
    cancel: &CancellationToken,
    last_pong: &std::sync::Mutex<Instant>,
) {
    let mut deadline = Instant::now() + READ_TIMEOUT;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = tokio::time::timeout_at(deadline, receiver.next()) => match result {
                Err(_) => {
                    tracing::debug!(player_id = %session.player_id(), "Read deadline expired");
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    tracing::debug!(player_id = %session.player_id(), error = %e, "WebSocket read error");
                    break;
                }
                Ok(Some(Ok(msg))) => match msg {
                    Message::Text(text) => {
                        if text.as_str().len() > MAX_MESSAGE_SIZE {
                            tracing::debug!(player_id = %session.player_id(), "Dropped oversized frame");
                            continue;
                        }
                        session.handle_frame(text.as_str()).await;
                    }
                    Message::Pong(_) => {
                        deadline = Instant::now() + READ_TIMEOUT;
                        if let Ok(mut t) = last_pong.lock() {
                            *t = Instant::now();
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                },
            }
        }
    }
}

async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    queue: Arc<OutboundQueue>,
    cancel: CancellationToken,
    last_pong: Arc<std::sync::Mutex<Instant>>,
) {
    let mut ping = tokio::time::interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);
    let mut ping_sent_at = Instant::now();
    let mut pong_deadline: Option<Instant> = None;

    loop {
        let pong_check = {
            let deadline = pong_deadline;
            async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = queue.recv() => {
                let Some(frame) = frame else { break };
                let Ok(text) = std::str::from_utf8(&frame.payload) else {
                    tracing::error!("Outbound frame is not UTF-8");
                    continue;
                };
                match tokio::time::timeout(WRITE_TIMEOUT, sender.send(Message::Text(text.into()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(error = %e, "WebSocket write error");
                        break;
                    }
                    Err(_) => {
                        tracing::warn!("Write deadline expired");
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                match tokio::time::timeout(WRITE_TIMEOUT, sender.send(Message::Ping(Bytes::new()))).await {
                    Ok(Ok(())) => {
                        ping_sent_at = Instant::now();
                        pong_deadline = Some(ping_sent_at + PONG_TIMEOUT);
                    }
                    _ => break,
                }
            }
            _ = pong_check => {
                let alive = last_pong
                    .lock()
                    .map(|t| *t >= ping_sent_at)
                    .unwrap_or(false);
                if alive {
                    pong_deadline = None;
                } else {
                    tracing::warn!("Pong timeout, closing zombie connection");
                    break;
                }
            }
        }
    }

    cancel.cancel();
    queue.close();
    let _ = sender.close().await;
}
