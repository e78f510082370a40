//! Per-connection controller: parses inbound frames and routes them to the
//! registry, the joined room, or straight back out the session's own queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use skirmish_core::constants::CHAT_BURST_LIMIT;
use skirmish_core::net::messages::{
    ClientMessage, ErrorMsg, LobbyJoinMsg, LobbyJoinedMsg, PongMsg, ServerMessage,
};
use skirmish_core::net::protocol::decode_client_message;
use skirmish_core::player::{Player, PlayerId, generate_player_id};
use skirmish_core::sanitize::{sanitize_chat, sanitize_name};

use crate::queue::SessionHandle;
use crate::room::Room;
use crate::state::AppState;

/// Fixed-window chat limiter: at most five messages per second. The window
/// is anchored at the first message after an idle second.
pub struct ChatLimiter {
    window_start: Instant,
    count: u32,
}

impl Default for ChatLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatLimiter {
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            count: 0,
        }
    }

    pub fn allow(&mut self, now: Instant) -> bool {
        if now.duration_since(self.window_start) < Duration::from_secs(1) {
            self.count += 1;
            self.count <= CHAT_BURST_LIMIT
        } else {
            self.count = 1;
            self.window_start = now;
            true
        }
    }
}

pub struct Session {
    state: AppState,
    handle: SessionHandle,
    player_id: PlayerId,
    room: Option<Arc<Room>>,
    chat_limiter: ChatLimiter,
}

impl Session {
    pub fn new(state: AppState, handle: SessionHandle) -> Self {
        Self {
            state,
            handle,
            player_id: generate_player_id(),
            room: None,
            chat_limiter: ChatLimiter::new(),
        }
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    /// Route one inbound text frame. Malformed input is logged and ignored;
    /// the connection stays open.
    pub async fn handle_frame(&mut self, text: &str) {
        let msg = match decode_client_message(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(player_id = %self.player_id, error = %e, "Ignoring unusable frame");
                return;
            }
        };

        match msg {
            ClientMessage::LobbyJoin(join) => self.on_lobby_join(join).await,
            ClientMessage::LobbyReady(ready) => {
                if let Some(room) = &self.room {
                    room.set_ready(&self.player_id, ready.is_ready).await;
                }
            }
            ClientMessage::Chat(chat) => self.on_chat(&chat.message).await,
            ClientMessage::PlayerState(update) => {
                if let Some(room) = &self.room {
                    room.apply_state_update(&self.player_id, update).await;
                }
            }
            ClientMessage::PlayerAttack(intent) => {
                if let Some(room) = &self.room {
                    room.process_attack(&self.player_id, intent).await;
                }
            }
            ClientMessage::Ping(ping) => {
                self.handle.send(&ServerMessage::Pong(PongMsg {
                    timestamp: ping.timestamp,
                }));
            }
        }
    }

    async fn on_lobby_join(&mut self, join: LobbyJoinMsg) {
        if self.room.is_some() {
            tracing::warn!(player_id = %self.player_id, "lobby_join while already in a room, ignoring");
            return;
        }
        let name = sanitize_name(join.player_name.as_deref().unwrap_or("Player"));
        let player = Player::new(self.player_id.clone(), name.clone());
        match self
            .state
            .registry
            .join(&join.room_code, player, self.handle.clone())
            .await
        {
            Ok((room, info)) => {
                self.room = Some(room);
                self.handle.send(&ServerMessage::LobbyJoined(LobbyJoinedMsg {
                    room_code: join.room_code,
                    player_id: self.player_id.clone(),
                    player_name: name,
                    is_host: info.is_host,
                    player_count: info.player_count,
                }));
            }
            Err(_) => {
                tracing::info!(player_id = %self.player_id, room = %join.room_code, "Join rejected, room is full");
                self.handle.send(&ServerMessage::Error(ErrorMsg {
                    message: "Room is full".to_string(),
                }));
            }
        }
    }

    async fn on_chat(&mut self, raw: &str) {
        let Some(room) = self.room.clone() else {
            return;
        };
        if !self.chat_limiter.allow(Instant::now()) {
            tracing::warn!(player_id = %self.player_id, "Chat rate limit exceeded");
            self.handle.send(&ServerMessage::Error(ErrorMsg {
                message: "Rate limit exceeded. Slow down!".to_string(),
            }));
            return;
        }
        let Some(message) = sanitize_chat(raw) else {
            return;
        };
        room.broadcast_chat(&self.player_id, message).await;
    }

    /// Detach from the joined room for disconnect cleanup.
    pub fn take_room(&mut self) -> Option<Arc<Room>> {
        self.room.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_limiter_allows_burst_of_five() {
        let mut limiter = ChatLimiter::new();
        let now = Instant::now();
        for _ in 0..5 {
            assert!(limiter.allow(now));
        }
        assert!(!limiter.allow(now));
    }

    #[test]
    fn chat_limiter_resets_after_window() {
        let mut limiter = ChatLimiter::new();
        let now = Instant::now();
        for _ in 0..6 {
            limiter.allow(now);
        }
        assert!(!limiter.allow(now));
        // A second later the window restarts.
        assert!(limiter.allow(now + Duration::from_secs(1)));
        assert!(limiter.allow(now + Duration::from_millis(1100)));
    }

    #[test]
    fn chat_limiter_window_anchored_at_first_message() {
        let mut limiter = ChatLimiter::new();
        let now = Instant::now();
        assert!(limiter.allow(now + Duration::from_secs(2)));
        for i in 0..4 {
            assert!(limiter.allow(now + Duration::from_secs(2) + Duration::from_millis(i * 100)));
        }
        assert!(!limiter.allow(now + Duration::from_millis(2900)));
    }
}
