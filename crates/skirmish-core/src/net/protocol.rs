//! Wire protocol: UTF-8 JSON text frames carrying a `{type, data, timestamp}`
//! envelope.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::messages::{ClientMessage, ServerMessage};
use crate::time::now_millis;

/// Maximum frame size in bytes. Larger frames are discarded.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    UnknownMessageType(String),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMessageType(t) => write!(f, "unknown message type: {t}"),
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// The envelope wrapped around every message in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub timestamp: i64,
}

fn payload<T: DeserializeOwned>(data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

fn to_data<T: Serialize>(payload: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

fn encode(msg_type: &str, data: Value) -> Result<String, ProtocolError> {
    let envelope = Envelope {
        msg_type: msg_type.to_string(),
        data,
        timestamp: now_millis(),
    };
    serde_json::to_string(&envelope).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Decode a text frame into a `ClientMessage`.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))?;
    match envelope.msg_type.as_str() {
        "lobby_join" => Ok(ClientMessage::LobbyJoin(payload(envelope.data)?)),
        "lobby_ready" => Ok(ClientMessage::LobbyReady(payload(envelope.data)?)),
        "chat_message" => Ok(ClientMessage::Chat(payload(envelope.data)?)),
        "player_state" => Ok(ClientMessage::PlayerState(payload(envelope.data)?)),
        "player_attack" => Ok(ClientMessage::PlayerAttack(payload(envelope.data)?)),
        "ping" => Ok(ClientMessage::Ping(payload(envelope.data)?)),
        other => Err(ProtocolError::UnknownMessageType(other.to_string())),
    }
}

/// Encode a `ClientMessage` to a text frame.
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    let data = match msg {
        ClientMessage::LobbyJoin(m) => to_data(m)?,
        ClientMessage::LobbyReady(m) => to_data(m)?,
        ClientMessage::Chat(m) => to_data(m)?,
        ClientMessage::PlayerState(m) => to_data(m)?,
        ClientMessage::PlayerAttack(m) => to_data(m)?,
        ClientMessage::Ping(m) => to_data(m)?,
    };
    encode(msg.message_type(), data)
}

/// Encode a `ServerMessage` to a text frame.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    let data = match msg {
        ServerMessage::LobbyJoined(m) => to_data(m)?,
        ServerMessage::PlayerJoined(m) => to_data(m)?,
        ServerMessage::PlayerLeft(m) => to_data(m)?,
        ServerMessage::HostChanged(m) => to_data(m)?,
        ServerMessage::RoomState(m) => to_data(m)?,
        ServerMessage::PlayerReady(m) => to_data(m)?,
        ServerMessage::WaitTimerStarted(m) => to_data(m)?,
        ServerMessage::CountdownStarted(m) => to_data(m)?,
        ServerMessage::CountdownTick(m) => to_data(m)?,
        ServerMessage::CountdownCancelled => Value::Object(serde_json::Map::new()),
        ServerMessage::GameStarting(m) => to_data(m)?,
        ServerMessage::GameStateSync(m) => to_data(m)?,
        ServerMessage::PlayerAttack(m) => to_data(m)?,
        ServerMessage::PlayerHit(m) => to_data(m)?,
        ServerMessage::PlayerDeath(m) => to_data(m)?,
        ServerMessage::PlayerRespawn(m) => to_data(m)?,
        ServerMessage::MatchEnd(m) => to_data(m)?,
        ServerMessage::Chat(m) => to_data(m)?,
        ServerMessage::PositionCorrection(m) => to_data(m)?,
        ServerMessage::Error(m) => to_data(m)?,
        ServerMessage::Pong(m) => to_data(m)?,
    };
    encode(msg.message_type(), data)
}

/// Decode a text frame into a `ServerMessage`.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))?;
    match envelope.msg_type.as_str() {
        "lobby_joined" => Ok(ServerMessage::LobbyJoined(payload(envelope.data)?)),
        "player_joined" => Ok(ServerMessage::PlayerJoined(payload(envelope.data)?)),
        "player_left" => Ok(ServerMessage::PlayerLeft(payload(envelope.data)?)),
        "host_changed" => Ok(ServerMessage::HostChanged(payload(envelope.data)?)),
        "room_state" => Ok(ServerMessage::RoomState(payload(envelope.data)?)),
        "player_ready" => Ok(ServerMessage::PlayerReady(payload(envelope.data)?)),
        "wait_timer_started" => Ok(ServerMessage::WaitTimerStarted(payload(envelope.data)?)),
        "countdown_started" => Ok(ServerMessage::CountdownStarted(payload(envelope.data)?)),
        "countdown_tick" => Ok(ServerMessage::CountdownTick(payload(envelope.data)?)),
        "countdown_cancelled" => Ok(ServerMessage::CountdownCancelled),
        "game_starting" => Ok(ServerMessage::GameStarting(payload(envelope.data)?)),
        "game_state_sync" => Ok(ServerMessage::GameStateSync(payload(envelope.data)?)),
        "player_attack" => Ok(ServerMessage::PlayerAttack(payload(envelope.data)?)),
        "player_hit" => Ok(ServerMessage::PlayerHit(payload(envelope.data)?)),
        "player_death" => Ok(ServerMessage::PlayerDeath(payload(envelope.data)?)),
        "player_respawn" => Ok(ServerMessage::PlayerRespawn(payload(envelope.data)?)),
        "match_end" => Ok(ServerMessage::MatchEnd(payload(envelope.data)?)),
        "chat_message" => Ok(ServerMessage::Chat(payload(envelope.data)?)),
        "position_correction" => Ok(ServerMessage::PositionCorrection(payload(envelope.data)?)),
        "error" => Ok(ServerMessage::Error(payload(envelope.data)?)),
        "pong" => Ok(ServerMessage::Pong(payload(envelope.data)?)),
        other => Err(ProtocolError::UnknownMessageType(other.to_string())),
    }
}
