use serde::{Deserialize, Serialize};

use crate::combat::{AttackData, AttackType, Direction};
use crate::player::PlayerId;

// ---------------------------------------------------------------------------
// Client -> server payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyJoinMsg {
    pub room_code: String,
    #[serde(default)]
    pub player_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyReadyMsg {
    pub is_ready: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendMsg {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateMsg {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    #[serde(default)]
    pub animation: Option<String>,
    #[serde(default)]
    pub facing_right: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAttackMsg {
    pub attack_type: AttackType,
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
    pub facing_right: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingMsg {
    #[serde(default)]
    pub timestamp: i64,
}

/// Every message a client may send.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    LobbyJoin(LobbyJoinMsg),
    LobbyReady(LobbyReadyMsg),
    Chat(ChatSendMsg),
    PlayerState(PlayerStateMsg),
    PlayerAttack(PlayerAttackMsg),
    Ping(PingMsg),
}

impl ClientMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::LobbyJoin(_) => "lobby_join",
            Self::LobbyReady(_) => "lobby_ready",
            Self::Chat(_) => "chat_message",
            Self::PlayerState(_) => "player_state",
            Self::PlayerAttack(_) => "player_attack",
            Self::Ping(_) => "ping",
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> client payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyJoinedMsg {
    pub room_code: String,
    pub player_id: PlayerId,
    pub player_name: String,
    pub is_host: bool,
    pub player_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinedMsg {
    pub player_id: PlayerId,
    pub player_name: String,
    pub is_host: bool,
    pub player_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeftMsg {
    pub player_id: PlayerId,
    pub player_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostChangedMsg {
    pub player_id: PlayerId,
}

/// One roster row in a `room_state` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPlayerEntry {
    pub player_id: PlayerId,
    pub player_name: String,
    pub is_host: bool,
    pub is_ready: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateMsg {
    pub room_code: String,
    pub players: Vec<LobbyPlayerEntry>,
    pub player_count: usize,
    pub max_players: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerReadyMsg {
    pub player_id: PlayerId,
    pub is_ready: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitTimerStartedMsg {
    pub duration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownStartedMsg {
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownTickMsg {
    pub remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStartingMsg {
    pub room_code: String,
}

/// One player's authoritative state in a `game_state_sync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub player_id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub animation: String,
    pub facing_right: bool,
    pub health: i32,
    pub is_alive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateSyncMsg {
    pub players: Vec<PlayerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerHitMsg {
    pub attacker_id: PlayerId,
    pub victim_id: PlayerId,
    pub damage: i32,
    pub health: i32,
    pub attack_type: AttackType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDeathMsg {
    pub victim_id: PlayerId,
    pub killer_id: PlayerId,
    pub victim_name: String,
    pub killer_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRespawnMsg {
    pub player_id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub health: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEndMsg {
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBroadcastMsg {
    pub player_id: String,
    pub player_name: String,
    pub message: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_system: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionCorrectionMsg {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMsg {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PongMsg {
    pub timestamp: i64,
}

/// Every message the server may send.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    LobbyJoined(LobbyJoinedMsg),
    PlayerJoined(PlayerJoinedMsg),
    PlayerLeft(PlayerLeftMsg),
    HostChanged(HostChangedMsg),
    RoomState(RoomStateMsg),
    PlayerReady(PlayerReadyMsg),
    WaitTimerStarted(WaitTimerStartedMsg),
    CountdownStarted(CountdownStartedMsg),
    CountdownTick(CountdownTickMsg),
    CountdownCancelled,
    GameStarting(GameStartingMsg),
    GameStateSync(GameStateSyncMsg),
    PlayerAttack(AttackData),
    PlayerHit(PlayerHitMsg),
    PlayerDeath(PlayerDeathMsg),
    PlayerRespawn(PlayerRespawnMsg),
    MatchEnd(MatchEndMsg),
    Chat(ChatBroadcastMsg),
    PositionCorrection(PositionCorrectionMsg),
    Error(ErrorMsg),
    Pong(PongMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::LobbyJoined(_) => "lobby_joined",
            Self::PlayerJoined(_) => "player_joined",
            Self::PlayerLeft(_) => "player_left",
            Self::HostChanged(_) => "host_changed",
            Self::RoomState(_) => "room_state",
            Self::PlayerReady(_) => "player_ready",
            Self::WaitTimerStarted(_) => "wait_timer_started",
            Self::CountdownStarted(_) => "countdown_started",
            Self::CountdownTick(_) => "countdown_tick",
            Self::CountdownCancelled => "countdown_cancelled",
            Self::GameStarting(_) => "game_starting",
            Self::GameStateSync(_) => "game_state_sync",
            Self::PlayerAttack(_) => "player_attack",
            Self::PlayerHit(_) => "player_hit",
            Self::PlayerDeath(_) => "player_death",
            Self::PlayerRespawn(_) => "player_respawn",
            Self::MatchEnd(_) => "match_end",
            Self::Chat(_) => "chat_message",
            Self::PositionCorrection(_) => "position_correction",
            Self::Error(_) => "error",
            Self::Pong(_) => "pong",
        }
    }

    /// Whether losing this message is tolerable for correctness. State sync
    /// frames are superseded by the next one; everything else must arrive or
    /// the session must close.
    pub fn is_droppable(&self) -> bool {
        matches!(self, Self::GameStateSync(_))
    }
}
