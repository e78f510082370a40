//! The per-room state machine: membership, host election, the two lobby
//! timer phases, authoritative movement and combat application, and fan-out.
//!
//! Lock discipline: every operation mutates under the room mutex, collects
//! outbound messages into an outbox, and delivers them only after the guard
//! has dropped. Queue pushes are non-blocking and a session's close path
//! never takes the room lock, so delivery cannot re-enter the room.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use skirmish_core::combat::{AttackData, attack_hits};
use skirmish_core::constants::{MAX_HEALTH, MAX_PLAYERS_PER_ROOM, MIN_PLAYERS_TO_START};
use skirmish_core::movement::{MovementVerdict, ProposedState, validate_state_update};
use skirmish_core::net::messages::{
    ChatBroadcastMsg, CountdownStartedMsg, CountdownTickMsg, GameStateSyncMsg, GameStartingMsg,
    HostChangedMsg, LobbyPlayerEntry, MatchEndMsg, PlayerAttackMsg, PlayerDeathMsg, PlayerHitMsg,
    PlayerJoinedMsg, PlayerLeftMsg, PlayerReadyMsg, PlayerRespawnMsg, PlayerSnapshot,
    PlayerStateMsg, PositionCorrectionMsg, RoomStateMsg, ServerMessage, WaitTimerStartedMsg,
};
use skirmish_core::net::protocol::encode_server_message;
use skirmish_core::player::{Player, PlayerId};
use skirmish_core::time::now_millis;

use crate::config::TimingConfig;
use crate::queue::{Frame, SessionHandle};

/// A room member: the authoritative player record plus its delivery handle.
struct Member {
    player: Player,
    sender: SessionHandle,
    last_state_update: Instant,
}

struct RoomInner {
    members: HashMap<PlayerId, Member>,
    host_id: Option<PlayerId>,
    is_game_active: bool,
    wait_timer: Option<JoinHandle<()>>,
    countdown_active: bool,
    countdown_remaining: u32,
    countdown_cancel: CancellationToken,
}

/// Messages staged under the lock, delivered after it is released.
type Outbox = Vec<(SessionHandle, Frame)>;

/// Details echoed back to a player that just joined.
#[derive(Debug, Clone, Copy)]
pub struct JoinInfo {
    pub is_host: bool,
    pub player_count: usize,
}

#[derive(Debug)]
pub struct RoomFull;

/// Room record for the query API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub code: String,
    pub player_count: usize,
    pub max_players: usize,
    pub is_game_active: bool,
    pub host_name: String,
}

pub struct Room {
    code: String,
    timing: TimingConfig,
    me: Weak<Room>,
    inner: Mutex<RoomInner>,
}

fn encode(msg: &ServerMessage) -> Option<Frame> {
    match encode_server_message(msg) {
        Ok(text) => Some(Frame::new(text, msg.is_droppable())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode server message");
            None
        }
    }
}

fn push_broadcast(
    inner: &RoomInner,
    outbox: &mut Outbox,
    msg: &ServerMessage,
    exclude: Option<&PlayerId>,
) {
    let Some(frame) = encode(msg) else { return };
    for (id, member) in &inner.members {
        if exclude.is_some_and(|ex| ex == id) {
            continue;
        }
        outbox.push((member.sender.clone(), frame.clone()));
    }
}

fn push_to(outbox: &mut Outbox, sender: &SessionHandle, msg: &ServerMessage) {
    if let Some(frame) = encode(msg) {
        outbox.push((sender.clone(), frame));
    }
}

fn deliver(outbox: Outbox) {
    for (sender, frame) in outbox {
        sender.send_frame(frame);
    }
}

fn can_start(inner: &RoomInner) -> bool {
    inner.members.len() >= MIN_PLAYERS_TO_START
        && inner.members.values().all(|m| m.player.is_ready)
}

fn snapshot_states(inner: &RoomInner) -> Vec<PlayerSnapshot> {
    inner
        .members
        .values()
        .map(|m| PlayerSnapshot {
            player_id: m.player.id.clone(),
            x: m.player.x,
            y: m.player.y,
            vx: m.player.vx,
            vy: m.player.vy,
            animation: m.player.animation.clone(),
            facing_right: m.player.facing_right,
            health: m.player.health,
            is_alive: m.player.is_alive,
        })
        .collect()
}

fn system_chat(text: String) -> ServerMessage {
    ServerMessage::Chat(ChatBroadcastMsg {
        player_id: "system".to_string(),
        player_name: "System".to_string(),
        message: text,
        timestamp: now_millis(),
        is_system: true,
    })
}

impl Room {
    pub fn new(code: String, timing: TimingConfig) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            code,
            timing,
            me: me.clone(),
            inner: Mutex::new(RoomInner {
                members: HashMap::new(),
                host_id: None,
                is_game_active: false,
                wait_timer: None,
                countdown_active: false,
                countdown_remaining: 0,
                countdown_cancel: CancellationToken::new(),
            }),
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Add a player. The first member becomes host; the second join arms the
    /// wait timer.
    pub async fn add_player(
        &self,
        mut player: Player,
        sender: SessionHandle,
    ) -> Result<JoinInfo, RoomFull> {
        let mut outbox = Outbox::new();
        let info;
        {
            let mut inner = self.inner.lock().await;
            if inner.members.len() >= MAX_PLAYERS_PER_ROOM {
                return Err(RoomFull);
            }

            if inner.members.is_empty() {
                player.is_host = true;
                inner.host_id = Some(player.id.clone());
                tracing::info!(player_id = %player.id, room = %self.code, "Player is host");
            }

            let id = player.id.clone();
            let name = player.name.clone();
            let is_host = player.is_host;
            inner.members.insert(
                id.clone(),
                Member {
                    player,
                    sender: sender.clone(),
                    last_state_update: Instant::now(),
                },
            );
            let count = inner.members.len();
            tracing::info!(player_id = %id, room = %self.code, count, "Player joined room");

            push_broadcast(
                &inner,
                &mut outbox,
                &ServerMessage::PlayerJoined(PlayerJoinedMsg {
                    player_id: id.clone(),
                    player_name: name.clone(),
                    is_host,
                    player_count: count,
                }),
                Some(&id),
            );
            push_broadcast(
                &inner,
                &mut outbox,
                &system_chat(format!("{name} joined the room")),
                None,
            );

            let players: Vec<LobbyPlayerEntry> = inner
                .members
                .values()
                .map(|m| LobbyPlayerEntry {
                    player_id: m.player.id.clone(),
                    player_name: m.player.name.clone(),
                    is_host: m.player.is_host,
                    is_ready: m.player.is_ready,
                })
                .collect();
            push_to(
                &mut outbox,
                &sender,
                &ServerMessage::RoomState(RoomStateMsg {
                    room_code: self.code.clone(),
                    players,
                    player_count: count,
                    max_players: MAX_PLAYERS_PER_ROOM,
                }),
            );

            if count == MIN_PLAYERS_TO_START {
                self.arm_wait_timer(&mut inner, &mut outbox);
            }

            info = JoinInfo {
                is_host,
                player_count: count,
            };
        }
        deliver(outbox);
        Ok(info)
    }

    /// Remove a player. Returns `true` when the room emptied; the caller
    /// then schedules registry removal on a detached task.
    pub async fn remove_player(&self, player_id: &PlayerId) -> bool {
        let mut outbox = Outbox::new();
        {
            let mut inner = self.inner.lock().await;
            let Some(removed) = inner.members.remove(player_id) else {
                return false;
            };
            let name = removed.player.name.clone();
            let count = inner.members.len();
            tracing::info!(player_id = %player_id, room = %self.code, count, "Player left room");

            if inner.members.is_empty() {
                self.cleanup(&mut inner);
                return true;
            }

            if removed.player.is_host {
                let new_host = inner.members.values_mut().next().map(|m| {
                    m.player.is_host = true;
                    m.player.id.clone()
                });
                if let Some(new_host) = new_host {
                    inner.host_id = Some(new_host.clone());
                    tracing::info!(player_id = %new_host, room = %self.code, "Host reassigned");
                    push_broadcast(
                        &inner,
                        &mut outbox,
                        &ServerMessage::HostChanged(HostChangedMsg { player_id: new_host }),
                        None,
                    );
                }
            }

            push_broadcast(
                &inner,
                &mut outbox,
                &ServerMessage::PlayerLeft(PlayerLeftMsg {
                    player_id: player_id.clone(),
                    player_count: count,
                }),
                None,
            );
            push_broadcast(
                &inner,
                &mut outbox,
                &system_chat(format!("{name} left the room")),
                None,
            );

            if !can_start(&inner) {
                self.stop_countdown(&mut inner, &mut outbox);
            }
        }
        deliver(outbox);
        false
    }

    /// Flip a player's ready flag and re-evaluate the countdown conditions.
    pub async fn set_ready(&self, player_id: &PlayerId, is_ready: bool) {
        let mut outbox = Outbox::new();
        {
            let mut inner = self.inner.lock().await;
            let Some(member) = inner.members.get_mut(player_id) else {
                return;
            };
            member.player.is_ready = is_ready;
            push_broadcast(
                &inner,
                &mut outbox,
                &ServerMessage::PlayerReady(PlayerReadyMsg {
                    player_id: player_id.clone(),
                    is_ready,
                }),
                None,
            );
            self.check_ready_state(&mut inner, &mut outbox);
        }
        deliver(outbox);
    }

    fn check_ready_state(&self, inner: &mut RoomInner, outbox: &mut Outbox) {
        if !can_start(inner) {
            self.stop_countdown(inner, outbox);
            return;
        }
        if !inner.countdown_active
            && !inner.is_game_active
            && inner.members.len() >= MIN_PLAYERS_TO_START
        {
            self.start_countdown(inner, outbox);
        }
    }

    fn arm_wait_timer(&self, inner: &mut RoomInner, outbox: &mut Outbox) {
        let wait = Duration::from_secs(self.timing.wait_timer_secs);
        let me = self.me.clone();
        tracing::info!(room = %self.code, secs = self.timing.wait_timer_secs, "Wait timer armed");
        inner.wait_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            if let Some(room) = me.upgrade() {
                room.wait_timer_fired().await;
            }
        }));
        push_broadcast(
            inner,
            outbox,
            &ServerMessage::WaitTimerStarted(WaitTimerStartedMsg {
                duration: self.timing.wait_timer_secs,
            }),
            None,
        );
    }

    /// A fired timer is a hint, not a commitment: conditions are re-checked
    /// under the lock.
    async fn wait_timer_fired(&self) {
        let mut outbox = Outbox::new();
        {
            let mut inner = self.inner.lock().await;
            inner.wait_timer = None;
            if can_start(&inner) && !inner.countdown_active && !inner.is_game_active {
                tracing::info!(room = %self.code, "Wait timer expired, starting countdown");
                self.start_countdown(&mut inner, &mut outbox);
            } else {
                tracing::debug!(room = %self.code, "Wait timer expired, conditions not met");
            }
        }
        deliver(outbox);
    }

    fn start_countdown(&self, inner: &mut RoomInner, outbox: &mut Outbox) {
        if inner.countdown_active {
            return;
        }
        // Only one timer phase may be live.
        if let Some(timer) = inner.wait_timer.take() {
            timer.abort();
        }
        inner.countdown_active = true;
        inner.countdown_remaining = self.timing.countdown_start;
        let cancel = CancellationToken::new();
        inner.countdown_cancel = cancel.clone();
        tracing::info!(room = %self.code, remaining = inner.countdown_remaining, "Countdown started");
        push_broadcast(
            inner,
            outbox,
            &ServerMessage::CountdownStarted(CountdownStartedMsg {
                remaining: inner.countdown_remaining,
            }),
            None,
        );

        let me = self.me.clone();
        let tick = Duration::from_millis(self.timing.countdown_tick_ms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => {
                        let Some(room) = me.upgrade() else { return };
                        if room.countdown_tick().await {
                            return;
                        }
                    }
                }
            }
        });
    }

    /// One countdown tick. Returns `true` when the tick task should stop.
    /// The lock is held only for the counter mutation and member snapshot;
    /// every send happens with the lock released.
    async fn countdown_tick(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.countdown_active {
            return true;
        }
        inner.countdown_remaining = inner.countdown_remaining.saturating_sub(1);
        let remaining = inner.countdown_remaining;
        let targets: Vec<SessionHandle> =
            inner.members.values().map(|m| m.sender.clone()).collect();

        if remaining == 0 {
            drop(inner);
            if let Some(frame) = encode(&ServerMessage::GameStarting(GameStartingMsg {
                room_code: self.code.clone(),
            })) {
                for target in &targets {
                    target.send_frame(frame.clone());
                }
            }
            let mut inner = self.inner.lock().await;
            // A cancellation may have raced the final tick.
            if inner.countdown_active {
                inner.countdown_active = false;
                inner.is_game_active = true;
                tracing::info!(room = %self.code, "Match started");
            }
            true
        } else {
            drop(inner);
            if let Some(frame) =
                encode(&ServerMessage::CountdownTick(CountdownTickMsg { remaining }))
            {
                for target in &targets {
                    target.send_frame(frame.clone());
                }
            }
            false
        }
    }

    /// Idempotent: only an active countdown broadcasts the cancellation.
    fn stop_countdown(&self, inner: &mut RoomInner, outbox: &mut Outbox) {
        if !inner.countdown_active {
            return;
        }
        inner.countdown_active = false;
        inner.countdown_remaining = 0;
        inner.countdown_cancel.cancel();
        tracing::info!(room = %self.code, "Countdown cancelled");
        push_broadcast(inner, outbox, &ServerMessage::CountdownCancelled, None);
    }

    fn cleanup(&self, inner: &mut RoomInner) {
        if let Some(timer) = inner.wait_timer.take() {
            timer.abort();
        }
        inner.countdown_cancel.cancel();
        inner.countdown_active = false;
        inner.countdown_remaining = 0;
        tracing::info!(room = %self.code, "Room emptied, timers stopped");
    }

    /// Relay a sanitized chat line from a member to the whole room.
    pub async fn broadcast_chat(&self, player_id: &PlayerId, message: String) {
        let mut outbox = Outbox::new();
        {
            let inner = self.inner.lock().await;
            let Some(member) = inner.members.get(player_id) else {
                return;
            };
            let msg = ServerMessage::Chat(ChatBroadcastMsg {
                player_id: player_id.clone(),
                player_name: member.player.name.clone(),
                message,
                timestamp: now_millis(),
                is_system: false,
            });
            push_broadcast(&inner, &mut outbox, &msg, None);
        }
        deliver(outbox);
    }

    /// Validate and apply a state update. Acceptance syncs the whole room;
    /// rejection corrects the offender alone; rate-gated updates vanish.
    pub async fn apply_state_update(&self, player_id: &PlayerId, update: PlayerStateMsg) {
        let mut outbox = Outbox::new();
        {
            let mut inner = self.inner.lock().await;
            if !inner.is_game_active {
                return;
            }
            let Some(member) = inner.members.get_mut(player_id) else {
                return;
            };
            let now = Instant::now();
            let elapsed = now.duration_since(member.last_state_update);
            let proposed = ProposedState {
                x: update.x,
                y: update.y,
                vx: update.vx,
                vy: update.vy,
            };
            match validate_state_update(member.player.x, member.player.y, proposed, elapsed) {
                MovementVerdict::RateLimited => {}
                MovementVerdict::Rejected => {
                    tracing::warn!(
                        player_id = %player_id,
                        room = %self.code,
                        x = update.x,
                        y = update.y,
                        "Rejected state update, sending correction"
                    );
                    let correction = ServerMessage::PositionCorrection(PositionCorrectionMsg {
                        x: member.player.x,
                        y: member.player.y,
                        vx: member.player.vx,
                        vy: member.player.vy,
                    });
                    let sender = member.sender.clone();
                    push_to(&mut outbox, &sender, &correction);
                }
                MovementVerdict::Accepted => {
                    member.player.x = update.x;
                    member.player.y = update.y;
                    member.player.vx = update.vx;
                    member.player.vy = update.vy;
                    if let Some(animation) = update.animation {
                        member.player.animation = animation;
                    }
                    if let Some(facing) = update.facing_right {
                        member.player.facing_right = facing;
                    }
                    member.last_state_update = now;

                    let sync = ServerMessage::GameStateSync(GameStateSyncMsg {
                        players: snapshot_states(&inner),
                    });
                    push_broadcast(&inner, &mut outbox, &sync, None);
                }
            }
        }
        deliver(outbox);
    }

    /// Resolve an attack with server authority: hit detection, damage,
    /// deaths, match end, then the visual rebroadcast to everyone.
    pub async fn process_attack(&self, attacker_id: &PlayerId, intent: PlayerAttackMsg) {
        let mut outbox = Outbox::new();
        {
            let mut inner = self.inner.lock().await;
            if !inner.is_game_active {
                return;
            }
            let Some(attacker) = inner.members.get(attacker_id) else {
                return;
            };
            if !attacker.player.is_alive {
                tracing::debug!(player_id = %attacker_id, room = %self.code, "Dead player attempted attack");
                return;
            }
            let attacker_state = attacker.player.clone();
            let attack = AttackData {
                attacker_id: attacker_id.clone(),
                attack_type: intent.attack_type,
                x: intent.x,
                y: intent.y,
                direction: intent.direction,
                facing_right: intent.facing_right,
            };

            let victims: Vec<PlayerId> = inner
                .members
                .values()
                .filter(|m| m.player.id != *attacker_id && m.player.is_alive)
                .filter(|m| attack_hits(&attack, &attacker_state, &m.player))
                .map(|m| m.player.id.clone())
                .collect();

            let damage = attack.attack_type.damage();
            for victim_id in victims {
                let (health, victim_name, died) = {
                    let Some(victim) = inner.members.get_mut(&victim_id) else {
                        continue;
                    };
                    victim.player.health = (victim.player.health - damage).max(0);
                    let died = victim.player.health == 0 && victim.player.is_alive;
                    if died {
                        victim.player.is_alive = false;
                    }
                    (victim.player.health, victim.player.name.clone(), died)
                };

                tracing::info!(
                    attacker = %attacker_id,
                    victim = %victim_id,
                    damage,
                    health,
                    room = %self.code,
                    "Hit landed"
                );
                push_broadcast(
                    &inner,
                    &mut outbox,
                    &ServerMessage::PlayerHit(PlayerHitMsg {
                        attacker_id: attacker_id.clone(),
                        victim_id: victim_id.clone(),
                        damage,
                        health,
                        attack_type: attack.attack_type,
                    }),
                    None,
                );

                if died {
                    tracing::info!(victim = %victim_id, killer = %attacker_id, room = %self.code, "Player eliminated");
                    push_broadcast(
                        &inner,
                        &mut outbox,
                        &ServerMessage::PlayerDeath(PlayerDeathMsg {
                            victim_id: victim_id.clone(),
                            killer_id: attacker_id.clone(),
                            victim_name,
                            killer_name: attacker_state.name.clone(),
                        }),
                        None,
                    );

                    let alive_count = inner.members.values().filter(|m| m.player.is_alive).count();
                    if alive_count <= 1 && inner.is_game_active {
                        let winner = inner
                            .members
                            .values()
                            .find(|m| m.player.is_alive)
                            .map(|m| (m.player.id.clone(), m.player.name.clone()));
                        inner.is_game_active = false;
                        let end = match winner {
                            Some((winner_id, winner_name)) => {
                                tracing::info!(winner = %winner_id, room = %self.code, "Match ended");
                                MatchEndMsg {
                                    reason: "last_standing".to_string(),
                                    winner_id: Some(winner_id),
                                    winner_name: Some(winner_name),
                                }
                            }
                            None => {
                                tracing::info!(room = %self.code, "Match ended in a draw");
                                MatchEndMsg {
                                    reason: "draw".to_string(),
                                    winner_id: None,
                                    winner_name: None,
                                }
                            }
                        };
                        push_broadcast(&inner, &mut outbox, &ServerMessage::MatchEnd(end), None);
                    }
                }
            }

            // Visual-effect rebroadcast, hit or miss.
            push_broadcast(&inner, &mut outbox, &ServerMessage::PlayerAttack(attack), None);
        }
        deliver(outbox);
    }

    /// Administrative hook: put an eliminated player back into the match.
    /// No client message routes here.
    pub async fn respawn_player(&self, player_id: &PlayerId, x: f64, y: f64) {
        let mut outbox = Outbox::new();
        {
            let mut inner = self.inner.lock().await;
            let Some(member) = inner.members.get_mut(player_id) else {
                return;
            };
            member.player.health = MAX_HEALTH;
            member.player.is_alive = true;
            member.player.x = x;
            member.player.y = y;
            member.player.vx = 0.0;
            member.player.vy = 0.0;
            let health = member.player.health;
            tracing::info!(player_id = %player_id, room = %self.code, x, y, "Player respawned");
            push_broadcast(
                &inner,
                &mut outbox,
                &ServerMessage::PlayerRespawn(PlayerRespawnMsg {
                    player_id: player_id.clone(),
                    x,
                    y,
                    health,
                }),
                None,
            );
        }
        deliver(outbox);
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.members.is_empty()
    }

    pub async fn summary(&self) -> RoomSummary {
        let inner = self.inner.lock().await;
        let host_name = inner
            .host_id
            .as_ref()
            .and_then(|id| inner.members.get(id))
            .map(|m| m.player.name.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        RoomSummary {
            code: self.code.clone(),
            player_count: inner.members.len(),
            max_players: MAX_PLAYERS_PER_ROOM,
            is_game_active: inner.is_game_active,
            host_name,
        }
    }

    #[cfg(test)]
    pub(crate) async fn force_game_active(&self) {
        let mut inner = self.inner.lock().await;
        inner.is_game_active = true;
    }

    #[cfg(test)]
    pub(crate) async fn debug_flags(&self) -> (usize, Option<PlayerId>, bool, bool) {
        let inner = self.inner.lock().await;
        (
            inner.members.len(),
            inner.host_id.clone(),
            inner.is_game_active,
            inner.countdown_active,
        )
    }

    #[cfg(test)]
    pub(crate) async fn backdate_last_update(&self, player_id: &PlayerId, by: Duration) {
        let mut inner = self.inner.lock().await;
        if let Some(member) = inner.members.get_mut(player_id) {
            member.last_state_update = Instant::now() - by;
        }
    }
}
