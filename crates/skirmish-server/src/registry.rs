//! Global directory of active rooms. The registry lock is the outer lock;
//! room locks are only ever taken while it is held (join) or after it is
//! released (queries) — never the other way around.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use skirmish_core::player::Player;

use crate::config::TimingConfig;
use crate::queue::SessionHandle;
use crate::room::{JoinInfo, Room, RoomFull, RoomSummary};

pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    timing: TimingConfig,
}

impl RoomRegistry {
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            timing,
        }
    }

    /// Join the room with the given code, creating it lazily. Fails only
    /// when the room is at capacity.
    pub async fn join(
        &self,
        code: &str,
        player: Player,
        sender: SessionHandle,
    ) -> Result<(Arc<Room>, JoinInfo), RoomFull> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .entry(code.to_string())
            .or_insert_with(|| {
                tracing::info!(room = code, "Created room");
                Room::new(code.to_string(), self.timing.clone())
            })
            .clone();
        let info = room.add_player(player, sender).await?;
        Ok((room, info))
    }

    /// Remove a room once it has emptied. Runs on a detached task after the
    /// last leave; emptiness is re-checked under the room lock in case a
    /// join won the race.
    pub async fn remove(&self, code: &str) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get(code) else { return };
        if room.is_empty().await {
            rooms.remove(code);
            tracing::info!(room = code, "Removed empty room");
        } else {
            tracing::debug!(room = code, "Skipped removal, room was re-joined");
        }
    }

    pub async fn get(&self, code: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(code).cloned()
    }

    /// Point-in-time records of every room for the query API.
    pub async fn summaries(&self) -> Vec<RoomSummary> {
        let rooms: Vec<Arc<Room>> = self.rooms.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(rooms.len());
        for room in rooms {
            out.push(room.summary().await);
        }
        out
    }

    #[cfg(test)]
    pub(crate) async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
