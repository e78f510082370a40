//! Read-only query API for lobby browsers.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use crate::error::AppError;
use crate::room::RoomSummary;
use crate::state::AppState;

/// Response for `GET /api/rooms`.
#[derive(Debug, Serialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomSummary>,
    pub count: usize,
}

/// GET /api/rooms — rooms that can still be joined (not full, not in-match).
pub async fn get_rooms(State(state): State<AppState>) -> Json<RoomListResponse> {
    let rooms: Vec<RoomSummary> = state
        .registry
        .summaries()
        .await
        .into_iter()
        .filter(|r| r.player_count < r.max_players && !r.is_game_active)
        .collect();
    tracing::debug!(count = rooms.len(), "Listed available rooms");
    let count = rooms.len();
    Json(RoomListResponse { rooms, count })
}

/// GET /api/rooms/{code} — one room's record, 404 when absent.
pub async fn get_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RoomSummary>, AppError> {
    match state.registry.get(&code).await {
        Some(room) => Ok(Json(room.summary().await)),
        None => Err(AppError::NotFound("Room not found".to_string())),
    }
}
