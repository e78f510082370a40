use std::time::Duration;

use crate::constants::{MAP_HEIGHT, MAP_WIDTH, MAX_MOVEMENT_PER_SEC, MAX_VELOCITY, MIN_UPDATE_DELTA_MS};

/// A position/velocity update proposed by a client.
#[derive(Debug, Clone, Copy)]
pub struct ProposedState {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

/// Outcome of validating a proposed update against the last accepted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementVerdict {
    /// All checks passed; apply and broadcast.
    Accepted,
    /// Update arrived inside the 16ms rate gate; silently ignored.
    RateLimited,
    /// A bound was violated; the offender gets the last accepted state back.
    Rejected,
}

/// Validate a state update. `elapsed` is the time since the last accepted
/// update for this player. Bounds are inclusive: an update at exactly the
/// velocity cap, the map edge, or the full movement budget is accepted.
pub fn validate_state_update(
    prev_x: f64,
    prev_y: f64,
    proposed: ProposedState,
    elapsed: Duration,
) -> MovementVerdict {
    if elapsed < Duration::from_millis(MIN_UPDATE_DELTA_MS) {
        return MovementVerdict::RateLimited;
    }

    if proposed.vx.abs() > MAX_VELOCITY || proposed.vy.abs() > MAX_VELOCITY {
        return MovementVerdict::Rejected;
    }

    if proposed.x < 0.0 || proposed.x > MAP_WIDTH || proposed.y < 0.0 || proposed.y > MAP_HEIGHT {
        return MovementVerdict::Rejected;
    }

    let max_distance = MAX_MOVEMENT_PER_SEC * elapsed.as_secs_f64();
    let dx = proposed.x - prev_x;
    let dy = proposed.y - prev_y;
    if (dx * dx + dy * dy).sqrt() > max_distance {
        return MovementVerdict::Rejected;
    }

    MovementVerdict::Accepted
}
