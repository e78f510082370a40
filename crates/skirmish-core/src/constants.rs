//! Compiled gameplay and validation constants.

/// Maximum player velocity on either axis (pixels/second).
pub const MAX_VELOCITY: f64 = 400.0;

/// Maximum distance a player may travel per second (anti-teleport).
pub const MAX_MOVEMENT_PER_SEC: f64 = 500.0;

/// Arena dimensions in pixels.
pub const MAP_WIDTH: f64 = 1280.0;
pub const MAP_HEIGHT: f64 = 720.0;

/// Minimum milliseconds between accepted state updates (60 updates/sec).
pub const MIN_UPDATE_DELTA_MS: u64 = 16;

pub const MAX_PLAYERS_PER_ROOM: usize = 4;
pub const MIN_PLAYERS_TO_START: usize = 2;

/// Combat ranges (pixels).
pub const MELEE_RANGE: f64 = 30.0;
pub const ARROW_RANGE: f64 = 400.0;
/// Vertical tolerance around the arrow's flight path.
pub const ARROW_PATH_TOLERANCE: f64 = 50.0;
/// Area-of-effect radius for magic.
pub const MAGIC_RADIUS: f64 = 80.0;

pub const MELEE_DAMAGE: i32 = 15;
pub const ARROW_DAMAGE: i32 = 20;
pub const MAGIC_DAMAGE: i32 = 25;

pub const MAX_HEALTH: i32 = 100;

/// Per-session outbound queue capacity.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Display name and chat limits.
pub const NAME_MAX_CHARS: usize = 12;
pub const CHAT_MAX_CHARS: usize = 200;
/// Chat messages allowed per one-second window.
pub const CHAT_BURST_LIMIT: u32 = 5;
