use serde::{Deserialize, Serialize};

use crate::constants::MAX_HEALTH;

pub type PlayerId = String;

/// A connected player's lobby and match state. The server is authoritative
/// for every field here; clients only propose changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub animation: String,
    pub facing_right: bool,
    pub health: i32,
    pub is_alive: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            is_host: false,
            is_ready: false,
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            animation: "idle".to_string(),
            facing_right: true,
            health: MAX_HEALTH,
            is_alive: true,
        }
    }
}

/// Generate a player identity: 128 bits from the CSPRNG rendered as 32
/// lowercase hex characters. Never derived from the clock.
pub fn generate_player_id() -> PlayerId {
    format!("{:032x}", rand::random::<u128>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_player_defaults() {
        let p = Player::new("abc".into(), "Alice".into());
        assert!(!p.is_host);
        assert!(!p.is_ready);
        assert_eq!(p.health, MAX_HEALTH);
        assert!(p.is_alive);
        assert_eq!(p.animation, "idle");
        assert!(p.facing_right);
        assert_eq!((p.x, p.y, p.vx, p.vy), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn generated_ids_are_32_hex_chars() {
        for _ in 0..50 {
            let id = generate_player_id();
            assert_eq!(id.len(), 32);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = generate_player_id();
        let b = generate_player_id();
        assert_ne!(a, b);
    }

    #[test]
    fn player_serializes_camel_case() {
        let p = Player::new("abc".into(), "Alice".into());
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["isHost"], false);
        assert_eq!(json["facingRight"], true);
        assert_eq!(json["isAlive"], true);
    }
}
