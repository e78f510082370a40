use serde::{Deserialize, Serialize};

use crate::constants::{
    ARROW_DAMAGE, ARROW_PATH_TOLERANCE, ARROW_RANGE, MAGIC_DAMAGE, MAGIC_RADIUS, MELEE_DAMAGE,
    MELEE_RANGE,
};
use crate::player::{Player, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackType {
    Melee,
    Arrow,
    Magic,
}

impl AttackType {
    pub fn damage(self) -> i32 {
        match self {
            Self::Melee => MELEE_DAMAGE,
            Self::Arrow => ARROW_DAMAGE,
            Self::Magic => MAGIC_DAMAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

/// An attack intent: the attack coordinates come from the client report, the
/// attacker identity from the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackData {
    pub attacker_id: PlayerId,
    pub attack_type: AttackType,
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
    pub facing_right: bool,
}

pub fn distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    (dx * dx + dy * dy).sqrt()
}

/// Directional attacks require the victim on the side the attacker faces.
/// The comparison uses the attacker's position, not the attack coordinates.
fn is_facing(facing_right: bool, attacker_x: f64, victim_x: f64) -> bool {
    if facing_right {
        victim_x >= attacker_x
    } else {
        victim_x <= attacker_x
    }
}

/// Whether the attack connects with the victim. Distances are measured from
/// the attack coordinates; melee and arrows are directional, magic is an
/// area effect. All range bounds are inclusive.
pub fn attack_hits(attack: &AttackData, attacker: &Player, victim: &Player) -> bool {
    let dist = distance(attack.x, attack.y, victim.x, victim.y);
    match attack.attack_type {
        AttackType::Melee => {
            dist <= MELEE_RANGE && is_facing(attack.facing_right, attacker.x, victim.x)
        }
        AttackType::Arrow => {
            dist <= ARROW_RANGE
                && is_facing(attack.facing_right, attacker.x, victim.x)
                && (victim.y - attack.y).abs() <= ARROW_PATH_TOLERANCE
        }
        AttackType::Magic => dist <= MAGIC_RADIUS,
    }
}
