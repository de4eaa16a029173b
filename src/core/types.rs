//! Core type definitions used throughout the codebase

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Stable single bit derived from identity.
    ///
    /// Used wherever agents must split into two groups without talking to
    /// each other (roles, retreat side).
    pub fn identity_bit(&self) -> bool {
        self.0.as_u128() & 1 == 1
    }

    /// Stable seed for per-agent randomness
    pub fn seed(&self) -> u64 {
        let v = self.0.as_u128();
        (v as u64) ^ ((v >> 64) as u64)
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0.simple().to_string();
        write!(f, "{}", &s[..8])
    }
}

/// Simulation clock in milliseconds
pub type Millis = u64;

/// Faction membership; agents of different factions are hostile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct FactionId(pub u32);

/// What kind of actor an agent is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentKind {
    /// Driven by this engine
    Seeker,
    /// Human-controlled
    Player,
    /// Any other creature the host simulates
    Creature,
}

/// Body stance reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stance {
    #[default]
    Standing,
    Sneaking,
    Sprinting,
    Airborne,
}

/// Coarse category of the item an agent is holding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemCategory {
    #[default]
    Empty,
    Sword,
    Axe,
    Trident,
    Bow,
    Crossbow,
    Shield,
    Other,
}

impl ItemCategory {
    /// All categories
    pub fn all() -> &'static [ItemCategory] {
        &[
            ItemCategory::Empty,
            ItemCategory::Sword,
            ItemCategory::Axe,
            ItemCategory::Trident,
            ItemCategory::Bow,
            ItemCategory::Crossbow,
            ItemCategory::Shield,
            ItemCategory::Other,
        ]
    }

    /// Effective weapon reach in blocks
    pub fn reach(&self) -> f32 {
        match self {
            ItemCategory::Empty => 2.5,
            ItemCategory::Sword => 3.0,
            ItemCategory::Axe => 3.0,
            ItemCategory::Trident => 3.5,
            ItemCategory::Bow => 20.0,
            ItemCategory::Crossbow => 24.0,
            ItemCategory::Shield => 2.5,
            ItemCategory::Other => 2.5,
        }
    }

    pub fn is_ranged(&self) -> bool {
        matches!(self, ItemCategory::Bow | ItemCategory::Crossbow)
    }
}

/// Agent state as exposed by the host world
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub id: AgentId,
    pub kind: AgentKind,
    pub faction: FactionId,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Unit look direction
    pub facing: Vec3,
    pub health: f32,
    pub max_health: f32,
    pub stance: Stance,
    pub held: ItemCategory,
    pub alive: bool,
}

impl AgentState {
    pub fn new(id: AgentId, kind: AgentKind, faction: FactionId, position: Vec3) -> Self {
        Self {
            id,
            kind,
            faction,
            position,
            velocity: Vec3::ZERO,
            facing: Vec3::X,
            health: 20.0,
            max_health: 20.0,
            stance: Stance::Standing,
            held: ItemCategory::Empty,
            alive: true,
        }
    }

    /// Health as a fraction of max health (0.0 to 1.0)
    pub fn health_ratio(&self) -> f32 {
        if self.max_health <= 0.0 {
            return 0.0;
        }
        (self.health / self.max_health).clamp(0.0, 1.0)
    }

    pub fn eye_position(&self, eye_height: f32) -> Vec3 {
        self.position + Vec3::Y * eye_height
    }

    pub fn is_hostile_to(&self, other: &AgentState) -> bool {
        self.faction != other.faction
    }
}

/// Project a vector onto the horizontal plane (y is up)
pub fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_bit_is_stable() {
        let id = AgentId::new();
        assert_eq!(id.identity_bit(), id.identity_bit());
        assert_eq!(id.seed(), id.seed());
    }

    #[test]
    fn test_identity_bit_splits_population() {
        let ids: Vec<AgentId> = (0..200).map(|_| AgentId::new()).collect();
        let ones = ids.iter().filter(|id| id.identity_bit()).count();
        // Random v4 ids land on both sides
        assert!(ones > 0 && ones < 200);
    }

    #[test]
    fn test_health_ratio_bounded() {
        let mut agent = AgentState::new(AgentId::new(), AgentKind::Seeker, FactionId(0), Vec3::ZERO);
        agent.health = 30.0;
        assert_eq!(agent.health_ratio(), 1.0);
        agent.health = -5.0;
        assert_eq!(agent.health_ratio(), 0.0);
        agent.max_health = 0.0;
        assert_eq!(agent.health_ratio(), 0.0);
    }

    #[test]
    fn test_ranged_reach_exceeds_melee() {
        assert!(ItemCategory::Bow.reach() > ItemCategory::Sword.reach());
        assert!(ItemCategory::Bow.is_ranged());
        assert!(!ItemCategory::Trident.is_ranged());
    }

    #[test]
    fn test_item_category_serialization() {
        let json = serde_json::to_string(&ItemCategory::Crossbow).unwrap();
        assert_eq!(json, "\"CROSSBOW\"");
    }

    #[test]
    fn test_horizontal_drops_y() {
        let v = horizontal(Vec3::new(1.0, 5.0, -2.0));
        assert_eq!(v, Vec3::new(1.0, 0.0, -2.0));
    }
}
