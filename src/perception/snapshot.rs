//! Perception snapshot types
//!
//! Immutable, serializable picture of one agent's surroundings at one
//! moment. Everything downstream (decision engine, inference channels)
//! works from a snapshot, never from live world state.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::brain::Traits;
use crate::core::types::{AgentId, ItemCategory, Millis, Stance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthBucket {
    Critical,
    Low,
    Moderate,
    Full,
}

impl HealthBucket {
    pub fn from_ratio(ratio: f32) -> Self {
        if ratio < 0.25 {
            HealthBucket::Critical
        } else if ratio < 0.5 {
            HealthBucket::Low
        } else if ratio < 0.9 {
            HealthBucket::Moderate
        } else {
            HealthBucket::Full
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllyHealth {
    Healthy,
    Wounded,
    Dead,
}

impl AllyHealth {
    pub fn from_ratio(alive: bool, ratio: f32) -> Self {
        if !alive {
            AllyHealth::Dead
        } else if ratio < 0.5 {
            AllyHealth::Wounded
        } else {
            AllyHealth::Healthy
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfView {
    pub position: Vec3,
    pub velocity: Vec3,
    pub facing: Vec3,
    pub health_ratio: f32,
    pub stance: Stance,
    pub held: ItemCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentView {
    pub id: AgentId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub facing: Vec3,
    pub distance: f32,
    pub health: HealthBucket,
    pub held: ItemCategory,
    pub line_of_sight: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllyView {
    pub id: AgentId,
    pub distance: f32,
    pub health: AllyHealth,
    pub health_ratio: f32,
}

impl AllyView {
    pub fn is_alive(&self) -> bool {
        self.health != AllyHealth::Dead
    }
}

/// Standing spot hidden from the nearest threat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverPoint {
    pub position: Vec3,
    pub distance: f32,
    /// 0.0 (barely hidden) to 1.0 (fully hidden, far from the threat)
    pub safety: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionSnapshot {
    pub agent: AgentId,
    pub taken_at: Millis,
    pub me: SelfView,
    /// Sorted nearest first
    pub opponents: Vec<OpponentView>,
    /// Sorted nearest first; includes fallen allies
    pub allies: Vec<AllyView>,
    pub cover: Option<CoverPoint>,
    pub traits: Traits,
}

impl PerceptionSnapshot {
    pub fn nearest_opponent(&self) -> Option<&OpponentView> {
        self.opponents.first()
    }

    pub fn opponent(&self, id: AgentId) -> Option<&OpponentView> {
        self.opponents.iter().find(|o| o.id == id)
    }

    pub fn living_allies(&self) -> impl Iterator<Item = &AllyView> {
        self.allies.iter().filter(|a| a.is_alive())
    }

    /// More opponents than this agent plus its living allies
    pub fn is_outnumbered(&self) -> bool {
        self.opponents.len() > self.living_allies().count() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_buckets() {
        assert_eq!(HealthBucket::from_ratio(0.1), HealthBucket::Critical);
        assert_eq!(HealthBucket::from_ratio(0.3), HealthBucket::Low);
        assert_eq!(HealthBucket::from_ratio(0.6), HealthBucket::Moderate);
        assert_eq!(HealthBucket::from_ratio(1.0), HealthBucket::Full);
    }

    #[test]
    fn test_ally_health() {
        assert_eq!(AllyHealth::from_ratio(false, 1.0), AllyHealth::Dead);
        assert_eq!(AllyHealth::from_ratio(true, 0.2), AllyHealth::Wounded);
        assert_eq!(AllyHealth::from_ratio(true, 0.8), AllyHealth::Healthy);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = PerceptionSnapshot {
            agent: AgentId::new(),
            taken_at: 1_000,
            me: SelfView {
                position: Vec3::ZERO,
                velocity: Vec3::ZERO,
                facing: Vec3::X,
                health_ratio: 1.0,
                stance: Stance::Standing,
                held: ItemCategory::Sword,
            },
            opponents: vec![],
            allies: vec![],
            cover: None,
            traits: Traits::default(),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"SWORD\""));
        let back: PerceptionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
