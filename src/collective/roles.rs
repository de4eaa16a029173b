//! Role assignment among nearby allies
//!
//! Purely local: every seeker derives its own role from the same
//! observations, so allies agree without talking to each other.

use serde::{Deserialize, Serialize};

use super::CollectiveMemory;
use crate::core::types::AgentId;
use crate::perception::AllyView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Fights alone
    Solo,
    /// Healthiest of the group; holds the front
    Tanker,
    /// Direct pressure
    Striker,
    /// Circles the target
    Flanker,
}

impl CollectiveMemory {
    /// Role for `agent` given its health and the allies it can see
    pub fn assign_role(&self, agent: AgentId, health_ratio: f32, enemies: usize, allies: &[AllyView]) -> Role {
        let living: Vec<&AllyView> = allies.iter().filter(|a| a.is_alive()).collect();
        if living.is_empty() || enemies == 0 {
            return Role::Solo;
        }

        let healthiest = living.iter().all(|ally| {
            health_ratio > ally.health_ratio || (health_ratio == ally.health_ratio && agent < ally.id)
        });
        if healthiest {
            return Role::Tanker;
        }

        if agent.identity_bit() {
            Role::Flanker
        } else {
            Role::Striker
        }
    }
}
