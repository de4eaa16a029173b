//! Population-wide shared memory
//!
//! Threat profiles of opponents plus two global biases (aggression and
//! fear) that every seeker reads each think cycle. Shared across threads
//! behind read-write locks; everything decays toward zero on `tick`.

pub mod roles;

pub use roles::Role;

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::config::CollectiveConfig;
use crate::core::types::{AgentId, ItemCategory};

/// Upper bound for biases and danger levels
const BIAS_CEILING: f32 = 1.0;

/// Exploitable opponent habit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Weakness {
    LowHealth,
    Unshielded,
    PoorAim,
    SlowRecovery,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreatProfile {
    pub danger: f32,
    pub preferred_weapon: Option<ItemCategory>,
    pub weakness: Option<Weakness>,
    pub kills: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalBiases {
    pub aggression: f32,
    pub fear: f32,
}

#[derive(Debug)]
pub struct CollectiveMemory {
    profiles: RwLock<AHashMap<AgentId, ThreatProfile>>,
    biases: RwLock<GlobalBiases>,
    config: CollectiveConfig,
}

impl CollectiveMemory {
    pub fn new(config: CollectiveConfig) -> Self {
        Self {
            profiles: RwLock::new(AHashMap::new()),
            biases: RwLock::new(GlobalBiases::default()),
            config,
        }
    }

    pub fn shared(config: CollectiveConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// An opponent weakness was spotted: remember it and push aggression up
    pub fn update_global_tactics(&self, opponent: AgentId, weakness: Weakness) {
        self.profiles.write().entry(opponent).or_default().weakness = Some(weakness);
        let mut biases = self.biases.write();
        biases.aggression = (biases.aggression + self.config.weakness_aggression).min(BIAS_CEILING);
    }

    /// An ally died; `distance` is how far the death was from the squad
    pub fn report_ally_death(&self, killer: Option<AgentId>, weapon: Option<ItemCategory>, distance: f32) {
        let close = distance < self.config.close_death_range;
        let fear = if close {
            self.config.close_death_fear
        } else {
            self.config.far_death_fear
        };

        {
            let mut biases = self.biases.write();
            biases.fear = (biases.fear + fear).min(BIAS_CEILING);
            if killer.is_some() {
                biases.aggression = (biases.aggression + self.config.retaliation_aggression).min(BIAS_CEILING);
            }
        }

        if let Some(killer) = killer {
            let mut profiles = self.profiles.write();
            let profile = profiles.entry(killer).or_default();
            profile.danger = (profile.danger + self.config.killer_danger).min(BIAS_CEILING);
            profile.kills += 1;
            if weapon.is_some() {
                profile.preferred_weapon = weapon;
            }
        }

        debug!(?killer, distance, close, "ally death reported");
    }

    pub fn record_weapon(&self, opponent: AgentId, weapon: ItemCategory) {
        self.profiles.write().entry(opponent).or_default().preferred_weapon = Some(weapon);
    }

    /// Forget an opponent entirely (e.g. it left the world)
    pub fn forget(&self, opponent: AgentId) {
        self.profiles.write().remove(&opponent);
    }

    /// Multiplicative decay of every bias and danger level
    pub fn tick(&self) {
        let (decay, floor) = (self.config.decay, self.config.prune_below);
        let snap = |value: f32| {
            let next = value * decay;
            if next < floor {
                0.0
            } else {
                next
            }
        };

        {
            let mut biases = self.biases.write();
            biases.aggression = snap(biases.aggression);
            biases.fear = snap(biases.fear);
        }

        let mut profiles = self.profiles.write();
        for profile in profiles.values_mut() {
            profile.danger = snap(profile.danger);
        }
        // Profiles with nothing left worth remembering
        profiles.retain(|_, p| p.danger > 0.0 || p.weakness.is_some() || p.preferred_weapon.is_some());
    }

    pub fn biases(&self) -> GlobalBiases {
        *self.biases.read()
    }

    pub fn profile(&self, opponent: AgentId) -> ThreatProfile {
        self.profiles.read().get(&opponent).cloned().unwrap_or_default()
    }

    pub fn danger(&self, opponent: AgentId) -> f32 {
        self.profiles.read().get(&opponent).map_or(0.0, |p| p.danger)
    }

    pub fn tracked_opponents(&self) -> usize {
        self.profiles.read().len()
    }
}
