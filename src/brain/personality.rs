//! Seeker personality loaded from TOML
//!
//! A personality fixes the baseline traits of a population; each agent
//! gets a small deterministic jitter on top so no two seekers behave
//! exactly alike.

use std::fs;
use std::path::PathBuf;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::AgentId;

/// Per-agent traits (0.0 to 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Traits {
    /// Resistance to fear (0.0 = skittish, 1.0 = fearless)
    pub bravery: f32,
    /// Baseline drive to engage (0.0 = passive, 1.0 = relentless)
    pub aggressiveness: f32,
}

impl Default for Traits {
    fn default() -> Self {
        Self {
            bravery: 0.5,
            aggressiveness: 0.5,
        }
    }
}

/// Complete personality configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Personality {
    /// Name of this personality (set from filename)
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub traits: Traits,
    /// Maximum per-agent deviation applied to each trait
    #[serde(default = "default_jitter")]
    pub jitter: f32,
}

fn default_jitter() -> f32 {
    0.1
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            traits: Traits::default(),
            jitter: default_jitter(),
        }
    }
}

impl Personality {
    /// Traits for one agent, stable across calls
    pub fn traits_for(&self, agent: AgentId) -> Traits {
        let mut rng = ChaCha8Rng::seed_from_u64(agent.seed());
        let jitter = self.jitter.abs();
        let mut offset = || if jitter > 0.0 { rng.gen_range(-jitter..=jitter) } else { 0.0 };
        Traits {
            bravery: (self.traits.bravery + offset()).clamp(0.0, 1.0),
            aggressiveness: (self.traits.aggressiveness + offset()).clamp(0.0, 1.0),
        }
    }
}

/// Load personality from TOML file
///
/// Loads from `data/personalities/{name}.toml`
pub fn load_personality(name: &str) -> Result<Personality> {
    let path = personality_path(name);
    let contents = fs::read_to_string(&path)?;
    let mut personality: Personality = toml::from_str(&contents)?;
    personality.name = name.to_string();
    Ok(personality)
}

/// Get path to personality file
fn personality_path(name: &str) -> PathBuf {
    PathBuf::from("data/personalities").join(format!("{}.toml", name))
}
