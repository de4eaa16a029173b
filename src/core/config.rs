//! Engine configuration with documented constants
//!
//! All magic numbers are collected here with explanations of their purpose
//! and how they interact with each other. Every section can be overridden
//! from TOML; missing keys fall back to the tuned defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SeekerError};

/// Which decision strategy the engine runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecisionMode {
    /// Four-rule priority machine only
    Simple,
    /// Priority machine plus advantage branches, pattern counters and Q-learning
    #[default]
    Extended,
}

/// Reactive neuron tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuronConfig {
    /// Base decay for freshly created neurons
    ///
    /// This is the adaptation rate at zero urgency. At 0.15 a neuron covers
    /// ~85% of the gap to a constant input in about 12 calm updates.
    pub default_decay: f32,

    /// Lower bound for base decay after mimicry
    pub min_decay: f32,

    /// Upper bound for base decay after mimicry
    ///
    /// Keeps conformity from turning every neuron into a pure pass-through.
    pub max_decay: f32,

    /// Rate at which an agent copies the reaction speed of its ally leader
    pub conformity_rate: f32,
}

impl Default for NeuronConfig {
    fn default() -> Self {
        Self {
            default_decay: 0.15,
            min_decay: 0.05,
            max_decay: 0.9,
            conformity_rate: 0.05,
        }
    }
}

/// Perception tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Radius of the neighborhood scan (blocks)
    pub sensing_radius: f32,

    /// Half-width of the cube searched for cover (blocks)
    ///
    /// Cost grows with the cube of this value.
    pub cover_search_radius: i32,

    /// Eye height used for line-of-sight rays (blocks)
    pub eye_height: f32,

    /// Batch size above which snapshots are built in parallel
    pub parallel_threshold: usize,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            sensing_radius: 24.0,
            cover_search_radius: 8,
            eye_height: 1.62,
            parallel_threshold: 64,
        }
    }
}

/// Decision engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub mode: DecisionMode,

    /// Reflex neuron level that triggers an evasive step
    pub reflex_threshold: f32,

    /// Morale below which a very close opponent is only watched
    pub low_morale: f32,

    /// Morale above which the agent advances
    pub mid_morale: f32,

    /// Distance counted as "very close" (blocks)
    pub close_distance: f32,

    /// How strongly fear subtracts from morale
    pub fear_damping: f32,

    /// Look-ahead for opponent motion prediction (seconds)
    pub prediction_horizon_secs: f32,

    /// Acceleration magnitude scale for the prediction stability factor
    ///
    /// stability = 1 / (1 + k * |accel|); jittery opponents get damped
    /// predictions.
    pub acceleration_damping: f32,

    /// Closing speed that counts as a full-speed charge (blocks/second)
    pub closing_speed_fast: f32,

    /// Pattern match score needed for a counter-attack
    pub counter_match_threshold: f32,

    /// Composure needed to commit to a counter-attack
    pub counter_min_composure: f32,

    /// Tactical advantage below which the agent turns defensive
    pub defensive_advantage: f32,

    /// Tactical advantage above which the agent goes for the finish
    pub finishing_advantage: f32,

    /// Exploration probability for Q-table action selection
    pub exploration_rate: f32,

    /// Fraction of the own attack interval treated as "about to attack"
    pub self_sync_tolerance: f32,

    /// Fraction of the own attack interval treated as "just attacked"
    pub withdraw_fraction: f32,

    /// Passive frustration bleed per think cycle
    pub frustration_decay: f32,

    /// Minimum gap between voice lines of one agent (ms)
    pub voice_cooldown_ms: u64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            mode: DecisionMode::Extended,
            reflex_threshold: 0.8,
            low_morale: 0.2,
            mid_morale: 0.4,
            close_distance: 4.0,
            fear_damping: 0.6,
            prediction_horizon_secs: 0.5,
            acceleration_damping: 0.25,
            closing_speed_fast: 4.0,
            counter_match_threshold: 0.85,
            counter_min_composure: 0.4,
            defensive_advantage: -0.3,
            finishing_advantage: 0.5,
            exploration_rate: 0.1,
            self_sync_tolerance: 0.15,
            withdraw_fraction: 0.25,
            frustration_decay: 0.01,
            voice_cooldown_ms: 4_000,
        }
    }
}

/// Reinforcement learning and pattern statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// TD learning rate
    pub learning_rate: f32,

    /// TD discount factor
    pub discount: f32,

    /// Exponential smoothing factor for attack patterns
    pub pattern_smoothing: f32,

    /// Weight of a missed swing relative to a hit when smoothing distance
    ///
    /// Misses often come from out of reach, so they pull the learned
    /// distance less.
    pub miss_weight: f32,

    /// Reward per point of damage dealt (k1)
    pub reward_per_damage: f32,

    /// Penalty per point of damage taken (k2)
    pub penalty_per_damage: f32,

    /// Bonus for landing hits at close range while taking little damage
    pub pressure_bonus: f32,

    /// Range inside which the pressure bonus applies (blocks)
    pub pressure_range: f32,

    /// Recent damage taken below which pressure counts as successful
    pub pressure_damage_ceiling: f32,

    /// Sliding window for hit/taken-hit counts (ms)
    pub advantage_window_ms: u64,

    /// Time after an own attack during which the agent counts as recovering (ms)
    pub recovery_window_ms: u64,

    /// Frustration added when taking a hit
    pub frustration_on_hit_taken: f32,

    /// Frustration added when an own swing misses
    pub frustration_on_miss: f32,

    /// Frustration removed when landing a hit
    pub frustration_relief_on_hit: f32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.2,
            discount: 0.9,
            pattern_smoothing: 0.3,
            miss_weight: 0.5,
            reward_per_damage: 1.0,
            penalty_per_damage: 1.2,
            pressure_bonus: 0.5,
            pressure_range: 3.5,
            pressure_damage_ceiling: 2.0,
            advantage_window_ms: 10_000,
            recovery_window_ms: 800,
            frustration_on_hit_taken: 0.15,
            frustration_on_miss: 0.1,
            frustration_relief_on_hit: 0.2,
        }
    }
}

/// Population-wide shared memory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectiveConfig {
    /// Multiplicative decay per collective tick
    ///
    /// At 0.95 a bias halves in about 14 ticks.
    pub decay: f32,

    /// Aggression nudge when a weakness is identified
    pub weakness_aggression: f32,

    /// Deaths closer than this count as close-range (blocks)
    pub close_death_range: f32,

    /// Fear increment for a close-range ally death
    pub close_death_fear: f32,

    /// Fear increment for a distant ally death
    pub far_death_fear: f32,

    /// Danger added to the killer's profile per kill
    pub killer_danger: f32,

    /// Aggression nudge after an ally death (retaliation)
    pub retaliation_aggression: f32,

    /// Values below this snap to zero
    pub prune_below: f32,
}

impl Default for CollectiveConfig {
    fn default() -> Self {
        Self {
            decay: 0.95,
            weakness_aggression: 0.05,
            close_death_range: 8.0,
            close_death_fear: 0.2,
            far_death_fear: 0.08,
            killer_danger: 0.25,
            retaliation_aggression: 0.05,
            prune_below: 0.001,
        }
    }
}

/// Request scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// In-flight requests older than this are abandoned (ms)
    pub request_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
        }
    }
}

/// Movement execution tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    /// Horizontal impulse of an evasive step
    pub evade_speed: f32,

    /// Horizontal impulse of a burst toward the target
    pub burst_speed: f32,

    /// Vertical impulse added when a burst must hop an obstacle
    pub jump_bias: f32,

    /// Vertical impulse of an unobstructed burst
    pub flat_bias: f32,

    /// Lateral speed while orbiting or zig-zagging
    pub strafe_speed: f32,

    /// Forward share of an orbital step
    pub advance_fraction: f32,

    /// Time spent strafing to one side before switching (ms)
    pub orbit_period_ms: u64,

    /// Lateral amplitude of the zig-zag approach (blocks)
    ///
    /// Tuned so the lateral swing exceeds melee reach tolerance.
    pub zigzag_amplitude: f32,

    /// Full zig-zag oscillation period (ms)
    pub zigzag_period_ms: u64,

    /// Distance of a withdrawal pathing goal (blocks)
    pub retreat_distance: f32,

    /// Length of the forward obstruction probe (blocks)
    pub probe_distance: f32,

    /// Depth of the footing probe (blocks)
    pub footing_depth: i32,

    /// Voice lines reach observers within this radius (blocks)
    pub voice_radius: f32,

    /// Opponents within this radius push a scattering agent away (blocks)
    pub threat_radius: f32,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            evade_speed: 0.9,
            burst_speed: 1.2,
            jump_bias: 0.42,
            flat_bias: 0.1,
            strafe_speed: 0.35,
            advance_fraction: 0.5,
            orbit_period_ms: 800,
            zigzag_amplitude: 1.5,
            zigzag_period_ms: 600,
            retreat_distance: 8.0,
            probe_distance: 1.5,
            footing_depth: 3,
            voice_radius: 16.0,
            threat_radius: 24.0,
        }
    }
}

/// Skill ids cast alongside specific actions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillConfig {
    pub ambush: Option<String>,
    pub evade: Option<String>,
    pub counter: Option<String>,
    pub finisher: Option<String>,
}

impl Default for SkillConfig {
    fn default() -> Self {
        Self {
            ambush: Some("seeker:pounce".to_string()),
            evade: None,
            counter: Some("seeker:riposte".to_string()),
            finisher: Some("seeker:cleave".to_string()),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekerConfig {
    pub neuron: NeuronConfig,
    pub perception: PerceptionConfig,
    pub decision: DecisionConfig,
    pub learning: LearningConfig,
    pub collective: CollectiveConfig,
    pub orchestrator: OrchestratorConfig,
    pub actuator: ActuatorConfig,
    pub skills: SkillConfig,
}

impl SeekerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a (possibly partial) TOML document and validate it
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: SeekerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let n = &self.neuron;
        if !(0.0 < n.min_decay && n.min_decay <= n.default_decay && n.default_decay <= n.max_decay && n.max_decay <= 1.0) {
            return Err(SeekerError::Config(format!(
                "neuron decays must satisfy 0 < min ({}) <= default ({}) <= max ({}) <= 1",
                n.min_decay, n.default_decay, n.max_decay
            )));
        }

        let d = &self.decision;
        if d.low_morale >= d.mid_morale {
            return Err(SeekerError::Config(format!(
                "low_morale ({}) should be < mid_morale ({})",
                d.low_morale, d.mid_morale
            )));
        }
        if d.defensive_advantage >= d.finishing_advantage {
            return Err(SeekerError::Config(format!(
                "defensive_advantage ({}) should be < finishing_advantage ({})",
                d.defensive_advantage, d.finishing_advantage
            )));
        }
        if !(0.0..=1.0).contains(&d.exploration_rate) {
            return Err(SeekerError::Config("exploration_rate must be within [0, 1]".into()));
        }

        let l = &self.learning;
        if !(l.learning_rate > 0.0 && l.learning_rate <= 1.0) {
            return Err(SeekerError::Config("learning_rate must be within (0, 1]".into()));
        }
        if !(0.0..1.0).contains(&l.discount) {
            return Err(SeekerError::Config("discount must be within [0, 1)".into()));
        }
        if !(l.pattern_smoothing > 0.0 && l.pattern_smoothing <= 1.0) {
            return Err(SeekerError::Config("pattern_smoothing must be within (0, 1]".into()));
        }

        if !(self.collective.decay > 0.0 && self.collective.decay < 1.0) {
            return Err(SeekerError::Config("collective decay must be within (0, 1)".into()));
        }

        if self.perception.sensing_radius <= 0.0 {
            return Err(SeekerError::Config("sensing_radius must be positive".into()));
        }

        if self.orchestrator.request_timeout_ms == 0 {
            return Err(SeekerError::Config("request_timeout_ms must be positive".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SeekerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SeekerConfig::from_toml_str(
            r#"
            [decision]
            mode = "simple"
            reflex_threshold = 0.7

            [orchestrator]
            request_timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.decision.mode, DecisionMode::Simple);
        assert_eq!(config.decision.reflex_threshold, 0.7);
        assert_eq!(config.decision.mid_morale, 0.4);
        assert_eq!(config.orchestrator.request_timeout_ms, 250);
        assert_eq!(config.learning.discount, 0.9);
    }

    #[test]
    fn test_morale_thresholds_must_be_ordered() {
        let mut config = SeekerConfig::default();
        config.decision.low_morale = 0.5;
        config.decision.mid_morale = 0.4;
        assert!(matches!(config.validate(), Err(SeekerError::Config(_))));
    }

    #[test]
    fn test_decay_band_checked() {
        let mut config = SeekerConfig::default();
        config.neuron.min_decay = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let result = SeekerConfig::from_toml_str("[decision\nmode = 3");
        assert!(matches!(result, Err(SeekerError::TomlError(_))));
    }

    #[test]
    fn test_shipped_config_loads() {
        let config = SeekerConfig::load("data/seeker.toml").expect("shipped config should load");
        assert!(config.perception.sensing_radius > 0.0);
    }
}
