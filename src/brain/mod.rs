//! Per-agent brain
//!
//! Owns everything one seeker learns: neuron graph, attack patterns of
//! each observed opponent and of itself, the Q-table, and a short-term
//! memory of recent hits.

pub mod memory;
pub mod neuron;
pub mod pattern;
pub mod personality;
pub mod qtable;

pub use memory::ShortTermMemory;
pub use neuron::{Neuron, NeuronGraph, NeuronKind};
pub use pattern::AttackPattern;
pub use personality::{load_personality, Personality, Traits};
pub use qtable::{QTable, StateKey, TacticalAction};

use ahash::AHashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::core::config::{LearningConfig, SeekerConfig};
use crate::core::types::{AgentId, Millis};

/// Serializable digest of a brain for logs and reports
#[derive(Debug, Clone, Serialize)]
pub struct BrainSummary {
    pub agent: AgentId,
    pub traits: Traits,
    pub neurons: Vec<(NeuronKind, f32)>,
    pub tactical_advantage: f32,
    pub reward_total: f32,
    pub penalty_total: f32,
    pub known_opponents: usize,
    pub visited_states: usize,
    pub decisions: u64,
}

#[derive(Debug, Clone)]
pub struct Brain {
    agent: AgentId,
    pub traits: Traits,
    pub neurons: NeuronGraph,
    patterns: AHashMap<AgentId, AttackPattern>,
    pub self_pattern: AttackPattern,
    pub qtable: QTable,
    pub last_state: Option<StateKey>,
    pub last_action: Option<TacticalAction>,
    pub memory: ShortTermMemory,
    /// Recent (dealt - taken) / total hits, in [-1, 1]
    pub tactical_advantage: f32,
    pub reward_total: f32,
    pub penalty_total: f32,
    pub decisions: u64,
    learning: LearningConfig,
    rng: ChaCha8Rng,
}

impl Brain {
    pub fn new(agent: AgentId, traits: Traits, config: &SeekerConfig) -> Self {
        let n = &config.neuron;
        let mut neurons = NeuronGraph::new(n.default_decay, n.min_decay, n.max_decay);
        neurons.connect(NeuronKind::Fear, NeuronKind::Reflex, 0.3);
        neurons.connect(NeuronKind::Fear, NeuronKind::Aggression, -0.25);
        neurons.connect(NeuronKind::Adrenaline, NeuronKind::Aggression, 0.2);
        neurons.connect(NeuronKind::Frustration, NeuronKind::Aggression, 0.15);
        neurons.connect(NeuronKind::Composure, NeuronKind::Tactical, 0.2);

        neurons.set_state(NeuronKind::Composure, 0.3 + 0.5 * traits.bravery);
        neurons.set_state(NeuronKind::Aggression, 0.5 * traits.aggressiveness);

        Self {
            agent,
            traits,
            neurons,
            patterns: AHashMap::new(),
            self_pattern: AttackPattern::new(),
            qtable: QTable::new(config.learning.learning_rate, config.learning.discount),
            last_state: None,
            last_action: None,
            memory: ShortTermMemory::new(),
            tactical_advantage: 0.0,
            reward_total: 0.0,
            penalty_total: 0.0,
            decisions: 0,
            learning: config.learning.clone(),
            rng: ChaCha8Rng::seed_from_u64(agent.seed()),
        }
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    /// Record a swing by an opponent
    pub fn record_attack(&mut self, opponent: AgentId, now: Millis, distance: f32, landed: bool, facing_alignment: f32) {
        let (smoothing, miss_weight) = (self.learning.pattern_smoothing, self.learning.miss_weight);
        self.patterns
            .entry(opponent)
            .or_default()
            .record(now, distance, landed, facing_alignment, smoothing, miss_weight);
    }

    /// Record one of this agent's own swings
    pub fn record_self_attack(&mut self, now: Millis, distance: f32, landed: bool) {
        let (smoothing, miss_weight) = (self.learning.pattern_smoothing, self.learning.miss_weight);
        self.self_pattern
            .record(now, distance, landed, 1.0, smoothing, miss_weight);
    }

    pub fn pattern(&self, opponent: AgentId) -> Option<&AttackPattern> {
        self.patterns.get(&opponent)
    }

    pub fn patterns(&self) -> impl Iterator<Item = (&AgentId, &AttackPattern)> {
        self.patterns.iter()
    }

    /// Drop everything tracked about an opponent
    pub fn forget_opponent(&mut self, opponent: AgentId) {
        self.patterns.remove(&opponent);
        self.memory.forget(opponent);
    }

    pub fn record_hit_dealt(&mut self, now: Millis, damage: f32, opponent: Option<AgentId>) {
        self.memory.record_dealt(now, damage, opponent);
    }

    pub fn record_hit_taken(&mut self, now: Millis, damage: f32, opponent: Option<AgentId>) {
        self.memory.record_taken(now, damage, opponent);
    }

    /// Recompute the sliding-window advantage and prune expired hits
    pub fn update_tactical_advantage(&mut self, now: Millis) -> f32 {
        let since = now.saturating_sub(self.learning.advantage_window_ms);
        self.memory.prune(since);
        let dealt = self.memory.hits_dealt_since(since) as f32;
        let taken = self.memory.hits_taken_since(since) as f32;
        self.tactical_advantage = ((dealt - taken) / (dealt + taken).max(1.0)).clamp(-1.0, 1.0);
        self.tactical_advantage
    }

    /// Still recovering from an own attack?
    pub fn is_recovering(&self, now: Millis) -> bool {
        self.self_pattern
            .elapsed_since_last(now)
            .is_some_and(|elapsed| elapsed < self.learning.recovery_window_ms)
    }

    pub fn state_key(&self, now: Millis, distance: f32) -> StateKey {
        StateKey::new(self.tactical_advantage, distance, self.is_recovering(now))
    }

    /// Epsilon-greedy pick from the Q-table using this brain's own RNG
    pub fn choose_tactic(&mut self, state: StateKey, epsilon: f32) -> (TacticalAction, bool) {
        self.qtable.choose(state, &mut self.rng, epsilon)
    }

    pub fn add_reward(&mut self, reward: f32) {
        if reward >= 0.0 {
            self.reward_total += reward;
        } else {
            self.penalty_total -= reward;
        }
    }

    /// Pull every neuron's reaction speed toward a leader's profile
    pub fn conform_to(&mut self, leader: &[(NeuronKind, f32)], rate: f32) {
        for (kind, decay) in leader {
            let template = Neuron::new(*decay);
            self.neurons.mimic(*kind, &template, rate);
        }
    }

    pub fn summary(&self) -> BrainSummary {
        BrainSummary {
            agent: self.agent,
            traits: self.traits,
            neurons: self.neurons.states(),
            tactical_advantage: self.tactical_advantage,
            reward_total: self.reward_total,
            penalty_total: self.penalty_total,
            known_opponents: self.patterns.len(),
            visited_states: self.qtable.len(),
            decisions: self.decisions,
        }
    }
}
