//! Experience feed: combat events to learning updates
//!
//! Runs outside the think cycle. Every hit, swing and death the host
//! reports updates the brains involved (rewards, attack patterns, neuron
//! plasticity) and the shared collective memory.

use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::brain::{Brain, NeuronKind};
use crate::collective::{CollectiveMemory, Weakness};
use crate::core::config::{LearningConfig, SeekerConfig};
use crate::core::types::{horizontal, AgentId, AgentKind, ItemCategory, Millis};
use crate::world::WorldView;

/// Health ratio below which an opponent is tagged as low on health
const LOW_HEALTH: f32 = 0.3;
/// A hit at least this heavy on an unshielded opponent tags it as unshielded
const UNSHIELDED_DAMAGE: f32 = 4.0;
/// Swings needed before aim is judged
const AIM_SAMPLES: u32 = 4;
/// Miss ratio above which aim counts as poor
const POOR_AIM_MISSES: f32 = 0.6;

const FEAR_REFLEX_STEP: f32 = 0.02;
const FEAR_REFLEX_CAP: f32 = 0.6;

/// One swing reported by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatEvent {
    pub attacker: AgentId,
    pub attacker_kind: AgentKind,
    pub victim: Option<AgentId>,
    pub victim_kind: Option<AgentKind>,
    pub damage: f32,
    pub at: Millis,
    pub landed: bool,
}

impl CombatEvent {
    pub fn hit(
        attacker: AgentId,
        attacker_kind: AgentKind,
        victim: AgentId,
        victim_kind: AgentKind,
        damage: f32,
        at: Millis,
    ) -> Self {
        Self {
            attacker,
            attacker_kind,
            victim: Some(victim),
            victim_kind: Some(victim_kind),
            damage,
            at,
            landed: true,
        }
    }

    /// A swing that connected with nothing
    pub fn miss(attacker: AgentId, attacker_kind: AgentKind, at: Millis) -> Self {
        Self {
            attacker,
            attacker_kind,
            victim: None,
            victim_kind: None,
            damage: 0.0,
            at,
            landed: false,
        }
    }
}

pub struct ExperienceFeed {
    learning: LearningConfig,
    sensing_radius: f32,
    collective: Arc<CollectiveMemory>,
}

impl ExperienceFeed {
    pub fn new(config: &SeekerConfig, collective: Arc<CollectiveMemory>) -> Self {
        Self {
            learning: config.learning.clone(),
            sensing_radius: config.perception.sensing_radius,
            collective,
        }
    }

    pub fn collective(&self) -> &Arc<CollectiveMemory> {
        &self.collective
    }

    /// Feed one event through every applicable update
    pub fn observe<W: WorldView + ?Sized>(&self, brains: &mut AHashMap<AgentId, Brain>, world: &W, event: &CombatEvent) {
        self.on_swing(brains, world, event);
        if event.landed && event.victim.is_some() {
            self.on_hit(brains, world, event);
        }
    }

    /// Rewards, penalties and plasticity for a landed hit
    pub fn on_hit<W: WorldView + ?Sized>(&self, brains: &mut AHashMap<AgentId, Brain>, world: &W, event: &CombatEvent) {
        let Some(victim) = event.victim else {
            return;
        };
        let l = &self.learning;
        let now = event.at;
        let distance = match (world.agent(event.attacker), world.agent(victim)) {
            (Some(a), Some(v)) => a.position.distance(v.position),
            _ => f32::INFINITY,
        };

        if let Some(brain) = brains.get_mut(&event.attacker) {
            brain.record_hit_dealt(now, event.damage, Some(victim));
            let recent_taken = brain
                .memory
                .damage_taken_since(now.saturating_sub(l.advantage_window_ms));
            let mut reward = l.reward_per_damage * event.damage;
            if distance <= l.pressure_range && recent_taken < l.pressure_damage_ceiling {
                reward += l.pressure_bonus;
            }
            brain.neurons.nudge(NeuronKind::Frustration, -l.frustration_relief_on_hit);
            learn(brain, reward, now, distance);
        }

        if let Some(brain) = brains.get_mut(&victim) {
            brain.record_hit_taken(now, event.damage, Some(event.attacker));
            brain.neurons.nudge(NeuronKind::Frustration, l.frustration_on_hit_taken);
            brain
                .neurons
                .reinforce(NeuronKind::Fear, NeuronKind::Reflex, FEAR_REFLEX_STEP, FEAR_REFLEX_CAP);
            learn(brain, -l.penalty_per_damage * event.damage, now, distance);

            if let Some(attacker) = world.agent(event.attacker) {
                if !brains.contains_key(&event.attacker) && attacker.held != ItemCategory::Empty {
                    self.collective.record_weapon(event.attacker, attacker.held);
                }
            }
        }

        // Only opponents get weakness tags
        if brains.contains_key(&event.attacker) && !brains.contains_key(&victim) {
            self.observe_weakness(world, victim, event.damage);
        }
    }

    /// Attack-pattern bookkeeping for any swing, hit or miss
    pub fn on_swing<W: WorldView + ?Sized>(&self, brains: &mut AHashMap<AgentId, Brain>, world: &W, event: &CombatEvent) {
        let Some(attacker) = world.agent(event.attacker) else {
            return;
        };
        let now = event.at;

        if let Some(brain) = brains.get_mut(&event.attacker) {
            let distance = event
                .victim
                .and_then(|v| world.agent(v))
                .map_or(attacker.held.reach(), |v| attacker.position.distance(v.position));
            brain.record_self_attack(now, distance, event.landed);
            if !event.landed {
                brain.neurons.nudge(NeuronKind::Frustration, self.learning.frustration_on_miss);
            }
        }

        let mut poor_aim = false;
        for (id, brain) in brains.iter_mut() {
            let Some(observer) = world.agent(*id).filter(|o| o.alive) else {
                continue;
            };
            if !observer.is_hostile_to(&attacker) {
                continue;
            }
            let distance = attacker.position.distance(observer.position);
            if distance > self.sensing_radius {
                continue;
            }
            let toward = horizontal(observer.position - attacker.position).normalize_or_zero();
            let alignment = horizontal(attacker.facing).normalize_or_zero().dot(toward);
            brain.record_attack(event.attacker, now, distance, event.landed, alignment);

            if let Some(pattern) = brain.pattern(event.attacker) {
                poor_aim |= pattern.samples >= AIM_SAMPLES && 1.0 - pattern.hit_ratio() > POOR_AIM_MISSES;
            }
        }

        if poor_aim {
            self.tag(event.attacker, Weakness::PoorAim);
        }
        trace!(attacker = %event.attacker, landed = event.landed, "swing observed");
    }

    /// Someone died. A seeker's death feeds collective fear; an
    /// opponent's death wipes it from every memory.
    pub fn on_death<W: WorldView + ?Sized>(
        &self,
        brains: &mut AHashMap<AgentId, Brain>,
        world: &W,
        victim: AgentId,
        killer: Option<AgentId>,
    ) {
        if brains.contains_key(&victim) {
            let killer_state = killer.and_then(|k| world.agent(k));
            let victim_state = world.agent(victim);
            // Closeness is judged from the surviving squad; the killer stands in
            // when no ally is left to witness it
            let witness = victim_state.as_ref().and_then(|v| {
                brains
                    .keys()
                    .filter(|id| **id != victim)
                    .filter_map(|id| world.agent(*id))
                    .filter(|ally| ally.alive && !ally.is_hostile_to(v))
                    .map(|ally| ally.position.distance(v.position))
                    .min_by(f32::total_cmp)
            });
            let distance = match (witness, killer_state.as_ref(), victim_state.as_ref()) {
                (Some(distance), _, _) => distance,
                (None, Some(k), Some(v)) => k.position.distance(v.position),
                _ => f32::INFINITY,
            };
            let weapon = killer_state.as_ref().map(|k| k.held);
            self.collective.report_ally_death(killer, weapon, distance);
            if let Some(killer) = killer {
                self.observe_weakness(world, killer, 0.0);
            }
        } else {
            for brain in brains.values_mut() {
                brain.forget_opponent(victim);
            }
            self.collective.forget(victim);
            debug!(opponent = %victim, "opponent died, forgotten");
        }
    }

    /// Tag visible weaknesses of an opponent that just took `damage`
    pub fn observe_weakness<W: WorldView + ?Sized>(&self, world: &W, opponent: AgentId, damage: f32) {
        let Some(state) = world.agent(opponent).filter(|s| s.alive) else {
            return;
        };
        if state.health_ratio() < LOW_HEALTH {
            self.tag(opponent, Weakness::LowHealth);
        } else if state.held != ItemCategory::Shield && damage >= UNSHIELDED_DAMAGE {
            self.tag(opponent, Weakness::Unshielded);
        }
    }

    fn tag(&self, opponent: AgentId, weakness: Weakness) {
        // Re-tagging the same weakness must not keep raising aggression
        if self.collective.profile(opponent).weakness != Some(weakness) {
            self.collective.update_global_tactics(opponent, weakness);
            debug!(opponent = %opponent, ?weakness, "weakness identified");
        }
    }
}

/// One TD step against the brain's last decision
fn learn(brain: &mut Brain, reward: f32, now: Millis, distance: f32) {
    brain.add_reward(reward);
    brain.update_tactical_advantage(now);
    let next = brain.state_key(now, distance);
    if let (Some(state), Some(action)) = (brain.last_state, brain.last_action) {
        brain.qtable.update(state, action, reward, next);
    }
}
