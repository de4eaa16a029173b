//! Decision engine
//!
//! One think cycle:
//! 1. Assess: stress, predicted opponent motion, attack imminence, neuron
//!    updates, morale, tactical advantage, role
//! 2. Urgent rules: ambush on frustration, evade on reflex
//! 3. Mode rules: the four-rule priority machine (simple) or advantage
//!    branches, pattern counters and Q-learning (extended)
//! 4. Self-sync: time bursts and withdrawals to the agent's own rhythm
//! 5. Merge inference advice, attach voice line, remember state/action

use serde::Serialize;
use tracing::debug;

use super::prediction::{attack_imminence, predict_motion, ImminenceFactors};
use super::{ActionType, Decision, DecisionSource, MovementDirective, MovementStrategy};
use crate::brain::{Brain, NeuronKind, TacticalAction};
use crate::collective::{CollectiveMemory, GlobalBiases, Role};
use crate::core::config::{DecisionMode, SeekerConfig};
use crate::core::types::{AgentId, Millis};
use crate::perception::{OpponentView, PerceptionSnapshot};
use crate::world::SkillId;

/// Morale bonus for the group's front-liner
const TANKER_MORALE: f32 = 0.1;

/// Everything the rules look at, computed once per cycle
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub stress: f32,
    pub target: AgentId,
    pub distance: f32,
    pub imminence: ImminenceFactors,
    pub predicted: ImminenceFactors,
    /// max(current, predicted) imminence
    pub threat: f32,
    pub morale: f32,
    pub advantage: f32,
    pub role: Role,
    pub biases: GlobalBiases,
}

#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: SeekerConfig,
}

impl DecisionEngine {
    pub fn new(config: SeekerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SeekerConfig {
        &self.config
    }

    /// Decide without outside advice
    pub fn think(&self, snapshot: &PerceptionSnapshot, brain: &mut Brain, collective: &CollectiveMemory) -> Decision {
        self.resolve(snapshot, brain, collective, None)
    }

    /// Decide, optionally folding in advice from an inference channel
    pub fn resolve(
        &self,
        snapshot: &PerceptionSnapshot,
        brain: &mut Brain,
        collective: &CollectiveMemory,
        advice: Option<&Decision>,
    ) -> Decision {
        brain.decisions += 1;
        let now = snapshot.taken_at;
        for opponent in &snapshot.opponents {
            brain.memory.observe_velocity(opponent.id, now, opponent.velocity);
        }

        let Some(nearest) = snapshot.nearest_opponent() else {
            self.settle(snapshot, brain, collective);
            brain.last_state = None;
            brain.last_action = None;
            return Decision::idle().with_reasoning("no opponents in range");
        };

        let assessment = self.assess(snapshot, nearest, brain, collective);

        let mut decision = match self.urgent(nearest, &assessment, brain) {
            Some(decision) => decision,
            None => match self.config.decision.mode {
                DecisionMode::Simple => self.decide_simple(snapshot, nearest, &assessment),
                DecisionMode::Extended => self.decide_extended(snapshot, nearest, &assessment, brain),
            },
        };

        if self.config.decision.mode == DecisionMode::Extended {
            self.synchronize_with_self(&mut decision, nearest, brain, now);
        }

        if let Some(advice) = advice {
            merge_advice(&mut decision, advice, nearest.id);
        }

        self.finish(decision, &assessment, brain, now)
    }

    /// Compute the situation and drive the neurons
    pub fn assess(
        &self,
        snapshot: &PerceptionSnapshot,
        nearest: &OpponentView,
        brain: &mut Brain,
        collective: &CollectiveMemory,
    ) -> Assessment {
        let d = &self.config.decision;
        let now = snapshot.taken_at;
        let stress = 1.0 - snapshot.me.health_ratio;
        let reach = nearest.held.reach();

        let acceleration = brain
            .memory
            .track(nearest.id)
            .and_then(|track| track.acceleration());
        let prediction = predict_motion(
            nearest.position,
            nearest.velocity,
            acceleration,
            d.prediction_horizon_secs,
            d.acceleration_damping,
        );

        let imminence = attack_imminence(
            nearest.position,
            nearest.velocity,
            nearest.facing,
            snapshot.me.position,
            reach,
            d.closing_speed_fast,
        );
        let predicted = attack_imminence(
            prediction.position,
            prediction.velocity,
            nearest.facing,
            snapshot.me.position,
            reach,
            d.closing_speed_fast,
        );
        let threat = imminence.score.max(predicted.score);

        let biases = collective.biases();
        let profile = collective.profile(nearest.id);
        let traits = snapshot.traits;
        let neurons = &mut brain.neurons;

        neurons.update(NeuronKind::Reflex, threat, threat);
        let fear = neurons.update(
            NeuronKind::Fear,
            0.5 * stress + 0.4 * imminence.score + 0.3 * profile.danger + biases.fear,
            0.5 * threat,
        );
        neurons.update(NeuronKind::Adrenaline, 0.8 * threat + 0.2 * stress, 0.3);
        let weakness_bonus = if profile.weakness.is_some() { 0.15 } else { 0.0 };
        let aggression = neurons.update(
            NeuronKind::Aggression,
            0.6 * traits.aggressiveness + 0.3 * (1.0 - stress) + weakness_bonus + biases.aggression,
            0.3,
        );
        neurons.update(NeuronKind::Composure, 0.3 + 0.5 * traits.bravery - 0.3 * stress, 0.05);
        neurons.nudge(NeuronKind::Frustration, -d.frustration_decay);

        let advantage = brain.update_tactical_advantage(now);
        let tactical = 0.6 * (advantage + 1.0) / 2.0 + 0.2 * imminence.score + 0.2 * predicted.score;
        brain.neurons.update(NeuronKind::Tactical, tactical, 0.2);

        let living_allies: Vec<_> = snapshot.living_allies().cloned().collect();
        let role = collective.assign_role(
            snapshot.agent,
            snapshot.me.health_ratio,
            snapshot.opponents.len(),
            &living_allies,
        );

        let mut morale = aggression - fear * d.fear_damping + biases.aggression - biases.fear;
        if role == Role::Tanker {
            morale += TANKER_MORALE;
        }

        Assessment {
            stress,
            target: nearest.id,
            distance: nearest.distance,
            imminence,
            predicted,
            threat,
            morale,
            advantage,
            role,
            biases,
        }
    }

    /// Rules that preempt every mode
    fn urgent(&self, nearest: &OpponentView, a: &Assessment, brain: &mut Brain) -> Option<Decision> {
        let frustration = brain.neurons.state(NeuronKind::Frustration);
        let composure = brain.neurons.state(NeuronKind::Composure);
        if frustration > composure {
            brain.neurons.set_state(NeuronKind::Frustration, 0.0);
            brain.neurons.set_state(NeuronKind::Adrenaline, 1.0);
            return Some(
                Decision::new(
                    ActionType::Ambush,
                    MovementDirective::toward(MovementStrategy::Burst, nearest.id),
                )
                .with_skill(skill(&self.config.skills.ambush))
                .with_tactic(TacticalAction::Press)
                .with_source(DecisionSource::Priority)
                .with_reasoning(format!(
                    "{} | frustration {:.2} > composure {:.2} -> ambush",
                    trace(a),
                    frustration,
                    composure
                )),
            );
        }

        let reflex = brain.neurons.state(NeuronKind::Reflex);
        if reflex > self.config.decision.reflex_threshold {
            let fear = brain.neurons.state(NeuronKind::Fear);
            let aggression = brain.neurons.state(NeuronKind::Aggression);
            let (strategy, tactic) = if fear > aggression {
                (MovementStrategy::BackStep, TacticalAction::Withdraw)
            } else {
                (MovementStrategy::SideStep, TacticalAction::Flank)
            };
            return Some(
                Decision::new(ActionType::Evade, MovementDirective::toward(strategy, nearest.id))
                    .with_skill(skill(&self.config.skills.evade))
                    .with_tactic(tactic)
                    .with_source(DecisionSource::Reflex)
                    .with_reasoning(format!(
                        "{} | reflex {:.2} > {:.2} -> evade",
                        trace(a),
                        reflex,
                        self.config.decision.reflex_threshold
                    )),
            );
        }

        None
    }

    fn decide_simple(&self, snapshot: &PerceptionSnapshot, nearest: &OpponentView, a: &Assessment) -> Decision {
        let d = &self.config.decision;
        if a.morale < d.low_morale && a.distance < d.close_distance {
            return Decision::new(
                ActionType::HoldDistance,
                MovementDirective::toward(MovementStrategy::Stop, nearest.id),
            )
            .with_tactic(TacticalAction::Hold)
            .with_source(DecisionSource::Priority)
            .with_reasoning(format!("{} | low morale at close range -> hold distance", trace(a)));
        }

        if a.morale > d.mid_morale {
            Decision::new(ActionType::Attack, self.attack_movement(nearest, a.role))
                .with_tactic(TacticalAction::Press)
                .with_source(DecisionSource::Priority)
                .with_reasoning(format!("{} | morale high -> attack", trace(a)))
        } else {
            Decision::new(ActionType::Retreat, retreat_movement(snapshot, nearest))
                .with_tactic(TacticalAction::Withdraw)
                .with_source(DecisionSource::Priority)
                .with_reasoning(format!("{} | morale low -> retreat", trace(a)))
        }
    }

    fn decide_extended(
        &self,
        snapshot: &PerceptionSnapshot,
        nearest: &OpponentView,
        a: &Assessment,
        brain: &mut Brain,
    ) -> Decision {
        let d = &self.config.decision;
        let now = snapshot.taken_at;

        if a.advantage < d.defensive_advantage {
            return Decision::new(ActionType::Defend, retreat_movement(snapshot, nearest))
                .with_tactic(TacticalAction::Hold)
                .with_source(DecisionSource::Branch)
                .with_reasoning(format!("{} | losing exchange -> defend", trace(a)));
        }

        let composure = brain.neurons.state(NeuronKind::Composure);
        let best_match = snapshot
            .opponents
            .iter()
            .filter_map(|o| brain.pattern(o.id).map(|p| (o, p.match_score(now, o.distance))))
            .fold(None::<(&OpponentView, f32)>, |best, (o, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((o, score)),
            });
        if let Some((opponent, score)) = best_match {
            if score >= d.counter_match_threshold && composure >= d.counter_min_composure {
                return Decision::new(
                    ActionType::CounterAttack,
                    MovementDirective::toward(MovementStrategy::SideStep, opponent.id),
                )
                .with_skill(skill(&self.config.skills.counter))
                .with_tactic(TacticalAction::Flank)
                .with_source(DecisionSource::Branch)
                .with_reasoning(format!(
                    "{} | pattern match {:.2} on {} -> counter",
                    trace(a),
                    score,
                    opponent.id
                ));
            }
        }

        if a.advantage > d.finishing_advantage {
            return Decision::new(
                ActionType::Finisher,
                MovementDirective::toward(MovementStrategy::Burst, nearest.id),
            )
            .with_skill(skill(&self.config.skills.finisher))
            .with_tactic(TacticalAction::Press)
            .with_source(DecisionSource::Branch)
            .with_reasoning(format!("{} | winning exchange -> finisher", trace(a)));
        }

        let state = brain.state_key(now, a.distance);
        let (tactic, explored) = brain.choose_tactic(state, d.exploration_rate);
        let (action, movement) = match tactic {
            TacticalAction::Press => (ActionType::Attack, self.attack_movement(nearest, a.role)),
            TacticalAction::Hold => (
                ActionType::HoldDistance,
                MovementDirective::toward(MovementStrategy::Stop, nearest.id),
            ),
            TacticalAction::Flank => (
                ActionType::Attack,
                MovementDirective::toward(MovementStrategy::Orbital, nearest.id),
            ),
            TacticalAction::Withdraw => (ActionType::Retreat, retreat_movement(snapshot, nearest)),
        };
        Decision::new(action, movement)
            .with_tactic(tactic)
            .with_source(DecisionSource::Learned)
            .with_reasoning(format!(
                "{} | q[{:?}] -> {:?}{}",
                trace(a),
                state,
                tactic,
                if explored { " (explore)" } else { "" }
            ))
    }

    /// Burst into the agent's own next swing, slip away right after one
    fn synchronize_with_self(&self, decision: &mut Decision, nearest: &OpponentView, brain: &Brain, now: Millis) {
        let eligible = decision.source == DecisionSource::Learned || decision.action == ActionType::Finisher;
        if !eligible {
            return;
        }
        let (Some(interval), Some(elapsed)) = (
            brain.self_pattern.interval_ms(),
            brain.self_pattern.elapsed_since_last(now),
        ) else {
            return;
        };

        let d = &self.config.decision;
        let elapsed = elapsed as f32;
        if (elapsed - interval).abs() <= d.self_sync_tolerance * interval {
            decision.movement = MovementDirective::toward(MovementStrategy::Burst, nearest.id);
            decision.reasoning.push_str(" | own swing due -> burst");
        } else if elapsed < d.withdraw_fraction * interval {
            decision.movement = MovementDirective::toward(MovementStrategy::DiagonalRetreat, nearest.id);
            decision.reasoning.push_str(" | just swung -> diagonal retreat");
        }
    }

    fn attack_movement(&self, nearest: &OpponentView, role: Role) -> MovementDirective {
        let strategy = if !nearest.line_of_sight {
            MovementStrategy::PathToEnemy
        } else if nearest.held.is_ranged() {
            MovementStrategy::ZigZag
        } else {
            match role {
                Role::Flanker => MovementStrategy::Orbital,
                Role::Striker if nearest.distance > self.config.decision.close_distance => MovementStrategy::ZigZag,
                _ => MovementStrategy::PathToEnemy,
            }
        };
        MovementDirective::toward(strategy, nearest.id)
    }

    /// Let the neurons relax when nothing is around
    fn settle(&self, snapshot: &PerceptionSnapshot, brain: &mut Brain, collective: &CollectiveMemory) {
        let biases = collective.biases();
        let stress = 1.0 - snapshot.me.health_ratio;
        let neurons = &mut brain.neurons;
        neurons.update(NeuronKind::Reflex, 0.0, 0.0);
        neurons.update(NeuronKind::Adrenaline, 0.0, 0.0);
        neurons.update(NeuronKind::Fear, 0.5 * stress + biases.fear, 0.0);
        neurons.update(
            NeuronKind::Composure,
            0.3 + 0.5 * snapshot.traits.bravery - 0.3 * stress,
            0.05,
        );
        neurons.nudge(NeuronKind::Frustration, -self.config.decision.frustration_decay);
    }

    fn finish(&self, mut decision: Decision, a: &Assessment, brain: &mut Brain, now: Millis) -> Decision {
        brain.last_state = Some(brain.state_key(now, a.distance));
        brain.last_action = decision.tactic;

        if decision.voice_line.is_none() {
            decision.voice_line = voice_line(&decision.action, a.role).map(str::to_string);
        }
        if decision.voice_line.is_some() {
            if brain.memory.voice_ready(now, self.config.decision.voice_cooldown_ms) {
                brain.memory.note_voice(now);
            } else {
                decision.voice_line = None;
            }
        }

        debug!(
            agent = %brain.agent(),
            action = decision.action.token(),
            movement = decision.movement.strategy.token(),
            source = ?decision.source,
            "{}",
            decision.reasoning
        );
        decision
    }
}

fn skill(id: &Option<String>) -> Option<SkillId> {
    id.as_ref().map(SkillId::new)
}

fn trace(a: &Assessment) -> String {
    format!(
        "stress={:.2} dist={:.1} imminence={:.2}/{:.2} morale={:.2} advantage={:.2} role={:?}",
        a.stress, a.distance, a.imminence.score, a.predicted.score, a.morale, a.advantage, a.role
    )
}

fn retreat_movement(snapshot: &PerceptionSnapshot, nearest: &OpponentView) -> MovementDirective {
    if let Some(cover) = snapshot.cover {
        MovementDirective {
            strategy: MovementStrategy::PathToCover,
            destination: Some(cover.position),
            target: Some(nearest.id),
        }
    } else if snapshot.opponents.len() >= 2 {
        MovementDirective::toward(MovementStrategy::Scatter, nearest.id)
    } else {
        MovementDirective::toward(MovementStrategy::DiagonalRetreat, nearest.id)
    }
}

fn voice_line(action: &ActionType, role: Role) -> Option<&'static str> {
    match action {
        ActionType::Ambush => Some("Now! Take them!"),
        ActionType::Retreat => Some("Fall back!"),
        ActionType::Defend => Some("Cover me!"),
        ActionType::CounterAttack => Some("Too slow!"),
        ActionType::Finisher => Some("It ends here."),
        ActionType::Attack if role == Role::Tanker => Some("On me!"),
        _ => None,
    }
}

/// Tactic an adopted advice action stands for
fn tactic_for(action: &ActionType) -> Option<TacticalAction> {
    match action {
        ActionType::Attack | ActionType::Ambush | ActionType::Finisher => Some(TacticalAction::Press),
        ActionType::HoldDistance | ActionType::Observe | ActionType::Defend => Some(TacticalAction::Hold),
        ActionType::CounterAttack | ActionType::Evade => Some(TacticalAction::Flank),
        ActionType::Retreat => Some(TacticalAction::Withdraw),
        ActionType::Idle | ActionType::Unrecognized(_) => None,
    }
}

/// Advice may replace a learned choice; it only fills gaps otherwise
fn merge_advice(decision: &mut Decision, advice: &Decision, nearest: AgentId) {
    if decision.source == DecisionSource::Learned
        && advice.action.is_actionable()
        && advice.movement.strategy.is_recognized()
    {
        decision.action = advice.action.clone();
        decision.movement = advice.movement.clone();
        if decision.movement.target.is_none() && decision.movement.destination.is_none() {
            decision.movement.target = Some(nearest);
        }
        decision.tactic = advice.tactic.or_else(|| tactic_for(&advice.action)).or(decision.tactic);
        decision.source = DecisionSource::Advice;
    }
    if decision.skill.is_none() {
        decision.skill = advice.skill.clone();
    }
    if decision.voice_line.is_none() {
        decision.voice_line = advice.voice_line.clone();
    }
    if !advice.reasoning.is_empty() {
        decision.reasoning.push_str(" | advice: ");
        decision.reasoning.push_str(&advice.reasoning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::Traits;
    use crate::core::config::CollectiveConfig;
    use crate::core::types::{ItemCategory, Stance};
    use crate::perception::{HealthBucket, SelfView};
    use glam::Vec3;

    fn snapshot(opponents: Vec<OpponentView>) -> PerceptionSnapshot {
        PerceptionSnapshot {
            agent: AgentId::new(),
            taken_at: 10_000,
            me: SelfView {
                position: Vec3::ZERO,
                velocity: Vec3::ZERO,
                facing: Vec3::X,
                health_ratio: 1.0,
                stance: Stance::Standing,
                held: ItemCategory::Sword,
            },
            opponents,
            allies: vec![],
            cover: None,
            traits: Traits::default(),
        }
    }

    fn idle_opponent(distance: f32) -> OpponentView {
        OpponentView {
            id: AgentId::new(),
            position: Vec3::new(distance, 0.0, 0.0),
            velocity: Vec3::ZERO,
            facing: Vec3::X,
            distance,
            health: HealthBucket::Full,
            held: ItemCategory::Sword,
            line_of_sight: true,
        }
    }

    fn setup(snapshot: &PerceptionSnapshot) -> (DecisionEngine, Brain, CollectiveMemory) {
        let config = SeekerConfig::default();
        let brain = Brain::new(snapshot.agent, snapshot.traits, &config);
        (
            DecisionEngine::new(config),
            brain,
            CollectiveMemory::new(CollectiveConfig::default()),
        )
    }

    #[test]
    fn test_incoming_attack_drives_tactical_neuron() {
        let calm = snapshot(vec![idle_opponent(12.0)]);
        let (engine, mut calm_brain, collective) = setup(&calm);
        engine.assess(&calm, &calm.opponents[0], &mut calm_brain, &collective);

        let mut charger = idle_opponent(2.0);
        charger.velocity = Vec3::new(-4.0, 0.0, 0.0);
        charger.facing = Vec3::NEG_X;
        let charged = snapshot(vec![charger]);
        let (engine, mut charged_brain, collective) = setup(&charged);
        let assessment = engine.assess(&charged, &charged.opponents[0], &mut charged_brain, &collective);

        assert!(assessment.imminence.score > 0.9);
        assert!(
            charged_brain.neurons.state(NeuronKind::Tactical) > calm_brain.neurons.state(NeuronKind::Tactical)
        );
    }

    #[test]
    fn test_no_opponents_is_idle() {
        let snap = snapshot(vec![]);
        let (engine, mut brain, collective) = setup(&snap);
        let decision = engine.think(&snap, &mut brain, &collective);
        assert_eq!(decision.action, ActionType::Idle);
        assert_eq!(decision.movement.strategy, MovementStrategy::None);
        assert!(brain.last_state.is_none());
    }

    #[test]
    fn test_decision_records_state_and_tactic() {
        let snap = snapshot(vec![idle_opponent(12.0)]);
        let (engine, mut brain, collective) = setup(&snap);
        let decision = engine.think(&snap, &mut brain, &collective);
        assert!(brain.last_state.is_some());
        assert_eq!(brain.last_action, decision.tactic);
        assert!(decision.tactic.is_some());
        assert!(!decision.reasoning.is_empty());
    }

    #[test]
    fn test_voice_cooldown_applies() {
        let snap = snapshot(vec![idle_opponent(12.0)]);
        let (engine, mut brain, collective) = setup(&snap);
        brain.memory.note_voice(snap.taken_at - 100);
        // Losing badly forces a defend, which wants a voice line
        for t in 0..4 {
            brain.record_hit_taken(snap.taken_at - 1_000 + t, 2.0, None);
        }
        let decision = engine.think(&snap, &mut brain, &collective);
        assert_eq!(decision.action, ActionType::Defend);
        assert!(decision.voice_line.is_none());
    }

    #[test]
    fn test_learned_choice_yields_to_advice() {
        let mut decision = Decision::new(ActionType::Attack, MovementDirective::none())
            .with_source(DecisionSource::Learned)
            .with_tactic(TacticalAction::Press);
        let advice = Decision::new(
            ActionType::Retreat,
            MovementDirective {
                strategy: MovementStrategy::Scatter,
                destination: None,
                target: None,
            },
        )
        .with_voice("Too many!");
        let target = AgentId::new();
        merge_advice(&mut decision, &advice, target);

        assert_eq!(decision.action, ActionType::Retreat);
        assert_eq!(decision.movement.target, Some(target));
        assert_eq!(decision.tactic, Some(TacticalAction::Withdraw));
        assert_eq!(decision.source, DecisionSource::Advice);
        assert_eq!(decision.voice_line.as_deref(), Some("Too many!"));
    }

    #[test]
    fn test_rule_decisions_only_take_gaps_from_advice() {
        let mut decision = Decision::new(ActionType::Evade, MovementDirective::none())
            .with_source(DecisionSource::Reflex);
        let advice = Decision::new(ActionType::Attack, MovementDirective::none())
            .with_skill(Some(SkillId::new("seeker:roar")));
        merge_advice(&mut decision, &advice, AgentId::new());

        assert_eq!(decision.action, ActionType::Evade);
        assert_eq!(decision.source, DecisionSource::Reflex);
        assert_eq!(decision.skill, Some(SkillId::new("seeker:roar")));
    }

    #[test]
    fn test_unrecognized_advice_not_adopted() {
        let mut decision = Decision::new(ActionType::Attack, MovementDirective::none())
            .with_source(DecisionSource::Learned);
        let advice = Decision::new(ActionType::parse("MOONWALK"), MovementDirective::none());
        merge_advice(&mut decision, &advice, AgentId::new());
        assert_eq!(decision.action, ActionType::Attack);
        assert_eq!(decision.source, DecisionSource::Learned);
    }
}
