//! Learning properties
//!
//! Neuron bounds, convergence of the learners, collective decay and the
//! collective reaction to ally deaths.

use std::sync::Arc;

use ahash::AHashMap;
use arc_seeker::brain::{AttackPattern, Brain, Neuron, NeuronGraph, NeuronKind, QTable, StateKey, TacticalAction, Traits};
use arc_seeker::collective::CollectiveMemory;
use arc_seeker::core::config::CollectiveConfig;
use arc_seeker::core::types::{AgentId, AgentKind, AgentState, FactionId, ItemCategory};
use arc_seeker::experience::ExperienceFeed;
use arc_seeker::world::Arena;
use arc_seeker::SeekerConfig;
use glam::Vec3;
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Updates needed to get within `tolerance` of a constant input
fn steps_to_converge(decay: f32, urgency: f32, target: f32, tolerance: f32) -> usize {
    let mut neuron = Neuron::new(decay);
    let mut steps = 0;
    while (neuron.state() - target).abs() > tolerance && steps < 10_000 {
        neuron.update(target, urgency);
        steps += 1;
    }
    steps
}

/// Mostly ordinary values with the occasional NaN or infinity
fn signal(range: std::ops::Range<f32>) -> impl Strategy<Value = f32> {
    prop_oneof![
        8 => range,
        1 => Just(f32::NAN),
        1 => prop_oneof![Just(f32::INFINITY), Just(f32::NEG_INFINITY)],
    ]
}

proptest! {
    #[test]
    fn property_neuron_state_stays_in_unit_interval(
        decay in 0.05_f32..0.9,
        inputs in proptest::collection::vec((signal(-10.0..10.0), signal(-1.0..2.0)), 1..60),
    ) {
        let mut neuron = Neuron::new(decay);
        for (input, urgency) in inputs {
            let state = neuron.update(input, urgency);
            prop_assert!((0.0..=1.0).contains(&state));
        }
    }

    #[test]
    fn property_graph_stays_bounded_with_wild_synapses(
        weight in signal(-5.0..5.0),
        inputs in proptest::collection::vec(signal(-10.0..10.0), 1..40),
    ) {
        let mut graph = NeuronGraph::new(0.3, 0.05, 0.9);
        graph.connect(NeuronKind::Fear, NeuronKind::Reflex, weight);
        graph.connect(NeuronKind::Reflex, NeuronKind::Fear, weight);
        for input in inputs {
            graph.update(NeuronKind::Fear, input, 0.5);
            graph.update(NeuronKind::Reflex, input, 0.5);
            for (_, state) in graph.states() {
                prop_assert!((0.0..=1.0).contains(&state));
            }
        }
    }

    #[test]
    fn property_urgency_never_slows_convergence(
        decay in 0.05_f32..0.9,
        urgency in 0.0_f32..1.0,
        target in 0.2_f32..1.0,
    ) {
        let calm = steps_to_converge(decay, 0.0, target, 0.01);
        let urgent = steps_to_converge(decay, urgency, target, 0.01);
        prop_assert!(urgent <= calm);
    }

    #[test]
    fn property_pattern_interval_converges(
        interval in 200_u64..3_000,
        distance in 1.0_f32..6.0,
    ) {
        let mut pattern = AttackPattern::new();
        for i in 0..40 {
            pattern.record(i * interval, distance, i % 3 != 0, 1.0, 0.3, 0.5);
        }
        let learned = pattern.interval_ms().unwrap();
        prop_assert!((learned - interval as f32).abs() <= 0.01 * interval as f32);
        prop_assert!((pattern.distance().unwrap() - distance).abs() < 1e-3);
    }
}

#[test]
fn test_collective_decays_strictly_to_zero() {
    let memory = CollectiveMemory::new(CollectiveConfig::default());
    let killer = AgentId::new();
    for _ in 0..4 {
        memory.report_ally_death(Some(killer), Some(ItemCategory::Bow), 2.0);
    }

    let mut previous = memory.biases();
    let mut previous_danger = memory.danger(killer);
    for _ in 0..400 {
        memory.tick();
        let biases = memory.biases();
        let danger = memory.danger(killer);
        if previous.fear > 0.0 {
            assert!(biases.fear < previous.fear);
        }
        if previous_danger > 0.0 {
            assert!(danger < previous_danger);
        }
        assert!(biases.fear >= 0.0 && biases.aggression >= 0.0);
        previous = biases;
        previous_danger = danger;
    }
    assert_eq!(previous.fear, 0.0);
    assert_eq!(previous.aggression, 0.0);
    assert_eq!(previous_danger, 0.0);
}

/// Two states: pressing up close pays and pushes the opponent away;
/// everything else pays nothing and brings it back.
#[test]
fn test_toy_q_learning_converges() {
    let close = StateKey::new(0.0, 2.0, false);
    let far = StateKey::new(0.0, 20.0, false);
    let mut table = QTable::new(0.2, 0.9);
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    let mut state = close;
    for _ in 0..5_000 {
        let action = TacticalAction::ALL[rng.gen_range(0..TacticalAction::ALL.len())];
        let (reward, next) = if state == close && action == TacticalAction::Press {
            (1.0, far)
        } else {
            (0.0, close)
        };
        table.update(state, action, reward, next);
        state = next;
    }

    assert_eq!(table.best_action(close), TacticalAction::Press);
    for action in TacticalAction::ALL {
        assert!(table.value(close, action) <= 10.0);
        if action != TacticalAction::Press {
            assert!(table.value(close, action) < table.value(close, TacticalAction::Press));
        }
    }
}

struct Squad {
    arena: Arena,
    brains: AHashMap<AgentId, Brain>,
    feed: ExperienceFeed,
    victim: AgentId,
    killer: AgentId,
}

fn squad(killer_distance: f32) -> Squad {
    let config = SeekerConfig::default();
    let collective = CollectiveMemory::shared(config.collective.clone());
    let mut arena = Arena::new();
    let victim = arena.spawn(AgentState::new(
        AgentId::new(),
        AgentKind::Seeker,
        FactionId(0),
        Vec3::new(0.5, 0.0, 0.5),
    ));
    let mut killer = AgentState::new(
        AgentId::new(),
        AgentKind::Player,
        FactionId(1),
        Vec3::new(0.5 + killer_distance, 0.0, 0.5),
    );
    killer.held = ItemCategory::Trident;
    let killer = arena.spawn(killer);

    let mut brains = AHashMap::new();
    brains.insert(victim, Brain::new(victim, Traits::default(), &config));
    Squad {
        arena,
        brains,
        feed: ExperienceFeed::new(&config, Arc::clone(&collective)),
        victim,
        killer,
    }
}

#[test]
fn test_close_ally_death_raises_fear_by_close_increment() {
    let mut squad = squad(3.0);
    squad.arena.kill(squad.victim);
    squad
        .feed
        .on_death(&mut squad.brains, &squad.arena, squad.victim, Some(squad.killer));

    let collective = squad.feed.collective();
    assert!((collective.biases().fear - 0.2).abs() < 1e-6);
    let profile = collective.profile(squad.killer);
    assert_eq!(profile.kills, 1);
    assert_eq!(profile.preferred_weapon, Some(ItemCategory::Trident));
    assert!(profile.danger > 0.0);
}

#[test]
fn test_distant_ally_death_raises_fear_less() {
    let mut squad = squad(15.0);
    squad.arena.kill(squad.victim);
    squad
        .feed
        .on_death(&mut squad.brains, &squad.arena, squad.victim, Some(squad.killer));

    let fear = squad.feed.collective().biases().fear;
    assert!(fear > 0.0 && fear < 0.2);
}
