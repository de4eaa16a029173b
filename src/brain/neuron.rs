//! Reactive neurons and their synapse graph
//!
//! Each neuron is a leaky integrator with an urgency-modulated rate:
//! `state += alpha * (input - state)` where
//! `alpha = base_decay + urgency * (1 - base_decay)`.
//! Urgency 1.0 makes the neuron jump straight to its input. The state
//! is clamped to [0, 1] after the step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The fixed set of neurons every brain carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NeuronKind {
    Aggression,
    Fear,
    Tactical,
    Composure,
    Frustration,
    Adrenaline,
    Reflex,
}

impl NeuronKind {
    pub fn all() -> &'static [NeuronKind] {
        &[
            NeuronKind::Aggression,
            NeuronKind::Fear,
            NeuronKind::Tactical,
            NeuronKind::Composure,
            NeuronKind::Frustration,
            NeuronKind::Adrenaline,
            NeuronKind::Reflex,
        ]
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neuron {
    state: f32,
    base_decay: f32,
}

impl Neuron {
    pub fn new(base_decay: f32) -> Self {
        Self {
            state: 0.0,
            base_decay: base_decay.clamp(0.0, 1.0),
        }
    }

    pub fn state(&self) -> f32 {
        self.state
    }

    pub fn base_decay(&self) -> f32 {
        self.base_decay
    }

    pub fn set_state(&mut self, value: f32) {
        self.state = finite_or_zero(value).clamp(0.0, 1.0);
    }

    /// One integration step toward `input`; returns the new state.
    ///
    /// Non-finite input or urgency counts as 0. Only the resulting state
    /// is clamped, so inputs above 1 pull harder than inputs at 1.
    pub fn update(&mut self, input: f32, urgency: f32) -> f32 {
        let input = finite_or_zero(input);
        let urgency = finite_or_zero(urgency).clamp(0.0, 1.0);
        let alpha = self.base_decay + urgency * (1.0 - self.base_decay);
        let next = self.state + alpha * (input - self.state);
        self.state = finite_or_zero(next).clamp(0.0, 1.0);
        self.state
    }

    /// Move base decay toward a leader's, clamped to `[min, max]`
    pub fn mimic(&mut self, leader: &Neuron, rate: f32, min: f32, max: f32) {
        let rate = rate.clamp(0.0, 1.0);
        let next = self.base_decay + rate * (leader.base_decay - self.base_decay);
        self.base_decay = next.clamp(min, max);
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// All neurons of one brain plus weighted synapses between them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuronGraph {
    neurons: [Neuron; 7],
    /// target -> source -> weight
    synapses: BTreeMap<NeuronKind, BTreeMap<NeuronKind, f32>>,
    min_decay: f32,
    max_decay: f32,
}

impl NeuronGraph {
    pub fn new(default_decay: f32, min_decay: f32, max_decay: f32) -> Self {
        let decay = default_decay.clamp(min_decay, max_decay);
        Self {
            neurons: [Neuron::new(decay); 7],
            synapses: BTreeMap::new(),
            min_decay,
            max_decay,
        }
    }

    pub fn neuron(&self, kind: NeuronKind) -> &Neuron {
        &self.neurons[kind.index()]
    }

    pub fn state(&self, kind: NeuronKind) -> f32 {
        self.neurons[kind.index()].state
    }

    pub fn set_state(&mut self, kind: NeuronKind, value: f32) {
        self.neurons[kind.index()].set_state(value);
    }

    /// Shift a neuron's state directly (event-driven bumps)
    pub fn nudge(&mut self, kind: NeuronKind, delta: f32) -> f32 {
        let neuron = &mut self.neurons[kind.index()];
        neuron.set_state(neuron.state + delta);
        neuron.state
    }

    /// Integrate external input plus weighted presynaptic states
    pub fn update(&mut self, kind: NeuronKind, input: f32, urgency: f32) -> f32 {
        let synaptic: f32 = self
            .synapses
            .get(&kind)
            .map(|sources| {
                sources
                    .iter()
                    .map(|(source, weight)| weight * self.neurons[source.index()].state)
                    .sum()
            })
            .unwrap_or(0.0);
        let input = finite_or_zero(input) + finite_or_zero(synaptic);
        self.neurons[kind.index()].update(input, urgency)
    }

    pub fn connect(&mut self, from: NeuronKind, to: NeuronKind, weight: f32) {
        self.synapses.entry(to).or_default().insert(from, weight);
    }

    pub fn disconnect(&mut self, from: NeuronKind, to: NeuronKind) -> Option<f32> {
        let sources = self.synapses.get_mut(&to)?;
        let removed = sources.remove(&from);
        if sources.is_empty() {
            self.synapses.remove(&to);
        }
        removed
    }

    pub fn weight(&self, from: NeuronKind, to: NeuronKind) -> Option<f32> {
        self.synapses.get(&to).and_then(|s| s.get(&from)).copied()
    }

    pub fn synapse_count(&self) -> usize {
        self.synapses.values().map(|s| s.len()).sum()
    }

    /// Strengthen (or create) a synapse, keeping |weight| <= cap
    pub fn reinforce(&mut self, from: NeuronKind, to: NeuronKind, delta: f32, cap: f32) -> f32 {
        let weight = self.synapses.entry(to).or_default().entry(from).or_insert(0.0);
        *weight = (*weight + delta).clamp(-cap, cap);
        *weight
    }

    /// Drop synapses whose weight has faded below `epsilon`
    pub fn prune(&mut self, epsilon: f32) -> usize {
        let mut pruned = 0;
        for sources in self.synapses.values_mut() {
            let before = sources.len();
            sources.retain(|_, w| w.abs() >= epsilon);
            pruned += before - sources.len();
        }
        self.synapses.retain(|_, s| !s.is_empty());
        pruned
    }

    pub fn set_base_decay(&mut self, kind: NeuronKind, decay: f32) {
        self.neurons[kind.index()].base_decay = decay.clamp(self.min_decay, self.max_decay);
    }

    /// Pull one neuron's base decay toward a leader neuron's
    pub fn mimic(&mut self, kind: NeuronKind, leader: &Neuron, rate: f32) {
        let (min, max) = (self.min_decay, self.max_decay);
        self.neurons[kind.index()].mimic(leader, rate, min, max);
    }

    /// Base decay of every neuron, in [`NeuronKind::all`] order
    pub fn decay_profile(&self) -> Vec<(NeuronKind, f32)> {
        NeuronKind::all()
            .iter()
            .map(|kind| (*kind, self.neurons[kind.index()].base_decay))
            .collect()
    }

    pub fn states(&self) -> Vec<(NeuronKind, f32)> {
        NeuronKind::all()
            .iter()
            .map(|kind| (*kind, self.neurons[kind.index()].state))
            .collect()
    }
}
