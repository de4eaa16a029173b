//! Tabular Q-learning over a coarse combat state
//!
//! States are discretized (advantage x range x recovering) so the table
//! stays tiny: 18 states x 4 actions.

use ahash::AHashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Value of a state-action pair never updated
const NEUTRAL_VALUE: f32 = 0.0;

/// Advantage above this magnitude counts as winning/losing
const ADVANTAGE_BAND: f32 = 0.33;
const CLOSE_RANGE: f32 = 3.5;
const MID_RANGE: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvantageBin {
    Losing,
    Even,
    Winning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RangeBin {
    Close,
    Mid,
    Far,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub advantage: AdvantageBin,
    pub range: RangeBin,
    pub recovering: bool,
}

impl StateKey {
    pub fn new(advantage: f32, distance: f32, recovering: bool) -> Self {
        let advantage = if advantage < -ADVANTAGE_BAND {
            AdvantageBin::Losing
        } else if advantage > ADVANTAGE_BAND {
            AdvantageBin::Winning
        } else {
            AdvantageBin::Even
        };
        let range = if distance < CLOSE_RANGE {
            RangeBin::Close
        } else if distance < MID_RANGE {
            RangeBin::Mid
        } else {
            RangeBin::Far
        };
        Self {
            advantage,
            range,
            recovering,
        }
    }

    /// Every discrete state
    pub fn all() -> Vec<StateKey> {
        let mut keys = Vec::with_capacity(18);
        for advantage in [AdvantageBin::Losing, AdvantageBin::Even, AdvantageBin::Winning] {
            for range in [RangeBin::Close, RangeBin::Mid, RangeBin::Far] {
                for recovering in [false, true] {
                    keys.push(StateKey {
                        advantage,
                        range,
                        recovering,
                    });
                }
            }
        }
        keys
    }
}

/// Tactical intent learned by the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TacticalAction {
    Press,
    Hold,
    Flank,
    Withdraw,
}

impl TacticalAction {
    pub const ALL: [TacticalAction; 4] = [
        TacticalAction::Press,
        TacticalAction::Hold,
        TacticalAction::Flank,
        TacticalAction::Withdraw,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QTable {
    values: AHashMap<StateKey, [f32; 4]>,
    learning_rate: f32,
    discount: f32,
}

impl QTable {
    pub fn new(learning_rate: f32, discount: f32) -> Self {
        Self {
            values: AHashMap::new(),
            learning_rate,
            discount,
        }
    }

    pub fn value(&self, state: StateKey, action: TacticalAction) -> f32 {
        self.values
            .get(&state)
            .map_or(NEUTRAL_VALUE, |row| row[action.index()])
    }

    pub fn max_value(&self, state: StateKey) -> f32 {
        self.values
            .get(&state)
            .map_or(NEUTRAL_VALUE, |row| row.iter().copied().fold(f32::NEG_INFINITY, f32::max))
    }

    /// One-step TD update; returns the new value
    pub fn update(&mut self, state: StateKey, action: TacticalAction, reward: f32, next: StateKey) -> f32 {
        let target = reward + self.discount * self.max_value(next);
        let row = self.values.entry(state).or_insert([NEUTRAL_VALUE; 4]);
        let q = &mut row[action.index()];
        *q += self.learning_rate * (target - *q);
        *q
    }

    /// Greedy action; ties resolve to the earliest in [`TacticalAction::ALL`]
    pub fn best_action(&self, state: StateKey) -> TacticalAction {
        let Some(row) = self.values.get(&state) else {
            return TacticalAction::Press;
        };
        let mut best = TacticalAction::Press;
        for action in TacticalAction::ALL {
            if row[action.index()] > row[best.index()] {
                best = action;
            }
        }
        best
    }

    /// Epsilon-greedy selection; the flag is true when the pick was exploratory
    pub fn choose<R: Rng + ?Sized>(&self, state: StateKey, rng: &mut R, epsilon: f32) -> (TacticalAction, bool) {
        if rng.gen::<f32>() < epsilon {
            let action = TacticalAction::ALL[rng.gen_range(0..TacticalAction::ALL.len())];
            (action, true)
        } else {
            (self.best_action(state), false)
        }
    }

    /// Number of states visited at least once
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
