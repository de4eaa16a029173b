//! Inference channels
//!
//! An inference channel turns a snapshot into advisory [`Decision`]s off
//! the main thread. The engine still decides on completion; advice only
//! fills gaps or replaces a learned choice.

use async_trait::async_trait;

use crate::core::error::Result;
use crate::decision::{ActionType, Decision, MovementDirective, MovementStrategy};
use crate::perception::{AllyHealth, HealthBucket, PerceptionSnapshot};

#[async_trait]
pub trait InferenceChannel: Send + Sync + 'static {
    /// Produce advice for one snapshot. May take arbitrarily long; the
    /// orchestrator enforces its own timeout.
    async fn request(&self, snapshot: PerceptionSnapshot) -> Result<Decision>;
}

/// Local rule-of-thumb advisor
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicInference;

#[async_trait]
impl InferenceChannel for HeuristicInference {
    async fn request(&self, snapshot: PerceptionSnapshot) -> Result<Decision> {
        Ok(advise(&snapshot))
    }
}

/// Situational advice from a snapshot alone
pub fn advise(snapshot: &PerceptionSnapshot) -> Decision {
    let Some(nearest) = snapshot.nearest_opponent() else {
        return Decision::new(ActionType::Idle, MovementDirective::none());
    };

    if snapshot.is_outnumbered() && snapshot.me.health_ratio < 0.5 {
        return Decision::new(
            ActionType::Retreat,
            MovementDirective::toward(MovementStrategy::Scatter, nearest.id),
        )
        .with_voice("There are too many of them!")
        .with_reasoning("outnumbered and hurt");
    }

    if nearest.health == HealthBucket::Critical && nearest.line_of_sight {
        return Decision::new(
            ActionType::Attack,
            MovementDirective::toward(MovementStrategy::Burst, nearest.id),
        )
        .with_voice("Finish it!")
        .with_reasoning("target nearly dead");
    }

    if snapshot.opponents.iter().all(|o| !o.line_of_sight) {
        return Decision::new(
            ActionType::Attack,
            MovementDirective::toward(MovementStrategy::PathToEnemy, nearest.id),
        )
        .with_reasoning("no sight line, hunt");
    }

    let wounded_ally = snapshot.living_allies().any(|a| a.health == AllyHealth::Wounded);
    if wounded_ally && snapshot.me.health_ratio > 0.7 {
        return Decision::new(ActionType::Idle, MovementDirective::none())
            .with_voice("Hold on, I'm coming!")
            .with_reasoning("ally wounded");
    }

    Decision::new(ActionType::Idle, MovementDirective::none())
}
