//! Actuator: decision to world commands
//!
//! Executes movement, skill, voice and cosmetic side effects of one
//! decision. Unknown tokens are skipped, never raised.

pub mod movement;
pub mod probe;

pub use movement::{plan_movement, MovementCommand};
pub use probe::{probe_path, PathProbe};

use serde::Serialize;
use tracing::debug;

use crate::core::config::ActuatorConfig;
use crate::core::types::{AgentId, Millis};
use crate::decision::{ActionType, Decision};
use crate::world::{Cosmetic, WorldCommands, WorldView};

/// What an `apply` call actually did
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Actuation {
    pub movement: MovementCommand,
    pub skill_cast: bool,
    pub voiced: bool,
    pub cosmetic: Option<Cosmetic>,
}

impl Actuation {
    pub fn nothing() -> Self {
        Self {
            movement: MovementCommand::Nothing,
            skill_cast: false,
            voiced: false,
            cosmetic: None,
        }
    }

    pub fn is_noop(&self) -> bool {
        *self == Self::nothing()
    }
}

fn cosmetic_for(action: &ActionType) -> Option<Cosmetic> {
    match action {
        ActionType::Ambush => Some(Cosmetic::Roar),
        ActionType::Evade => Some(Cosmetic::Whoosh),
        ActionType::CounterAttack | ActionType::Finisher => Some(Cosmetic::Sparks),
        ActionType::Retreat => Some(Cosmetic::Dust),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Actuator {
    config: ActuatorConfig,
}

impl Actuator {
    pub fn new(config: ActuatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ActuatorConfig {
        &self.config
    }

    /// Carry out `decision` for `agent`; no-op if the agent is gone or dead
    pub fn apply<W: WorldView + WorldCommands + ?Sized>(
        &self,
        world: &mut W,
        agent: AgentId,
        decision: &Decision,
        now: Millis,
    ) -> Actuation {
        let Some(me) = world.agent(agent).filter(|a| a.alive) else {
            debug!(agent = %agent, "actuation skipped, agent unavailable");
            return Actuation::nothing();
        };

        if let ActionType::Unrecognized(token) = &decision.action {
            debug!(agent = %agent, token = token.as_str(), "ignoring unrecognized action");
            return Actuation::nothing();
        }

        let movement = plan_movement(world, &me, &decision.movement, now, &self.config);
        match movement {
            MovementCommand::Impulse(velocity) => world.set_velocity(agent, velocity),
            MovementCommand::PathTo(goal) => world.path_to(agent, goal),
            MovementCommand::Stop => world.stop(agent),
            MovementCommand::Nothing => {}
        }

        let skill_cast = match &decision.skill {
            Some(skill) => {
                world.cast_skill(agent, skill);
                true
            }
            None => false,
        };

        let voiced = match &decision.voice_line {
            Some(line) => {
                world.broadcast(agent, line, self.config.voice_radius);
                true
            }
            None => false,
        };

        let cosmetic = cosmetic_for(&decision.action);
        if let Some(effect) = cosmetic {
            world.cosmetic(agent, effect);
        }

        Actuation {
            movement,
            skill_cast,
            voiced,
            cosmetic,
        }
    }
}
