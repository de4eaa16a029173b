//! In-memory voxel arena
//!
//! Sparse solid-block set over an implicit bedrock floor (every block with
//! y < 0 is solid). Records every command it receives so callers can
//! inspect what the engine did.

use ahash::{AHashMap, AHashSet};
use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use super::{Cosmetic, SkillId, WorldCommands, WorldView};
use crate::core::types::{horizontal, AgentId, AgentState};

/// Pathing walk speed (blocks/second)
const WALK_SPEED: f32 = 4.3;
/// Distance at which a pathing goal counts as reached
const ARRIVAL_RADIUS: f32 = 0.5;
/// Fraction of horizontal velocity kept per second
const GROUND_FRICTION: f32 = 0.05;
const GRAVITY: f32 = 20.0;

/// A command received from the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldCommand {
    Velocity { agent: AgentId, velocity: Vec3 },
    PathTo { agent: AgentId, goal: Vec3 },
    Stop { agent: AgentId },
    CastSkill { agent: AgentId, skill: SkillId },
    Broadcast { speaker: AgentId, line: String, listeners: usize },
    Cosmetic { agent: AgentId, effect: Cosmetic },
}

impl WorldCommand {
    pub fn agent(&self) -> AgentId {
        match self {
            WorldCommand::Velocity { agent, .. }
            | WorldCommand::PathTo { agent, .. }
            | WorldCommand::Stop { agent }
            | WorldCommand::CastSkill { agent, .. }
            | WorldCommand::Cosmetic { agent, .. } => *agent,
            WorldCommand::Broadcast { speaker, .. } => *speaker,
        }
    }

    /// Does this command move the agent?
    pub fn is_movement(&self) -> bool {
        matches!(
            self,
            WorldCommand::Velocity { .. } | WorldCommand::PathTo { .. } | WorldCommand::Stop { .. }
        )
    }
}

#[derive(Debug, Default, Clone)]
pub struct Arena {
    agents: AHashMap<AgentId, AgentState>,
    solids: AHashSet<IVec3>,
    goals: AHashMap<AgentId, Vec3>,
    commands: Vec<WorldCommand>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, state: AgentState) -> AgentId {
        let id = state.id;
        self.agents.insert(id, state);
        id
    }

    /// Remove an agent entirely; the host no longer knows it
    pub fn despawn(&mut self, id: AgentId) -> Option<AgentState> {
        self.goals.remove(&id);
        self.agents.remove(&id)
    }

    /// Mark an agent dead but keep its corpse queryable
    pub fn kill(&mut self, id: AgentId) {
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.alive = false;
            agent.health = 0.0;
            agent.velocity = Vec3::ZERO;
        }
        self.goals.remove(&id);
    }

    /// Apply damage; returns true when this hit killed the agent
    pub fn damage(&mut self, id: AgentId, amount: f32) -> bool {
        let Some(agent) = self.agents.get_mut(&id) else {
            return false;
        };
        if !agent.alive {
            return false;
        }
        agent.health -= amount;
        if agent.health <= 0.0 {
            self.kill(id);
            return true;
        }
        false
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut AgentState> {
        self.agents.get_mut(&id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentState> {
        self.agents.values()
    }

    pub fn set_solid(&mut self, block: IVec3) {
        self.solids.insert(block);
    }

    /// Axis-aligned wall of solid blocks from `from` to `to` (inclusive, y = 0 up to `height`)
    pub fn build_wall(&mut self, from: IVec3, to: IVec3, height: i32) {
        let (min, max) = (from.min(to), from.max(to));
        for x in min.x..=max.x {
            for z in min.z..=max.z {
                for y in 0..height {
                    self.solids.insert(IVec3::new(x, min.y + y, z));
                }
            }
        }
    }

    pub fn commands(&self) -> &[WorldCommand] {
        &self.commands
    }

    pub fn commands_for(&self, id: AgentId) -> Vec<&WorldCommand> {
        self.commands.iter().filter(|c| c.agent() == id).collect()
    }

    pub fn take_commands(&mut self) -> Vec<WorldCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Steer an agent directly (for scripted opponents)
    pub fn drive(&mut self, id: AgentId, velocity: Vec3) {
        if let Some(agent) = self.agents.get_mut(&id) {
            if agent.alive {
                agent.velocity = velocity;
                if horizontal(velocity).length_squared() > f32::EPSILON {
                    agent.facing = horizontal(velocity).normalize();
                }
            }
        }
    }

    /// Advance the physics by `dt` seconds
    pub fn step(&mut self, dt: f32) {
        let friction = GROUND_FRICTION.powf(dt);
        let ids: Vec<AgentId> = self.agents.keys().copied().collect();

        for id in ids {
            let goal = self.goals.get(&id).copied();
            let Some(agent) = self.agents.get(&id) else {
                continue;
            };
            if !agent.alive {
                continue;
            }

            let mut position = agent.position;
            let mut velocity = agent.velocity;

            if let Some(goal) = goal {
                let to_goal = horizontal(goal - position);
                if to_goal.length() <= ARRIVAL_RADIUS {
                    self.goals.remove(&id);
                    velocity.x = 0.0;
                    velocity.z = 0.0;
                } else {
                    let walk = to_goal.normalize() * WALK_SPEED;
                    velocity.x = walk.x;
                    velocity.z = walk.z;
                }
            }

            velocity.y -= GRAVITY * dt;
            let mut next = position + velocity * dt;

            // Walls stop horizontal motion, the floor stops falling
            let feet = super::block_of(Vec3::new(next.x, position.y + 0.1, next.z));
            if self.solids.contains(&feet) {
                next.x = position.x;
                next.z = position.z;
                velocity.x = 0.0;
                velocity.z = 0.0;
            }
            let ground = self.ground_height(next);
            if next.y <= ground {
                next.y = ground;
                velocity.y = 0.0;
                if goal.is_none() {
                    velocity.x *= friction;
                    velocity.z *= friction;
                }
            }
            position = next;

            if let Some(agent) = self.agents.get_mut(&id) {
                agent.position = position;
                agent.velocity = velocity;
                if horizontal(velocity).length_squared() > 0.01 {
                    agent.facing = horizontal(velocity).normalize();
                }
            }
        }
    }

    /// Top surface of the highest solid block under a point
    fn ground_height(&self, p: Vec3) -> f32 {
        let column = super::block_of(p);
        let mut y = column.y;
        while y >= 0 {
            if self.solids.contains(&IVec3::new(column.x, y, column.z)) {
                return (y + 1) as f32;
            }
            y -= 1;
        }
        0.0
    }
}

impl WorldView for Arena {
    fn agent(&self, id: AgentId) -> Option<AgentState> {
        self.agents.get(&id).cloned()
    }

    fn agents_within(&self, center: Vec3, radius: f32) -> Vec<AgentState> {
        let r2 = radius * radius;
        self.agents
            .values()
            .filter(|a| a.position.distance_squared(center) <= r2)
            .cloned()
            .collect()
    }

    fn is_solid(&self, block: IVec3) -> bool {
        block.y < 0 || self.solids.contains(&block)
    }
}

impl WorldCommands for Arena {
    fn set_velocity(&mut self, agent: AgentId, velocity: Vec3) {
        self.goals.remove(&agent);
        if let Some(state) = self.agents.get_mut(&agent) {
            // Impulses are per-tick; the arena integrates in blocks/second
            state.velocity = velocity * 20.0;
        }
        self.commands.push(WorldCommand::Velocity { agent, velocity });
    }

    fn path_to(&mut self, agent: AgentId, goal: Vec3) {
        self.goals.insert(agent, goal);
        self.commands.push(WorldCommand::PathTo { agent, goal });
    }

    fn stop(&mut self, agent: AgentId) {
        self.goals.remove(&agent);
        if let Some(state) = self.agents.get_mut(&agent) {
            state.velocity = Vec3::ZERO;
        }
        self.commands.push(WorldCommand::Stop { agent });
    }

    fn cast_skill(&mut self, agent: AgentId, skill: &SkillId) {
        self.commands.push(WorldCommand::CastSkill {
            agent,
            skill: skill.clone(),
        });
    }

    fn broadcast(&mut self, speaker: AgentId, line: &str, radius: f32) {
        let listeners = match self.agents.get(&speaker) {
            Some(origin) => self
                .agents
                .values()
                .filter(|a| a.id != speaker && a.alive && a.position.distance(origin.position) <= radius)
                .count(),
            None => 0,
        };
        self.commands.push(WorldCommand::Broadcast {
            speaker,
            line: line.to_string(),
            listeners,
        });
    }

    fn cosmetic(&mut self, agent: AgentId, effect: Cosmetic) {
        self.commands.push(WorldCommand::Cosmetic { agent, effect });
    }
}
