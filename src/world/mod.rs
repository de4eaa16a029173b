//! Host world seam
//!
//! The engine never owns agents or terrain. It reads them through
//! [`WorldView`] and writes side effects through [`WorldCommands`].
//! [`Arena`] is a small in-memory voxel world implementing both.

pub mod arena;

pub use arena::{Arena, WorldCommand};

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::types::{AgentId, AgentState};

/// Sampling step for line-of-sight rays (blocks)
const LOS_STEP: f32 = 0.25;

/// Skill identifier understood by the host (e.g. "seeker:pounce")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillId(pub String);

impl SkillId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Purely visual/audible feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cosmetic {
    Roar,
    Dust,
    Sparks,
    Whoosh,
}

/// Block containing a point
pub fn block_of(p: Vec3) -> IVec3 {
    p.floor().as_ivec3()
}

/// Read access to the host world
pub trait WorldView {
    /// Current state of an agent, dead or alive, if the host still knows it
    fn agent(&self, id: AgentId) -> Option<AgentState>;

    /// All agents (including corpses) within `radius` of `center`
    fn agents_within(&self, center: Vec3, radius: f32) -> Vec<AgentState>;

    /// Is this block solid material?
    fn is_solid(&self, block: IVec3) -> bool;

    /// Ray-march from `from` to `to`; the block containing `to` is ignored
    fn has_line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        let delta = to - from;
        let length = delta.length();
        if length < f32::EPSILON {
            return true;
        }

        let steps = (length / LOS_STEP).ceil() as i32;
        let end_block = block_of(to);
        for i in 1..steps {
            let point = from + delta * (i as f32 / steps as f32);
            let block = block_of(point);
            if block != end_block && self.is_solid(block) {
                return false;
            }
        }
        true
    }
}

/// Outbound side effects toward the host world
pub trait WorldCommands {
    fn set_velocity(&mut self, agent: AgentId, velocity: Vec3);

    /// Hand a navigation goal to the host pathfinder
    fn path_to(&mut self, agent: AgentId, goal: Vec3);

    fn stop(&mut self, agent: AgentId);

    fn cast_skill(&mut self, agent: AgentId, skill: &SkillId);

    /// Deliver a voice line to observers within `radius` of the speaker
    fn broadcast(&mut self, speaker: AgentId, line: &str, radius: f32);

    fn cosmetic(&mut self, agent: AgentId, effect: Cosmetic);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_of_floors_negative_coordinates() {
        assert_eq!(block_of(Vec3::new(-0.5, 0.2, 1.9)), IVec3::new(-1, 0, 1));
    }

    #[test]
    fn test_skill_id_serializes_as_string() {
        let json = serde_json::to_string(&SkillId::new("seeker:pounce")).unwrap();
        assert_eq!(json, "\"seeker:pounce\"");
    }
}
