//! Cover search
//!
//! Scans a cube of blocks around the agent for solid obstructions and
//! evaluates the standing spot on each obstruction's far side.

use glam::{IVec3, Vec3};

use super::snapshot::CoverPoint;
use crate::core::config::PerceptionConfig;
use crate::core::types::{horizontal, AgentState};
use crate::world::{block_of, WorldView};

/// Vertical offset of the ankle ray used to grade partial cover
const ANKLE_HEIGHT: f32 = 0.3;

/// Nearest spot hidden from `threat`'s eyes, if any
pub fn find_cover<W: WorldView + ?Sized>(
    world: &W,
    me: &AgentState,
    threat: Vec3,
    config: &PerceptionConfig,
) -> Option<CoverPoint> {
    let origin = block_of(me.position);
    let r = config.cover_search_radius.max(0);
    let threat_eye = threat + Vec3::Y * config.eye_height;
    let mut best: Option<CoverPoint> = None;

    for dx in -r..=r {
        for dz in -r..=r {
            for dy in 0..=1 {
                let block = origin + IVec3::new(dx, dy, dz);
                if !world.is_solid(block) {
                    continue;
                }

                let center = block.as_vec3() + Vec3::splat(0.5);
                let away = horizontal(center - threat).normalize_or_zero();
                if away == Vec3::ZERO {
                    continue;
                }

                let beside = block_of(center + away);
                let stand = IVec3::new(beside.x, origin.y, beside.z);
                if !is_standable(world, stand) {
                    continue;
                }

                let position = stand.as_vec3() + Vec3::new(0.5, 0.0, 0.5);
                if world.has_line_of_sight(threat_eye, position + Vec3::Y * config.eye_height) {
                    continue;
                }

                let distance = me.position.distance(position);
                if best.is_some_and(|b| b.distance <= distance) {
                    continue;
                }

                let feet_hidden = !world.has_line_of_sight(threat_eye, position + Vec3::Y * ANKLE_HEIGHT);
                let margin = (position.distance(threat) / config.sensing_radius).min(1.0);
                let safety = if feet_hidden { 0.7 } else { 0.4 } + 0.3 * margin;

                best = Some(CoverPoint {
                    position,
                    distance,
                    safety: safety.clamp(0.0, 1.0),
                });
            }
        }
    }

    best
}

/// Two free blocks over solid footing
fn is_standable<W: WorldView + ?Sized>(world: &W, feet: IVec3) -> bool {
    !world.is_solid(feet) && !world.is_solid(feet + IVec3::Y) && world.is_solid(feet - IVec3::Y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AgentId, AgentKind, FactionId};
    use crate::world::Arena;

    fn seeker_at(p: Vec3) -> AgentState {
        AgentState::new(AgentId::new(), AgentKind::Seeker, FactionId(0), p)
    }

    #[test]
    fn test_open_field_has_no_cover() {
        let arena = Arena::new();
        let me = seeker_at(Vec3::new(0.5, 0.0, 0.5));
        let cover = find_cover(&arena, &me, Vec3::new(10.5, 0.0, 0.5), &PerceptionConfig::default());
        assert!(cover.is_none());
    }

    #[test]
    fn test_finds_spot_behind_wall() {
        let mut arena = Arena::new();
        // Wall between agent side and threat, threat to the +x
        arena.build_wall(IVec3::new(3, 0, -3), IVec3::new(3, 0, 3), 3);
        let me = seeker_at(Vec3::new(0.5, 0.0, 0.5));
        let threat = Vec3::new(10.5, 0.0, 0.5);

        let cover = find_cover(&arena, &me, threat, &PerceptionConfig::default()).expect("wall should give cover");
        // Hidden spot is on the agent's side of the wall
        assert!(cover.position.x < 3.0);
        assert!(!arena.has_line_of_sight(threat + Vec3::Y * 1.62, cover.position + Vec3::Y * 1.62));
        assert!(cover.safety > 0.0 && cover.safety <= 1.0);
    }
}
