//! Obstruction and footing probes

use glam::{IVec3, Vec3};
use serde::Serialize;

use crate::core::config::ActuatorConfig;
use crate::core::types::horizontal;
use crate::world::{block_of, WorldView};

const FEET_RAY_HEIGHT: f32 = 0.5;
const HEAD_RAY_HEIGHT: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PathProbe {
    Clear,
    /// Knee-high obstacle that can be hopped
    Step,
    /// Wall, overhang or drop
    Blocked,
}

fn ray_blocked<W: WorldView + ?Sized>(world: &W, from: Vec3, to: Vec3) -> bool {
    world.is_solid(block_of(to)) || !world.has_line_of_sight(from, to)
}

/// Probe `config.probe_distance` ahead of `origin` along `direction`
pub fn probe_path<W: WorldView + ?Sized>(
    world: &W,
    origin: Vec3,
    direction: Vec3,
    config: &ActuatorConfig,
) -> PathProbe {
    let dir = horizontal(direction).normalize_or_zero();
    if dir == Vec3::ZERO {
        return PathProbe::Clear;
    }
    let ahead = origin + dir * config.probe_distance;

    let head_blocked = ray_blocked(
        world,
        origin + Vec3::Y * HEAD_RAY_HEIGHT,
        ahead + Vec3::Y * HEAD_RAY_HEIGHT,
    );
    if head_blocked {
        return PathProbe::Blocked;
    }

    let feet_blocked = ray_blocked(
        world,
        origin + Vec3::Y * FEET_RAY_HEIGHT,
        ahead + Vec3::Y * FEET_RAY_HEIGHT,
    );
    if feet_blocked {
        return PathProbe::Step;
    }

    let landing = block_of(ahead);
    let has_footing = (1..=config.footing_depth.max(1)).any(|depth| world.is_solid(landing - IVec3::Y * depth));
    if has_footing {
        PathProbe::Clear
    } else {
        PathProbe::Blocked
    }
}
