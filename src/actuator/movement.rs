//! Movement strategies
//!
//! Turns a [`MovementDirective`] into one concrete world command. Pure
//! with respect to the world: reads through [`WorldView`] only.

use std::f32::consts::TAU;

use glam::Vec3;
use serde::Serialize;
use tracing::debug;

use super::probe::{probe_path, PathProbe};
use crate::core::config::ActuatorConfig;
use crate::core::types::{horizontal, AgentState, Millis};
use crate::decision::{MovementDirective, MovementStrategy};
use crate::world::WorldView;

/// Minimum distance used when weighting scatter repulsion
const MIN_REPULSION_DISTANCE: f32 = 0.5;
/// Lateral share of a diagonal retreat
const DIAGONAL_SLANT: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum MovementCommand {
    Impulse(Vec3),
    PathTo(Vec3),
    Stop,
    Nothing,
}

/// Left-hand perpendicular on the horizontal plane
fn perpendicular(v: Vec3) -> Vec3 {
    Vec3::new(-v.z, 0.0, v.x)
}

fn side_sign(me: &AgentState) -> f32 {
    if me.id.identity_bit() {
        1.0
    } else {
        -1.0
    }
}

/// Where the directive points: live target, else fixed destination
fn resolve_target<W: WorldView + ?Sized>(world: &W, directive: &MovementDirective) -> Option<Vec3> {
    directive
        .target
        .and_then(|id| world.agent(id))
        .filter(|agent| agent.alive)
        .map(|agent| agent.position)
        .or(directive.destination)
}

pub fn plan_movement<W: WorldView + ?Sized>(
    world: &W,
    me: &AgentState,
    directive: &MovementDirective,
    now: Millis,
    config: &ActuatorConfig,
) -> MovementCommand {
    let target = resolve_target(world, directive);

    match &directive.strategy {
        MovementStrategy::None => MovementCommand::Nothing,
        MovementStrategy::Stop => MovementCommand::Stop,
        MovementStrategy::PathToCover => directive
            .destination
            .map_or(MovementCommand::Nothing, MovementCommand::PathTo),
        MovementStrategy::PathToEnemy => target.map_or(MovementCommand::Nothing, MovementCommand::PathTo),
        MovementStrategy::Burst => match target {
            Some(target) => burst(world, me, target, config),
            None => MovementCommand::Nothing,
        },
        MovementStrategy::BackStep | MovementStrategy::SideStep => {
            evasive_step(world, me, target, &directive.strategy, now, config)
        }
        MovementStrategy::Orbital => match target {
            Some(target) => orbit(world, me, target, now, config),
            None => MovementCommand::Nothing,
        },
        MovementStrategy::ZigZag => match target {
            Some(target) => zigzag(world, me, target, now, config),
            None => MovementCommand::Nothing,
        },
        MovementStrategy::DiagonalRetreat => diagonal_retreat(world, me, target, config),
        MovementStrategy::Scatter => scatter(world, me, directive, config),
        MovementStrategy::Unrecognized(token) => {
            debug!(agent = %me.id, token = token.as_str(), "ignoring unrecognized movement strategy");
            MovementCommand::Nothing
        }
    }
}

fn burst<W: WorldView + ?Sized>(world: &W, me: &AgentState, target: Vec3, config: &ActuatorConfig) -> MovementCommand {
    let dir = horizontal(target - me.position).normalize_or_zero();
    if dir == Vec3::ZERO {
        return MovementCommand::Nothing;
    }
    match probe_path(world, me.position, dir, config) {
        PathProbe::Clear => MovementCommand::Impulse(dir * config.burst_speed + Vec3::Y * config.flat_bias),
        PathProbe::Step => MovementCommand::Impulse(dir * config.burst_speed + Vec3::Y * config.jump_bias),
        PathProbe::Blocked => MovementCommand::PathTo(target),
    }
}

fn evasive_step<W: WorldView + ?Sized>(
    world: &W,
    me: &AgentState,
    threat: Option<Vec3>,
    strategy: &MovementStrategy,
    now: Millis,
    config: &ActuatorConfig,
) -> MovementCommand {
    let toward = threat
        .map(|t| horizontal(t - me.position).normalize_or_zero())
        .filter(|d| *d != Vec3::ZERO)
        .unwrap_or_else(|| horizontal(me.facing).normalize_or_zero());
    if toward == Vec3::ZERO {
        return MovementCommand::Stop;
    }

    // Alternate sides every second so the dodge is not predictable
    let flip = (now / 1_000) % 2 == 1;
    let side = perpendicular(toward) * if flip { -side_sign(me) } else { side_sign(me) };
    let back = -toward;

    let candidates = if *strategy == MovementStrategy::BackStep {
        [back, (back + side).normalize(), (back - side).normalize()]
    } else {
        [side, -side, back]
    };

    candidates
        .into_iter()
        .find(|dir| probe_path(world, me.position, *dir, config) != PathProbe::Blocked)
        .map_or(MovementCommand::Stop, |dir| {
            MovementCommand::Impulse(dir * config.evade_speed + Vec3::Y * config.flat_bias)
        })
}

fn orbit<W: WorldView + ?Sized>(
    world: &W,
    me: &AgentState,
    target: Vec3,
    now: Millis,
    config: &ActuatorConfig,
) -> MovementCommand {
    let forward = horizontal(target - me.position).normalize_or_zero();
    if forward == Vec3::ZERO {
        return MovementCommand::Nothing;
    }
    let period = config.orbit_period_ms.max(1);
    let side = if (now / period) % 2 == 0 { side_sign(me) } else { -side_sign(me) };
    let velocity = perpendicular(forward) * side * config.strafe_speed
        + forward * config.strafe_speed * config.advance_fraction;

    if probe_path(world, me.position, velocity, config) == PathProbe::Blocked {
        MovementCommand::PathTo(target)
    } else {
        MovementCommand::Impulse(velocity)
    }
}

fn zigzag<W: WorldView + ?Sized>(
    world: &W,
    me: &AgentState,
    target: Vec3,
    now: Millis,
    config: &ActuatorConfig,
) -> MovementCommand {
    let forward = horizontal(target - me.position).normalize_or_zero();
    if forward == Vec3::ZERO {
        return MovementCommand::Nothing;
    }
    let period = config.zigzag_period_ms.max(1);
    let phase = (now % period) as f32 / period as f32 * TAU;
    let lateral = phase.sin() * config.zigzag_amplitude * config.strafe_speed * side_sign(me);
    let velocity = forward * config.burst_speed * 0.5 + perpendicular(forward) * lateral;

    if probe_path(world, me.position, velocity, config) == PathProbe::Blocked {
        MovementCommand::PathTo(target)
    } else {
        MovementCommand::Impulse(velocity)
    }
}

fn diagonal_retreat<W: WorldView + ?Sized>(
    world: &W,
    me: &AgentState,
    threat: Option<Vec3>,
    config: &ActuatorConfig,
) -> MovementCommand {
    let away = threat
        .map(|t| horizontal(me.position - t).normalize_or_zero())
        .filter(|d| *d != Vec3::ZERO)
        .unwrap_or_else(|| -horizontal(me.facing).normalize_or_zero());
    if away == Vec3::ZERO {
        return MovementCommand::Stop;
    }
    let dir = (away + perpendicular(away) * side_sign(me) * DIAGONAL_SLANT).normalize();

    if probe_path(world, me.position, dir, config) == PathProbe::Blocked {
        MovementCommand::PathTo(me.position + dir * config.retreat_distance)
    } else {
        MovementCommand::Impulse(dir * config.evade_speed + Vec3::Y * config.flat_bias)
    }
}

fn scatter<W: WorldView + ?Sized>(
    world: &W,
    me: &AgentState,
    directive: &MovementDirective,
    config: &ActuatorConfig,
) -> MovementCommand {
    let repulsion: Vec3 = world
        .agents_within(me.position, config.threat_radius)
        .iter()
        .filter(|other| other.alive && me.is_hostile_to(other))
        .map(|other| {
            let offset = horizontal(me.position - other.position);
            let distance = offset.length().max(MIN_REPULSION_DISTANCE);
            offset.normalize_or_zero() / distance
        })
        .sum();

    let dir = repulsion.normalize_or_zero();
    if dir != Vec3::ZERO && probe_path(world, me.position, dir, config) != PathProbe::Blocked {
        return MovementCommand::Impulse(dir * config.evade_speed + Vec3::Y * config.flat_bias);
    }

    if let Some(destination) = directive.destination {
        return MovementCommand::PathTo(destination);
    }
    if dir != Vec3::ZERO {
        return MovementCommand::PathTo(me.position + dir * config.retreat_distance);
    }
    MovementCommand::Nothing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AgentId, AgentKind, FactionId};
    use crate::world::Arena;
    use glam::IVec3;

    fn setup() -> (Arena, AgentState, AgentId) {
        let mut arena = Arena::new();
        let me = AgentState::new(AgentId::new(), AgentKind::Seeker, FactionId(0), Vec3::new(0.5, 0.0, 0.5));
        arena.spawn(me.clone());
        let enemy = arena.spawn(AgentState::new(
            AgentId::new(),
            AgentKind::Player,
            FactionId(1),
            Vec3::new(6.5, 0.0, 0.5),
        ));
        (arena, me, enemy)
    }

    fn plan(arena: &Arena, me: &AgentState, strategy: MovementStrategy, target: AgentId, now: Millis) -> MovementCommand {
        plan_movement(
            arena,
            me,
            &MovementDirective::toward(strategy, target),
            now,
            &ActuatorConfig::default(),
        )
    }

    #[test]
    fn test_burst_flat_then_hop() {
        let (mut arena, me, enemy) = setup();
        match plan(&arena, &me, MovementStrategy::Burst, enemy, 0) {
            MovementCommand::Impulse(v) => {
                assert!(v.x > 1.0);
                assert!((v.y - 0.1).abs() < 1e-6);
            }
            other => panic!("expected impulse, got {:?}", other),
        }

        arena.set_solid(IVec3::new(1, 0, 0));
        match plan(&arena, &me, MovementStrategy::Burst, enemy, 0) {
            MovementCommand::Impulse(v) => assert!((v.y - 0.42).abs() < 1e-6),
            other => panic!("expected hop, got {:?}", other),
        }
    }

    #[test]
    fn test_burst_into_wall_falls_back_to_pathing() {
        let (mut arena, me, enemy) = setup();
        arena.build_wall(IVec3::new(1, 0, -1), IVec3::new(1, 0, 1), 3);
        assert_eq!(
            plan(&arena, &me, MovementStrategy::Burst, enemy, 0),
            MovementCommand::PathTo(Vec3::new(6.5, 0.0, 0.5))
        );
    }

    #[test]
    fn test_back_step_moves_away() {
        let (arena, me, enemy) = setup();
        match plan(&arena, &me, MovementStrategy::BackStep, enemy, 0) {
            MovementCommand::Impulse(v) => assert!(v.x < 0.0),
            other => panic!("expected impulse, got {:?}", other),
        }
    }

    #[test]
    fn test_side_step_is_lateral() {
        let (arena, me, enemy) = setup();
        match plan(&arena, &me, MovementStrategy::SideStep, enemy, 0) {
            MovementCommand::Impulse(v) => {
                assert!(v.x.abs() < 1e-5);
                assert!(v.z.abs() > 0.5);
            }
            other => panic!("expected impulse, got {:?}", other),
        }
    }

    #[test]
    fn test_orbit_alternates_sides() {
        let (arena, me, enemy) = setup();
        let first = plan(&arena, &me, MovementStrategy::Orbital, enemy, 0);
        let second = plan(&arena, &me, MovementStrategy::Orbital, enemy, 800);
        match (first, second) {
            (MovementCommand::Impulse(a), MovementCommand::Impulse(b)) => {
                assert!(a.z * b.z < 0.0, "should switch sides: {:?} {:?}", a, b);
                assert!(a.x > 0.0 && b.x > 0.0, "should keep advancing");
            }
            other => panic!("expected impulses, got {:?}", other),
        }
    }

    #[test]
    fn test_diagonal_retreat_backs_off_at_angle() {
        let (arena, me, enemy) = setup();
        match plan(&arena, &me, MovementStrategy::DiagonalRetreat, enemy, 0) {
            MovementCommand::Impulse(v) => {
                assert!(v.x < 0.0);
                assert!(v.z.abs() > 0.1);
            }
            other => panic!("expected impulse, got {:?}", other),
        }
    }

    #[test]
    fn test_scatter_pushes_away_from_group() {
        let (mut arena, me, enemy) = setup();
        arena.spawn(AgentState::new(
            AgentId::new(),
            AgentKind::Player,
            FactionId(1),
            Vec3::new(4.5, 0.0, 4.5),
        ));
        match plan(&arena, &me, MovementStrategy::Scatter, enemy, 0) {
            MovementCommand::Impulse(v) => {
                assert!(v.x < 0.0);
                assert!(v.z < 0.0);
            }
            other => panic!("expected impulse, got {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_strategy_is_noop() {
        let (arena, me, enemy) = setup();
        assert_eq!(
            plan(&arena, &me, MovementStrategy::parse("TELEPORT"), enemy, 0),
            MovementCommand::Nothing
        );
    }

    #[test]
    fn test_missing_target_does_nothing() {
        let (arena, me, _) = setup();
        assert_eq!(
            plan(&arena, &me, MovementStrategy::PathToEnemy, AgentId::new(), 0),
            MovementCommand::Nothing
        );
    }
}
