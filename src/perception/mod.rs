//! Perception: world state to snapshot
//!
//! Builds a [`PerceptionSnapshot`] for one agent from a read-only
//! [`WorldView`]. Batches run in parallel once they are large enough to
//! amortize the thread-pool overhead.

pub mod cover;
pub mod snapshot;

pub use snapshot::{
    AllyHealth, AllyView, CoverPoint, HealthBucket, OpponentView, PerceptionSnapshot, SelfView,
};

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::brain::Traits;
use crate::core::config::PerceptionConfig;
use crate::core::types::{AgentId, Millis};
use crate::world::WorldView;

/// Snapshot of `agent`'s surroundings, or `None` if it is gone or dead
pub fn scan<W: WorldView + ?Sized>(
    world: &W,
    agent: AgentId,
    traits: Traits,
    now: Millis,
    config: &PerceptionConfig,
) -> Option<PerceptionSnapshot> {
    let me = world.agent(agent)?;
    if !me.alive {
        return None;
    }

    let eye = me.eye_position(config.eye_height);
    let mut opponents = Vec::new();
    let mut allies = Vec::new();

    for other in world.agents_within(me.position, config.sensing_radius) {
        if other.id == me.id {
            continue;
        }
        let distance = me.position.distance(other.position);
        if distance > config.sensing_radius {
            continue;
        }

        if me.is_hostile_to(&other) {
            if !other.alive {
                continue;
            }
            let line_of_sight = world.has_line_of_sight(eye, other.eye_position(config.eye_height));
            opponents.push(OpponentView {
                id: other.id,
                position: other.position,
                velocity: other.velocity,
                facing: other.facing,
                distance,
                health: HealthBucket::from_ratio(other.health_ratio()),
                held: other.held,
                line_of_sight,
            });
        } else {
            allies.push(AllyView {
                id: other.id,
                distance,
                health: AllyHealth::from_ratio(other.alive, other.health_ratio()),
                health_ratio: if other.alive { other.health_ratio() } else { 0.0 },
            });
        }
    }

    opponents.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
    allies.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));

    let cover = opponents
        .first()
        .and_then(|threat| cover::find_cover(world, &me, threat.position, config));

    Some(PerceptionSnapshot {
        agent,
        taken_at: now,
        me: SelfView {
            position: me.position,
            velocity: me.velocity,
            facing: me.facing,
            health_ratio: me.health_ratio(),
            stance: me.stance,
            held: me.held,
        },
        opponents,
        allies,
        cover,
        traits,
    })
}

/// Scan many agents; parallel above `config.parallel_threshold`
pub fn scan_many<W: WorldView + Sync + ?Sized>(
    world: &W,
    requests: &[(AgentId, Traits)],
    now: Millis,
    config: &PerceptionConfig,
) -> Vec<(AgentId, Option<PerceptionSnapshot>)> {
    if requests.len() >= config.parallel_threshold {
        requests
            .par_iter()
            .map(|(agent, traits)| (*agent, scan(world, *agent, *traits, now, config)))
            .collect()
    } else {
        requests
            .iter()
            .map(|(agent, traits)| (*agent, scan(world, *agent, *traits, now, config)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AgentKind, AgentState, FactionId, ItemCategory};
    use crate::world::Arena;
    use glam::{IVec3, Vec3};

    fn spawn(arena: &mut Arena, kind: AgentKind, faction: u32, x: f32, z: f32) -> AgentId {
        arena.spawn(AgentState::new(AgentId::new(), kind, FactionId(faction), Vec3::new(x, 0.0, z)))
    }

    #[test]
    fn test_missing_or_dead_agent_has_no_snapshot() {
        let mut arena = Arena::new();
        let config = PerceptionConfig::default();
        assert!(scan(&arena, AgentId::new(), Traits::default(), 0, &config).is_none());

        let id = spawn(&mut arena, AgentKind::Seeker, 0, 0.5, 0.5);
        arena.kill(id);
        assert!(scan(&arena, id, Traits::default(), 0, &config).is_none());
    }

    #[test]
    fn test_sorts_opponents_and_splits_allies() {
        let mut arena = Arena::new();
        let me = spawn(&mut arena, AgentKind::Seeker, 0, 0.5, 0.5);
        let far = spawn(&mut arena, AgentKind::Player, 1, 10.5, 0.5);
        let near = spawn(&mut arena, AgentKind::Player, 1, 3.5, 0.5);
        spawn(&mut arena, AgentKind::Seeker, 0, 0.5, 2.5);
        spawn(&mut arena, AgentKind::Player, 1, 80.5, 0.5);
        if let Some(agent) = arena.agent_mut(near) {
            agent.held = ItemCategory::Bow;
        }

        let snapshot = scan(&arena, me, Traits::default(), 500, &PerceptionConfig::default()).unwrap();
        assert_eq!(snapshot.opponents.len(), 2);
        assert_eq!(snapshot.opponents[0].id, near);
        assert_eq!(snapshot.opponents[0].held, ItemCategory::Bow);
        assert_eq!(snapshot.opponents[1].id, far);
        assert_eq!(snapshot.allies.len(), 1);
        assert_eq!(snapshot.taken_at, 500);
        assert!(snapshot.opponents.iter().all(|o| o.line_of_sight));
    }

    #[test]
    fn test_fallen_ally_reported_dead() {
        let mut arena = Arena::new();
        let me = spawn(&mut arena, AgentKind::Seeker, 0, 0.5, 0.5);
        let ally = spawn(&mut arena, AgentKind::Seeker, 0, 2.5, 0.5);
        arena.kill(ally);

        let snapshot = scan(&arena, me, Traits::default(), 0, &PerceptionConfig::default()).unwrap();
        assert_eq!(snapshot.allies[0].health, AllyHealth::Dead);
        assert_eq!(snapshot.living_allies().count(), 0);
    }

    #[test]
    fn test_wall_hides_opponent() {
        let mut arena = Arena::new();
        let me = spawn(&mut arena, AgentKind::Seeker, 0, 0.5, 0.5);
        spawn(&mut arena, AgentKind::Player, 1, 8.5, 0.5);
        arena.build_wall(IVec3::new(4, 0, -2), IVec3::new(4, 0, 2), 3);

        let snapshot = scan(&arena, me, Traits::default(), 0, &PerceptionConfig::default()).unwrap();
        assert!(!snapshot.opponents[0].line_of_sight);
    }

    #[test]
    fn test_scan_many_matches_scan() {
        let mut arena = Arena::new();
        let ids: Vec<AgentId> = (0..8)
            .map(|i| spawn(&mut arena, AgentKind::Seeker, 0, i as f32 * 2.0, 0.5))
            .collect();
        spawn(&mut arena, AgentKind::Player, 1, 5.0, 5.0);

        let mut config = PerceptionConfig::default();
        config.parallel_threshold = 4;
        let requests: Vec<(AgentId, Traits)> = ids.iter().map(|id| (*id, Traits::default())).collect();
        let results = scan_many(&arena, &requests, 0, &config);

        assert_eq!(results.len(), ids.len());
        for (id, snapshot) in results {
            assert_eq!(snapshot, scan(&arena, id, Traits::default(), 0, &config));
        }
    }
}
