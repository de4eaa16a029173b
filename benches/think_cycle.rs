use std::hint::black_box;

use arc_seeker::brain::{Brain, Traits};
use arc_seeker::collective::CollectiveMemory;
use arc_seeker::core::types::{AgentId, AgentKind, AgentState, FactionId, ItemCategory};
use arc_seeker::decision::DecisionEngine;
use arc_seeker::perception::{scan, scan_many};
use arc_seeker::world::Arena;
use arc_seeker::SeekerConfig;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{IVec3, Vec3};

/// Seekers on one side of a broken wall, opponents on the other
fn battlefield(per_side: usize) -> (Arena, Vec<AgentId>) {
    let mut arena = Arena::new();
    arena.build_wall(IVec3::new(12, 0, -10), IVec3::new(12, 0, -2), 2);
    arena.build_wall(IVec3::new(12, 0, 2), IVec3::new(12, 0, 10), 2);

    let mut seekers = Vec::with_capacity(per_side);
    for i in 0..per_side {
        let z = (i as f32 - per_side as f32 / 2.0) * 1.5;
        let mut seeker = AgentState::new(AgentId::new(), AgentKind::Seeker, FactionId(0), Vec3::new(4.5, 0.0, z));
        seeker.held = ItemCategory::Sword;
        seekers.push(arena.spawn(seeker));

        let mut opponent = AgentState::new(AgentId::new(), AgentKind::Player, FactionId(1), Vec3::new(20.5, 0.0, z));
        opponent.held = if i % 3 == 0 { ItemCategory::Bow } else { ItemCategory::Axe };
        opponent.velocity = Vec3::new(-3.0, 0.0, 0.0);
        opponent.facing = Vec3::NEG_X;
        arena.spawn(opponent);
    }
    (arena, seekers)
}

fn bench_think(c: &mut Criterion) {
    let config = SeekerConfig::default();
    let engine = DecisionEngine::new(config.clone());
    let collective = CollectiveMemory::new(config.collective.clone());

    let mut group = c.benchmark_group("think_cycle");
    for per_side in [4_usize, 16, 64] {
        let (arena, seekers) = battlefield(per_side);
        let mut brains: Vec<Brain> = seekers
            .iter()
            .map(|id| Brain::new(*id, Traits::default(), &config))
            .collect();

        group.bench_with_input(BenchmarkId::new("scan_and_think", per_side), &per_side, |b, _| {
            let mut now = 0;
            b.iter(|| {
                now += 50;
                for brain in brains.iter_mut() {
                    if let Some(snapshot) = scan(&arena, brain.agent(), brain.traits, now, &config.perception) {
                        black_box(engine.think(&snapshot, brain, &collective));
                    }
                }
            })
        });

        let requests: Vec<(AgentId, Traits)> = seekers.iter().map(|id| (*id, Traits::default())).collect();
        group.bench_with_input(BenchmarkId::new("scan_many", per_side), &per_side, |b, _| {
            b.iter(|| black_box(scan_many(&arena, &requests, 0, &config.perception)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_think);
criterion_main!(benches);
