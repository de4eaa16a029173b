//! Headless Skirmish Runner
//!
//! Runs seekers against scripted opponents in an in-memory arena and
//! prints a JSON report.

use std::time::Duration;

use arc_seeker::brain::{load_personality, BrainSummary, Personality};
use arc_seeker::collective::{CollectiveMemory, GlobalBiases};
use arc_seeker::core::config::DecisionMode;
use arc_seeker::core::types::{AgentId, AgentKind, AgentState, FactionId, ItemCategory, Millis};
use arc_seeker::experience::{CombatEvent, ExperienceFeed};
use arc_seeker::orchestrator::{ApplyOutcome, HeuristicInference, InferenceChannel, Orchestrator, RemoteInference};
use arc_seeker::world::{Arena, WorldCommand, WorldView};
use arc_seeker::{Result, SeekerConfig};
use clap::Parser;
use glam::{IVec3, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Headless skirmish: seekers vs scripted opponents
#[derive(Parser, Debug)]
#[command(name = "skirmish")]
#[command(about = "Run seekers against scripted opponents and print a JSON report")]
struct Args {
    /// Random seed for deterministic opponents
    #[arg(long)]
    seed: Option<u64>,

    /// Number of seekers
    #[arg(long, default_value_t = 3)]
    seekers: usize,

    /// Number of scripted opponents
    #[arg(long, default_value_t = 2)]
    opponents: usize,

    /// Maximum simulation ticks
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Simulated milliseconds per tick
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,

    /// Decision mode: simple or extended (overrides the config file)
    #[arg(long)]
    mode: Option<String>,

    /// Engine config (TOML)
    #[arg(long)]
    config: Option<String>,

    /// Personality name (loaded from data/personalities/)
    #[arg(long, default_value = "default")]
    personality: String,

    /// Ask a remote LLM for advice (needs SEEKER_INFERENCE_KEY)
    #[arg(long)]
    remote: bool,
}

/// JSON output structure
#[derive(Serialize)]
struct SkirmishReport {
    outcome: String,
    ticks: u64,
    seed: u64,
    seekers_alive: usize,
    opponents_alive: usize,
    decisions_applied: usize,
    discarded: usize,
    failed: usize,
    voice_lines: usize,
    hits_by_seekers: usize,
    hits_by_opponents: usize,
    biases: GlobalBiases,
    brains: Vec<BrainSummary>,
}

/// Scripted opponent swing timing
const OPPONENT_SWING_MS: Millis = 900;
const OPPONENT_HIT_CHANCE: f64 = 0.6;
const SEEKER_SWING_MS: Millis = 700;
const SEEKER_HIT_CHANCE: f64 = 0.55;
const OPPONENT_SPEED: f32 = 4.0;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("arc_seeker=info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = start(args).await {
        eprintln!("skirmish failed: {}", e);
        std::process::exit(1);
    }
}

async fn start(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SeekerConfig::load(path)?,
        None => SeekerConfig::default(),
    };
    match args.mode.as_deref() {
        Some("simple") => config.decision.mode = DecisionMode::Simple,
        Some("extended") => config.decision.mode = DecisionMode::Extended,
        Some(other) => warn!(mode = other, "unknown mode, keeping configured one"),
        None => {}
    }

    let personality = load_personality(&args.personality).unwrap_or_else(|e| {
        warn!(personality = args.personality.as_str(), error = %e, "using default personality");
        Personality::default()
    });

    let report = if args.remote {
        run(&args, config, personality, RemoteInference::from_env()?).await
    } else {
        run(&args, config, personality, HeuristicInference).await
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

struct Combatant {
    id: AgentId,
    next_swing: Millis,
}

async fn run<C: InferenceChannel>(
    args: &Args,
    config: SeekerConfig,
    personality: Personality,
    channel: C,
) -> SkirmishReport {
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);

    let collective = CollectiveMemory::shared(config.collective.clone());
    let feed = ExperienceFeed::new(&config, collective.clone());
    let mut orchestrator = Orchestrator::new(
        config,
        tokio::runtime::Handle::current(),
        channel,
        collective.clone(),
        personality,
    );

    let mut arena = Arena::new();
    // A low wall between the lines gives something to hide behind
    arena.build_wall(IVec3::new(10, 0, -3), IVec3::new(10, 0, 3), 2);

    let mut seekers = Vec::new();
    for i in 0..args.seekers {
        let mut state = AgentState::new(
            AgentId::new(),
            AgentKind::Seeker,
            FactionId(0),
            Vec3::new(2.5, 0.0, i as f32 * 3.0 - 3.0),
        );
        state.held = ItemCategory::Sword;
        let id = arena.spawn(state);
        orchestrator.on_spawn(id);
        seekers.push(Combatant { id, next_swing: 0 });
    }

    let mut opponents = Vec::new();
    for i in 0..args.opponents {
        let mut state = AgentState::new(
            AgentId::new(),
            AgentKind::Player,
            FactionId(1),
            Vec3::new(20.5, 0.0, i as f32 * 3.0 - 2.0),
        );
        state.held = ItemCategory::Axe;
        state.facing = Vec3::NEG_X;
        opponents.push(Combatant { id: arena.spawn(state), next_swing: 0 });
    }

    let mut report = SkirmishReport {
        outcome: "draw".into(),
        ticks: 0,
        seed,
        seekers_alive: 0,
        opponents_alive: 0,
        decisions_applied: 0,
        discarded: 0,
        failed: 0,
        voice_lines: 0,
        hits_by_seekers: 0,
        hits_by_opponents: 0,
        biases: GlobalBiases::default(),
        brains: Vec::new(),
    };

    let dt = args.tick_ms as f32 / 1000.0;
    let settle = Duration::from_millis(args.tick_ms);
    let seeker_ids: Vec<AgentId> = seekers.iter().map(|s| s.id).collect();

    for tick in 0..args.ticks {
        let now = tick * args.tick_ms;
        report.ticks = tick + 1;

        let living: Vec<AgentId> = seeker_ids
            .iter()
            .copied()
            .filter(|id| arena.agent(*id).is_some_and(|a| a.alive))
            .collect();
        orchestrator.tick_all(&arena, &living, now);

        // Give fast channels a chance to answer within the tick
        while orchestrator.in_flight_count() > 0 {
            match tokio::time::timeout(settle, orchestrator.pump_next(&mut arena, now)).await {
                Ok(Some(outcome)) => tally(&mut report, &outcome),
                _ => break,
            }
        }
        for outcome in orchestrator.pump(&mut arena, now) {
            tally(&mut report, &outcome);
        }

        chase(&mut arena, &opponents, &seeker_ids);
        arena.step(dt);

        let mut events = Vec::new();
        for opponent in opponents.iter_mut() {
            if let Some(event) = swing(&arena, opponent, &seeker_ids, now, OPPONENT_SWING_MS, OPPONENT_HIT_CHANCE, &mut rng) {
                events.push(event);
            }
        }
        let opponent_ids: Vec<AgentId> = opponents.iter().map(|o| o.id).collect();
        for seeker in seekers.iter_mut() {
            if let Some(event) = swing(&arena, seeker, &opponent_ids, now, SEEKER_SWING_MS, SEEKER_HIT_CHANCE, &mut rng) {
                events.push(event);
            }
        }

        for event in events {
            feed.observe(orchestrator.brains_mut(), &arena, &event);
            let Some(victim) = event.victim.filter(|_| event.landed) else {
                continue;
            };
            if event.attacker_kind == AgentKind::Seeker {
                report.hits_by_seekers += 1;
            } else {
                report.hits_by_opponents += 1;
            }
            if arena.damage(victim, event.damage) {
                info!(victim = %victim, killer = %event.attacker, "agent killed");
                feed.on_death(orchestrator.brains_mut(), &arena, victim, Some(event.attacker));
                if event.victim_kind == Some(AgentKind::Seeker) {
                    orchestrator.on_despawn(victim);
                }
            }
        }

        report.voice_lines += arena
            .take_commands()
            .iter()
            .filter(|c| matches!(c, WorldCommand::Broadcast { .. }))
            .count();
        collective.tick();

        let seekers_alive = count_alive(&arena, &seeker_ids);
        let opponents_alive = count_alive(&arena, &opponent_ids);
        if seekers_alive == 0 || opponents_alive == 0 {
            report.outcome = if opponents_alive == 0 { "seekers_win" } else { "opponents_win" }.into();
            break;
        }
    }

    report.seekers_alive = count_alive(&arena, &seeker_ids);
    report.opponents_alive = count_alive(&arena, &opponents.iter().map(|o| o.id).collect::<Vec<_>>());
    report.biases = collective.biases();
    report.brains = orchestrator.summaries();
    report
}

fn tally(report: &mut SkirmishReport, outcome: &ApplyOutcome) {
    match outcome {
        ApplyOutcome::Applied { .. } => report.decisions_applied += 1,
        ApplyOutcome::Discarded(_) => report.discarded += 1,
        ApplyOutcome::Failed => report.failed += 1,
    }
}

fn count_alive(arena: &Arena, ids: &[AgentId]) -> usize {
    ids.iter()
        .filter(|id| arena.agent(**id).is_some_and(|a| a.alive))
        .count()
}

fn nearest_living(arena: &Arena, from: Vec3, targets: &[AgentId]) -> Option<AgentState> {
    targets
        .iter()
        .filter_map(|id| arena.agent(*id))
        .filter(|a| a.alive)
        .min_by(|a, b| a.position.distance(from).total_cmp(&b.position.distance(from)))
}

/// Opponents walk straight at the nearest seeker
fn chase(arena: &mut Arena, opponents: &[Combatant], seekers: &[AgentId]) {
    for opponent in opponents {
        let Some(me) = arena.agent(opponent.id).filter(|a| a.alive) else {
            continue;
        };
        let Some(target) = nearest_living(arena, me.position, seekers) else {
            continue;
        };
        let offset = target.position - me.position;
        let velocity = if offset.length() > me.held.reach() * 0.8 {
            Vec3::new(offset.x, 0.0, offset.z).normalize_or_zero() * OPPONENT_SPEED
        } else {
            Vec3::ZERO
        };
        arena.drive(opponent.id, velocity);
        if let Some(state) = arena.agent_mut(opponent.id) {
            let facing = Vec3::new(offset.x, 0.0, offset.z).normalize_or_zero();
            if facing != Vec3::ZERO {
                state.facing = facing;
            }
        }
    }
}

/// Swing at the nearest hostile in reach once the swing timer allows
fn swing(
    arena: &Arena,
    attacker: &mut Combatant,
    targets: &[AgentId],
    now: Millis,
    period: Millis,
    hit_chance: f64,
    rng: &mut StdRng,
) -> Option<CombatEvent> {
    if now < attacker.next_swing {
        return None;
    }
    let me = arena.agent(attacker.id).filter(|a| a.alive)?;
    let target = nearest_living(arena, me.position, targets)?;
    if me.position.distance(target.position) > me.held.reach() {
        return None;
    }

    attacker.next_swing = now + period;
    if rng.gen_bool(hit_chance) {
        let damage = rng.gen_range(3.0..6.0);
        Some(CombatEvent::hit(me.id, me.kind, target.id, target.kind, damage, now))
    } else {
        Some(CombatEvent::miss(me.id, me.kind, now))
    }
}
