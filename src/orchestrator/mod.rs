//! Orchestrator: one asynchronous think cycle per agent
//!
//! `tick` snapshots an agent and sends the snapshot to an inference
//! channel on the tokio runtime. At most one request per agent is in
//! flight; a request older than the configured timeout is abandoned and
//! replaced. Completions come back over a channel and are applied on the
//! caller's thread by `pump`, which revalidates the agent before touching
//! the world.

pub mod inference;
pub mod remote;

pub use inference::{advise, HeuristicInference, InferenceChannel};
pub use remote::{parse_decision, ApiFormat, Brief, OpponentBrief, RemoteInference};

use std::sync::Arc;
use std::time::Duration;

use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::actuator::{Actuation, Actuator};
use crate::brain::{Brain, BrainSummary, Personality, Traits};
use crate::collective::CollectiveMemory;
use crate::core::config::SeekerConfig;
use crate::core::error::{Result, SeekerError};
use crate::core::types::{AgentId, Millis};
use crate::decision::{Decision, DecisionEngine};
use crate::perception::{self, PerceptionSnapshot};
use crate::world::{WorldCommands, WorldView};

pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TickOutcome {
    /// A new request was sent
    Issued(RequestId),
    /// A younger request is still pending
    InFlight,
    /// Agent missing or dead; nothing sent
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiscardReason {
    /// Superseded or already released
    Stale,
    /// Died or despawned while the request was pending
    AgentGone,
    NoBrain,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ApplyOutcome {
    Applied { decision: Decision, actuation: Actuation },
    Discarded(DiscardReason),
    /// The channel errored or timed out; the lock is released
    Failed,
}

struct InFlight {
    request: RequestId,
    issued_at: Instant,
    task: JoinHandle<()>,
}

struct Completion {
    request: RequestId,
    agent: AgentId,
    snapshot: PerceptionSnapshot,
    result: Result<Decision>,
}

pub struct Orchestrator<C: InferenceChannel> {
    config: SeekerConfig,
    runtime: Handle,
    channel: Arc<C>,
    engine: DecisionEngine,
    actuator: Actuator,
    collective: Arc<CollectiveMemory>,
    personality: Personality,
    brains: AHashMap<AgentId, Brain>,
    in_flight: AHashMap<AgentId, InFlight>,
    sender: UnboundedSender<Completion>,
    receiver: UnboundedReceiver<Completion>,
    next_request: RequestId,
}

impl<C: InferenceChannel> Orchestrator<C> {
    pub fn new(
        config: SeekerConfig,
        runtime: Handle,
        channel: C,
        collective: Arc<CollectiveMemory>,
        personality: Personality,
    ) -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            engine: DecisionEngine::new(config.clone()),
            actuator: Actuator::new(config.actuator.clone()),
            config,
            runtime,
            channel: Arc::new(channel),
            collective,
            personality,
            brains: AHashMap::new(),
            in_flight: AHashMap::new(),
            sender,
            receiver,
            next_request: 1,
        }
    }

    pub fn collective(&self) -> &Arc<CollectiveMemory> {
        &self.collective
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn brain(&self, agent: AgentId) -> Option<&Brain> {
        self.brains.get(&agent)
    }

    pub fn brains(&self) -> &AHashMap<AgentId, Brain> {
        &self.brains
    }

    /// Direct access for experience updates
    pub fn brains_mut(&mut self) -> &mut AHashMap<AgentId, Brain> {
        &mut self.brains
    }

    pub fn summaries(&self) -> Vec<BrainSummary> {
        self.brains.values().map(|b| b.summary()).collect()
    }

    /// Create the agent's brain if it has none yet
    pub fn on_spawn(&mut self, agent: AgentId) -> &mut Brain {
        let (personality, config) = (&self.personality, &self.config);
        self.brains
            .entry(agent)
            .or_insert_with(|| Brain::new(agent, personality.traits_for(agent), config))
    }

    /// Forget an agent: drop its brain and cancel any pending request
    pub fn on_despawn(&mut self, agent: AgentId) {
        self.brains.remove(&agent);
        if let Some(pending) = self.in_flight.remove(&agent) {
            pending.task.abort();
            debug!(agent = %agent, request = pending.request, "cancelled request of despawned agent");
        }
    }

    pub fn is_in_flight(&self, agent: AgentId) -> bool {
        self.in_flight.contains_key(&agent)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.orchestrator.request_timeout_ms)
    }

    /// True if a young request still holds the agent's lock. Releases
    /// (and cancels) an expired one.
    fn holds_lock(&mut self, agent: AgentId) -> bool {
        let timeout = self.timeout();
        let Some(pending) = self.in_flight.get(&agent) else {
            return false;
        };
        if pending.issued_at.elapsed() < timeout {
            return true;
        }
        if let Some(expired) = self.in_flight.remove(&agent) {
            expired.task.abort();
            warn!(agent = %agent, request = expired.request, "abandoning expired inference request");
        }
        false
    }

    /// Start one think cycle for `agent`
    pub fn tick<W: WorldView + ?Sized>(&mut self, world: &W, agent: AgentId, now: Millis) -> TickOutcome {
        if self.holds_lock(agent) {
            return TickOutcome::InFlight;
        }
        let traits = self.traits_of(agent);
        match perception::scan(world, agent, traits, now, &self.config.perception) {
            Some(snapshot) => TickOutcome::Issued(self.issue(snapshot)),
            None => TickOutcome::Unavailable,
        }
    }

    /// Tick many agents, scanning in parallel when the batch is large
    pub fn tick_all<W: WorldView + Sync + ?Sized>(
        &mut self,
        world: &W,
        agents: &[AgentId],
        now: Millis,
    ) -> Vec<(AgentId, TickOutcome)> {
        let mut outcomes = Vec::with_capacity(agents.len());
        let mut requests = Vec::with_capacity(agents.len());
        let mut queued = AHashSet::with_capacity(agents.len());
        for agent in agents {
            // A repeated id counts as already in flight
            if self.holds_lock(*agent) || !queued.insert(*agent) {
                outcomes.push((*agent, TickOutcome::InFlight));
            } else {
                requests.push((*agent, self.traits_of(*agent)));
            }
        }

        for (agent, snapshot) in perception::scan_many(world, &requests, now, &self.config.perception) {
            let outcome = match snapshot {
                Some(_) if self.holds_lock(agent) => TickOutcome::InFlight,
                Some(snapshot) => TickOutcome::Issued(self.issue(snapshot)),
                None => TickOutcome::Unavailable,
            };
            outcomes.push((agent, outcome));
        }
        outcomes
    }

    fn traits_of(&self, agent: AgentId) -> Traits {
        self.brains
            .get(&agent)
            .map_or_else(|| self.personality.traits_for(agent), |b| b.traits)
    }

    fn issue(&mut self, snapshot: PerceptionSnapshot) -> RequestId {
        self.on_spawn(snapshot.agent);
        let request = self.next_request;
        self.next_request += 1;
        let agent = snapshot.agent;
        let channel = Arc::clone(&self.channel);
        let sender = self.sender.clone();
        let timeout = self.timeout();

        let task = self.runtime.spawn(async move {
            let result = match tokio::time::timeout(timeout, channel.request(snapshot.clone())).await {
                Ok(result) => result,
                Err(_) => Err(SeekerError::InferenceTimeout(timeout)),
            };
            // Receiver gone means the orchestrator was dropped
            let _ = sender.send(Completion {
                request,
                agent,
                snapshot,
                result,
            });
        });

        let replaced = self.in_flight.insert(
            agent,
            InFlight {
                request,
                issued_at: Instant::now(),
                task,
            },
        );
        if let Some(replaced) = replaced {
            replaced.task.abort();
            warn!(agent = %agent, request = replaced.request, "aborting superseded inference request");
        }
        debug!(agent = %agent, request, "inference request issued");
        request
    }

    /// Apply every completion that has already arrived
    pub fn pump<W: WorldView + WorldCommands + ?Sized>(&mut self, world: &mut W, now: Millis) -> Vec<ApplyOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(completion) = self.receiver.try_recv() {
            outcomes.push(self.complete(world, completion, now));
        }
        outcomes
    }

    /// Wait for the next completion and apply it
    pub async fn pump_next<W: WorldView + WorldCommands + ?Sized>(&mut self, world: &mut W, now: Millis) -> Option<ApplyOutcome> {
        let completion = self.receiver.recv().await?;
        Some(self.complete(world, completion, now))
    }

    fn complete<W: WorldView + WorldCommands + ?Sized>(
        &mut self,
        world: &mut W,
        completion: Completion,
        now: Millis,
    ) -> ApplyOutcome {
        let Completion {
            request,
            agent,
            snapshot,
            result,
        } = completion;

        match self.in_flight.get(&agent) {
            Some(pending) if pending.request == request => {
                self.in_flight.remove(&agent);
            }
            _ => {
                debug!(agent = %agent, request, "discarding stale completion");
                return ApplyOutcome::Discarded(DiscardReason::Stale);
            }
        }

        let advice = match result {
            Ok(advice) => advice,
            Err(SeekerError::InferenceTimeout(after)) => {
                warn!(agent = %agent, request, ?after, "inference timed out");
                return ApplyOutcome::Failed;
            }
            Err(e) => {
                warn!(agent = %agent, request, error = %e, "inference failed");
                return ApplyOutcome::Failed;
            }
        };

        if !world.agent(agent).is_some_and(|a| a.alive) {
            debug!(agent = %agent, request, "agent gone before completion");
            return ApplyOutcome::Discarded(DiscardReason::AgentGone);
        }

        self.conform(agent, &snapshot);

        let Some(brain) = self.brains.get_mut(&agent) else {
            return ApplyOutcome::Discarded(DiscardReason::NoBrain);
        };
        let decision = self
            .engine
            .resolve(&snapshot, brain, &self.collective, Some(&advice));
        let actuation = self.actuator.apply(world, agent, &decision, now);

        debug!(
            agent = %agent,
            request,
            action = decision.action.token(),
            movement = decision.movement.strategy.token(),
            "decision applied"
        );
        ApplyOutcome::Applied { decision, actuation }
    }

    /// Drift reaction speeds toward the healthiest visible ally with a brain
    fn conform(&mut self, agent: AgentId, snapshot: &PerceptionSnapshot) {
        let leader = snapshot
            .living_allies()
            .filter(|ally| self.brains.contains_key(&ally.id))
            .max_by(|a, b| a.health_ratio.total_cmp(&b.health_ratio));
        let Some(leader) = leader else {
            return;
        };
        if leader.health_ratio <= snapshot.me.health_ratio {
            return;
        }
        let Some(profile) = self.brains.get(&leader.id).map(|b| b.neurons.decay_profile()) else {
            return;
        };
        let rate = self.config.neuron.conformity_rate;
        if let Some(brain) = self.brains.get_mut(&agent) {
            brain.conform_to(&profile, rate);
        }
    }
}

impl<C: InferenceChannel> Drop for Orchestrator<C> {
    fn drop(&mut self) {
        for pending in self.in_flight.values() {
            pending.task.abort();
        }
    }
}
