//! Short-term combat memory

use std::collections::VecDeque;

use ahash::AHashMap;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::types::{AgentId, Millis};

/// Hits kept per direction
const HIT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    pub at: Millis,
    pub damage: f32,
    pub opponent: Option<AgentId>,
}

/// Last two velocity observations of one opponent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityTrack {
    previous: Option<(Millis, Vec3)>,
    latest: Option<(Millis, Vec3)>,
}

impl VelocityTrack {
    pub fn observe(&mut self, now: Millis, velocity: Vec3) {
        match self.latest {
            Some((at, _)) if now <= at => {}
            _ => {
                self.previous = self.latest;
                self.latest = Some((now, velocity));
            }
        }
    }

    /// Finite-difference acceleration (blocks/second²)
    pub fn acceleration(&self) -> Option<Vec3> {
        let ((t0, v0), (t1, v1)) = (self.previous?, self.latest?);
        let dt = (t1 - t0) as f32 / 1000.0;
        if dt <= 0.0 {
            return None;
        }
        Some((v1 - v0) / dt)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShortTermMemory {
    dealt: VecDeque<HitRecord>,
    taken: VecDeque<HitRecord>,
    tracks: AHashMap<AgentId, VelocityTrack>,
    pub last_voice_ms: Option<Millis>,
}

fn push_bounded(queue: &mut VecDeque<HitRecord>, record: HitRecord) {
    if queue.len() == HIT_CAPACITY {
        queue.pop_front();
    }
    queue.push_back(record);
}

impl ShortTermMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dealt(&mut self, at: Millis, damage: f32, opponent: Option<AgentId>) {
        push_bounded(&mut self.dealt, HitRecord { at, damage, opponent });
    }

    pub fn record_taken(&mut self, at: Millis, damage: f32, opponent: Option<AgentId>) {
        push_bounded(&mut self.taken, HitRecord { at, damage, opponent });
    }

    pub fn hits_dealt_since(&self, since: Millis) -> usize {
        self.dealt.iter().filter(|h| h.at >= since).count()
    }

    pub fn hits_taken_since(&self, since: Millis) -> usize {
        self.taken.iter().filter(|h| h.at >= since).count()
    }

    pub fn damage_taken_since(&self, since: Millis) -> f32 {
        self.taken.iter().filter(|h| h.at >= since).map(|h| h.damage).sum()
    }

    /// Drop hits older than `before`
    pub fn prune(&mut self, before: Millis) {
        self.dealt.retain(|h| h.at >= before);
        self.taken.retain(|h| h.at >= before);
    }

    pub fn observe_velocity(&mut self, opponent: AgentId, now: Millis, velocity: Vec3) {
        self.tracks.entry(opponent).or_default().observe(now, velocity);
    }

    pub fn track(&self, opponent: AgentId) -> Option<&VelocityTrack> {
        self.tracks.get(&opponent)
    }

    pub fn forget(&mut self, opponent: AgentId) {
        self.tracks.remove(&opponent);
    }

    pub fn voice_ready(&self, now: Millis, cooldown_ms: u64) -> bool {
        self.last_voice_ms
            .map_or(true, |last| now.saturating_sub(last) >= cooldown_ms)
    }

    pub fn note_voice(&mut self, now: Millis) {
        self.last_voice_ms = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_counts() {
        let mut memory = ShortTermMemory::new();
        memory.record_dealt(100, 3.0, None);
        memory.record_dealt(5_000, 3.0, None);
        memory.record_taken(6_000, 2.5, None);

        assert_eq!(memory.hits_dealt_since(1_000), 1);
        assert_eq!(memory.hits_taken_since(1_000), 1);
        assert_eq!(memory.damage_taken_since(0), 2.5);

        memory.prune(5_500);
        assert_eq!(memory.hits_dealt_since(0), 0);
    }

    #[test]
    fn test_capacity_bounded() {
        let mut memory = ShortTermMemory::new();
        for i in 0..200 {
            memory.record_taken(i, 1.0, None);
        }
        assert_eq!(memory.hits_taken_since(0), HIT_CAPACITY);
    }

    #[test]
    fn test_acceleration_from_two_samples() {
        let mut track = VelocityTrack::default();
        assert!(track.acceleration().is_none());
        track.observe(0, Vec3::ZERO);
        track.observe(500, Vec3::new(2.0, 0.0, 0.0));
        let accel = track.acceleration().unwrap();
        assert!((accel.x - 4.0).abs() < 1e-5);

        // Same timestamp is ignored
        track.observe(500, Vec3::new(50.0, 0.0, 0.0));
        assert!((track.acceleration().unwrap().x - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_voice_cooldown() {
        let mut memory = ShortTermMemory::new();
        assert!(memory.voice_ready(0, 4_000));
        memory.note_voice(1_000);
        assert!(!memory.voice_ready(3_000, 4_000));
        assert!(memory.voice_ready(5_000, 4_000));
    }
}
