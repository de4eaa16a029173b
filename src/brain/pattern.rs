//! Attack pattern statistics
//!
//! Exponentially smoothed timing and spacing of one attacker's swings.

use serde::{Deserialize, Serialize};

use crate::core::types::Millis;

fn smooth(previous: Option<f32>, sample: f32, alpha: f32) -> f32 {
    match previous {
        None => sample,
        Some(p) => p + alpha * (sample - p),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttackPattern {
    /// Smoothed gap between consecutive swings (ms)
    pub avg_interval_ms: Option<f32>,
    /// Smoothed distance at which swings start (blocks)
    pub avg_distance: Option<f32>,
    /// Smoothed alignment of the attacker's facing with its target
    pub avg_facing: f32,
    pub samples: u32,
    pub hits: u32,
    pub misses: u32,
    pub last_attack_ms: Option<Millis>,
}

impl AttackPattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observed swing into the statistics.
    ///
    /// Misses pull the distance estimate with `miss_weight` of the normal
    /// smoothing factor.
    pub fn record(
        &mut self,
        now: Millis,
        distance: f32,
        landed: bool,
        facing_alignment: f32,
        smoothing: f32,
        miss_weight: f32,
    ) {
        if let Some(last) = self.last_attack_ms {
            if now > last {
                let interval = (now - last) as f32;
                self.avg_interval_ms = Some(smooth(self.avg_interval_ms, interval, smoothing));
            }
        }

        let distance_alpha = if landed { smoothing } else { smoothing * miss_weight };
        self.avg_distance = Some(smooth(self.avg_distance, distance.max(0.0), distance_alpha));
        self.avg_facing = if self.samples == 0 {
            facing_alignment
        } else {
            smooth(Some(self.avg_facing), facing_alignment, smoothing)
        };

        self.samples += 1;
        if landed {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        self.last_attack_ms = Some(self.last_attack_ms.map_or(now, |last| last.max(now)));
    }

    pub fn interval_ms(&self) -> Option<f32> {
        self.avg_interval_ms
    }

    pub fn distance(&self) -> Option<f32> {
        self.avg_distance
    }

    pub fn elapsed_since_last(&self, now: Millis) -> Option<Millis> {
        self.last_attack_ms.map(|last| now.saturating_sub(last))
    }

    pub fn hit_ratio(&self) -> f32 {
        if self.samples == 0 {
            return 0.0;
        }
        self.hits as f32 / self.samples as f32
    }

    /// How closely the present moment matches this attacker's habit.
    ///
    /// Product of a timing score (elapsed time vs. usual interval) and a
    /// spacing score (current vs. usual distance). Zero until at least two
    /// swings have been seen.
    pub fn match_score(&self, now: Millis, distance: f32) -> f32 {
        let (Some(interval), Some(usual_distance), Some(elapsed)) = (
            self.avg_interval_ms,
            self.avg_distance,
            self.elapsed_since_last(now),
        ) else {
            return 0.0;
        };
        if interval <= 0.0 {
            return 0.0;
        }

        let timing = 1.0 - ((elapsed as f32 - interval).abs() / interval);
        let spacing = 1.0 - ((distance - usual_distance).abs() / usual_distance.max(1.0));
        timing.clamp(0.0, 1.0) * spacing.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_sets_distance_only() {
        let mut pattern = AttackPattern::new();
        pattern.record(1000, 3.0, true, 1.0, 0.3, 0.5);
        assert_eq!(pattern.interval_ms(), None);
        assert_eq!(pattern.distance(), Some(3.0));
        assert_eq!(pattern.match_score(2000, 3.0), 0.0);
    }

    #[test]
    fn test_regular_attacker_matches_perfectly() {
        let mut pattern = AttackPattern::new();
        pattern.record(0, 3.0, true, 1.0, 0.3, 0.5);
        pattern.record(1000, 3.0, true, 1.0, 0.3, 0.5);

        let score = pattern.match_score(2000, 3.0);
        assert!((score - 1.0).abs() < 1e-4, "score {}", score);
        assert!(pattern.match_score(1500, 3.0) < 0.6);
    }

    #[test]
    fn test_misses_pull_distance_less() {
        let mut hit = AttackPattern::new();
        hit.record(0, 2.0, true, 1.0, 0.5, 0.5);
        hit.record(500, 6.0, true, 1.0, 0.5, 0.5);

        let mut miss = AttackPattern::new();
        miss.record(0, 2.0, true, 1.0, 0.5, 0.5);
        miss.record(500, 6.0, false, 1.0, 0.5, 0.5);

        assert!(miss.distance().unwrap() < hit.distance().unwrap());
        assert_eq!(miss.misses, 1);
        assert!((miss.hit_ratio() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_duplicate_timestamp_does_not_zero_interval() {
        let mut pattern = AttackPattern::new();
        pattern.record(0, 3.0, true, 1.0, 0.3, 0.5);
        pattern.record(800, 3.0, true, 1.0, 0.3, 0.5);
        pattern.record(800, 3.0, true, 1.0, 0.3, 0.5);
        assert_eq!(pattern.interval_ms(), Some(800.0));
    }

    #[test]
    fn test_converges_to_fixed_rhythm() {
        let mut pattern = AttackPattern::new();
        // Noisy start, then a steady rhythm
        pattern.record(0, 6.0, true, 0.2, 0.3, 0.5);
        pattern.record(2500, 1.0, true, 0.2, 0.3, 0.5);
        let mut t = 2500;
        for _ in 0..60 {
            t += 800;
            pattern.record(t, 2.5, true, 1.0, 0.3, 0.5);
        }
        assert!((pattern.interval_ms().unwrap() - 800.0).abs() < 0.01);
        assert!((pattern.distance().unwrap() - 2.5).abs() < 0.01);
    }
}
