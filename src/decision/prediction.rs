//! Opponent motion prediction and attack imminence

use glam::Vec3;
use serde::Serialize;

use crate::core::types::horizontal;

/// Imminence weights: reach, closing speed, aim
const REACH_WEIGHT: f32 = 0.4;
const CLOSING_WEIGHT: f32 = 0.3;
const AIM_WEIGHT: f32 = 0.3;
/// Reach factor lost between point-blank and the edge of reach
const REACH_DEPTH_SPAN: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotionPrediction {
    pub position: Vec3,
    pub velocity: Vec3,
    /// 1.0 for steady motion, toward 0.0 for jittery motion
    pub stability: f32,
}

/// Extrapolate an opponent `horizon_secs` ahead.
///
/// Acceleration feeds a damping factor `1 / (1 + k * |a|)` that shortens
/// the look-ahead for erratic movers.
pub fn predict_motion(
    position: Vec3,
    velocity: Vec3,
    acceleration: Option<Vec3>,
    horizon_secs: f32,
    damping: f32,
) -> MotionPrediction {
    let acceleration = acceleration.unwrap_or(Vec3::ZERO);
    let stability = 1.0 / (1.0 + damping.max(0.0) * acceleration.length());
    let t = horizon_secs.max(0.0) * stability;
    let predicted_velocity = velocity + acceleration * t;
    MotionPrediction {
        position: position + velocity * t + 0.5 * acceleration * t * t,
        velocity: predicted_velocity,
        stability,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ImminenceFactors {
    pub reach: f32,
    pub closing: f32,
    pub aim: f32,
    /// Weighted blend in [0, 1]
    pub score: f32,
}

/// How close an attacker at `attacker` is to landing a blow on `target`
pub fn attack_imminence(
    attacker: Vec3,
    velocity: Vec3,
    facing: Vec3,
    target: Vec3,
    reach: f32,
    closing_fast: f32,
) -> ImminenceFactors {
    let offset = horizontal(target - attacker);
    let distance = offset.length();
    let direction = offset.normalize_or_zero();

    // Graded by depth inside reach, then falling to zero at twice the reach
    let reach = reach.max(f32::EPSILON);
    let edge = 1.0 - REACH_DEPTH_SPAN;
    let reach_factor = if distance <= reach {
        1.0 - REACH_DEPTH_SPAN * distance / reach
    } else {
        (edge * (1.0 - (distance - reach) / reach)).clamp(0.0, edge)
    };

    let closing_speed = horizontal(velocity).dot(direction);
    let closing = (closing_speed / closing_fast.max(f32::EPSILON)).clamp(0.0, 1.0);

    let aim = horizontal(facing).normalize_or_zero().dot(direction).max(0.0);

    ImminenceFactors {
        reach: reach_factor,
        closing,
        aim,
        score: (REACH_WEIGHT * reach_factor + CLOSING_WEIGHT * closing + AIM_WEIGHT * aim).clamp(0.0, 1.0),
    }
}
