//! Decision types and engine
//!
//! A [`Decision`] is the engine's output for one think cycle: an action,
//! a movement directive, and optional skill and voice line. Action and
//! movement tokens travel as SCREAMING_SNAKE_CASE strings so remote
//! inference can produce them; unknown tokens are preserved rather than
//! rejected.

pub mod engine;
pub mod prediction;

pub use engine::{Assessment, DecisionEngine};
pub use prediction::{attack_imminence, predict_motion, ImminenceFactors, MotionPrediction};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::brain::TacticalAction;
use crate::core::types::AgentId;
use crate::world::SkillId;

fn normalize_token(token: &str) -> String {
    token.trim().to_ascii_uppercase().replace(['-', ' '], "_")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    Idle,
    Observe,
    Attack,
    Ambush,
    Evade,
    HoldDistance,
    Retreat,
    Defend,
    CounterAttack,
    Finisher,
    Unrecognized(String),
}

impl ActionType {
    pub fn parse(token: &str) -> Self {
        match normalize_token(token).as_str() {
            "IDLE" => ActionType::Idle,
            "OBSERVE" => ActionType::Observe,
            "ATTACK" => ActionType::Attack,
            "AMBUSH" => ActionType::Ambush,
            "EVADE" => ActionType::Evade,
            "HOLD_DISTANCE" => ActionType::HoldDistance,
            "RETREAT" => ActionType::Retreat,
            "DEFEND" => ActionType::Defend,
            "COUNTER_ATTACK" => ActionType::CounterAttack,
            "FINISHER" => ActionType::Finisher,
            _ => ActionType::Unrecognized(token.to_string()),
        }
    }

    pub fn token(&self) -> &str {
        match self {
            ActionType::Idle => "IDLE",
            ActionType::Observe => "OBSERVE",
            ActionType::Attack => "ATTACK",
            ActionType::Ambush => "AMBUSH",
            ActionType::Evade => "EVADE",
            ActionType::HoldDistance => "HOLD_DISTANCE",
            ActionType::Retreat => "RETREAT",
            ActionType::Defend => "DEFEND",
            ActionType::CounterAttack => "COUNTER_ATTACK",
            ActionType::Finisher => "FINISHER",
            ActionType::Unrecognized(token) => token,
        }
    }

    /// Known and not a no-op
    pub fn is_actionable(&self) -> bool {
        !matches!(self, ActionType::Idle | ActionType::Unrecognized(_))
    }
}

impl From<String> for ActionType {
    fn from(token: String) -> Self {
        ActionType::parse(&token)
    }
}

impl From<ActionType> for String {
    fn from(action: ActionType) -> Self {
        action.token().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MovementStrategy {
    None,
    PathToCover,
    PathToEnemy,
    Stop,
    BackStep,
    SideStep,
    Burst,
    Orbital,
    DiagonalRetreat,
    Scatter,
    ZigZag,
    Unrecognized(String),
}

impl MovementStrategy {
    pub fn parse(token: &str) -> Self {
        match normalize_token(token).as_str() {
            "NONE" => MovementStrategy::None,
            "PATH_TO_COVER" => MovementStrategy::PathToCover,
            "PATH_TO_ENEMY" => MovementStrategy::PathToEnemy,
            "STOP" => MovementStrategy::Stop,
            "BACK_STEP" => MovementStrategy::BackStep,
            "SIDE_STEP" => MovementStrategy::SideStep,
            "BURST" => MovementStrategy::Burst,
            "ORBITAL" => MovementStrategy::Orbital,
            "DIAGONAL_RETREAT" => MovementStrategy::DiagonalRetreat,
            "SCATTER" => MovementStrategy::Scatter,
            "ZIGZAG" | "ZIG_ZAG" => MovementStrategy::ZigZag,
            _ => MovementStrategy::Unrecognized(token.to_string()),
        }
    }

    pub fn token(&self) -> &str {
        match self {
            MovementStrategy::None => "NONE",
            MovementStrategy::PathToCover => "PATH_TO_COVER",
            MovementStrategy::PathToEnemy => "PATH_TO_ENEMY",
            MovementStrategy::Stop => "STOP",
            MovementStrategy::BackStep => "BACK_STEP",
            MovementStrategy::SideStep => "SIDE_STEP",
            MovementStrategy::Burst => "BURST",
            MovementStrategy::Orbital => "ORBITAL",
            MovementStrategy::DiagonalRetreat => "DIAGONAL_RETREAT",
            MovementStrategy::Scatter => "SCATTER",
            MovementStrategy::ZigZag => "ZIGZAG",
            MovementStrategy::Unrecognized(token) => token,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, MovementStrategy::Unrecognized(_))
    }
}

impl From<String> for MovementStrategy {
    fn from(token: String) -> Self {
        MovementStrategy::parse(&token)
    }
}

impl From<MovementStrategy> for String {
    fn from(strategy: MovementStrategy) -> Self {
        strategy.token().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementDirective {
    pub strategy: MovementStrategy,
    #[serde(default)]
    pub destination: Option<Vec3>,
    #[serde(default)]
    pub target: Option<AgentId>,
}

impl MovementDirective {
    pub fn none() -> Self {
        Self {
            strategy: MovementStrategy::None,
            destination: None,
            target: None,
        }
    }

    pub fn toward(strategy: MovementStrategy, target: AgentId) -> Self {
        Self {
            strategy,
            destination: None,
            target: Some(target),
        }
    }

    pub fn to_point(strategy: MovementStrategy, destination: Vec3) -> Self {
        Self {
            strategy,
            destination: Some(destination),
            target: None,
        }
    }
}

impl Default for MovementDirective {
    fn default() -> Self {
        Self::none()
    }
}

/// Which stage produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionSource {
    /// Nothing to react to
    Idle,
    Reflex,
    Priority,
    /// Advantage or pattern branch
    Branch,
    Learned,
    /// Adopted from an inference channel
    #[default]
    Advice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: ActionType,
    #[serde(default)]
    pub movement: MovementDirective,
    #[serde(default)]
    pub skill: Option<SkillId>,
    #[serde(default)]
    pub voice_line: Option<String>,
    #[serde(default)]
    pub tactic: Option<TacticalAction>,
    #[serde(default)]
    pub source: DecisionSource,
    #[serde(default)]
    pub reasoning: String,
}

impl Decision {
    pub fn new(action: ActionType, movement: MovementDirective) -> Self {
        Self {
            action,
            movement,
            skill: None,
            voice_line: None,
            tactic: None,
            source: DecisionSource::Advice,
            reasoning: String::new(),
        }
    }

    pub fn idle() -> Self {
        Self::new(ActionType::Idle, MovementDirective::none()).with_source(DecisionSource::Idle)
    }

    pub fn with_skill(mut self, skill: Option<SkillId>) -> Self {
        self.skill = skill;
        self
    }

    pub fn with_voice(mut self, line: impl Into<String>) -> Self {
        self.voice_line = Some(line.into());
        self
    }

    pub fn with_tactic(mut self, tactic: TacticalAction) -> Self {
        self.tactic = Some(tactic);
        self
    }

    pub fn with_source(mut self, source: DecisionSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_tokens() {
        assert_eq!(ActionType::parse("counter-attack"), ActionType::CounterAttack);
        assert_eq!(ActionType::parse(" hold_distance "), ActionType::HoldDistance);
        assert_eq!(ActionType::HoldDistance.token(), "HOLD_DISTANCE");
        assert_eq!(
            ActionType::parse("DANCE"),
            ActionType::Unrecognized("DANCE".to_string())
        );
    }

    #[test]
    fn test_strategy_tokens() {
        assert_eq!(MovementStrategy::parse("zig-zag"), MovementStrategy::ZigZag);
        assert_eq!(MovementStrategy::parse("PATH_TO_COVER"), MovementStrategy::PathToCover);
        assert!(!MovementStrategy::parse("TELEPORT").is_recognized());
    }

    #[test]
    fn test_decision_from_minimal_json() {
        let decision: Decision = serde_json::from_str(
            r#"{"action": "RETREAT", "movement": {"strategy": "DIAGONAL_RETREAT"}, "voice_line": "Fall back!"}"#,
        )
        .unwrap();
        assert_eq!(decision.action, ActionType::Retreat);
        assert_eq!(decision.movement.strategy, MovementStrategy::DiagonalRetreat);
        assert_eq!(decision.voice_line.as_deref(), Some("Fall back!"));
        assert_eq!(decision.source, DecisionSource::Advice);
    }

    #[test]
    fn test_unknown_tokens_survive_deserialization() {
        let decision: Decision =
            serde_json::from_str(r#"{"action": "MOONWALK", "movement": {"strategy": "TELEPORT"}}"#).unwrap();
        assert!(!decision.action.is_actionable());
        assert_eq!(
            decision.movement.strategy,
            MovementStrategy::Unrecognized("TELEPORT".to_string())
        );
    }

    #[test]
    fn test_decision_serializes_tokens() {
        let json = serde_json::to_string(&Decision::idle()).unwrap();
        assert!(json.contains("\"IDLE\""));
        assert!(json.contains("\"NONE\""));
    }
}
