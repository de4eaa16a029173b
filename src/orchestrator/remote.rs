//! Remote inference over an LLM chat API
//!
//! The snapshot is condensed into a [`Brief`] and sent to an Anthropic or
//! OpenAI-compatible endpoint. The model answers with one decision JSON;
//! anything it invents outside the known token set survives as
//! `Unrecognized` and is ignored downstream.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::inference::InferenceChannel;
use crate::core::error::{Result, SeekerError};
use crate::core::types::{horizontal, AgentId, ItemCategory};
use crate::decision::Decision;
use crate::perception::{HealthBucket, PerceptionSnapshot};

/// Responses are one small JSON object
const MAX_TOKENS: u32 = 512;
const DEFAULT_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Opponents listed in a brief, nearest first
const BRIEF_OPPONENTS: usize = 4;
/// Speed toward the agent (blocks/s) that counts as closing in
const CLOSING_SPEED: f32 = 0.5;

/// Wire dialect of the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    Anthropic,
    /// OpenAI and every compatible server
    OpenAI,
}

impl ApiFormat {
    pub fn for_url(url: &str) -> Self {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            ApiFormat::OpenAI
        }
    }

    fn authorize(self, builder: RequestBuilder, key: &str) -> RequestBuilder {
        match self {
            ApiFormat::Anthropic => builder
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            ApiFormat::OpenAI => builder.bearer_auth(key),
        }
    }

    /// Anthropic takes the system prompt as a field, OpenAI as a message
    fn request<'a>(self, model: &'a str, system: &'a str, user: &'a str) -> ChatRequest<'a> {
        let user = Message { role: "user", content: user };
        let (system, messages) = match self {
            ApiFormat::Anthropic => (Some(system), vec![user]),
            ApiFormat::OpenAI => (
                None,
                vec![
                    Message {
                        role: "system",
                        content: system,
                    },
                    user,
                ],
            ),
        };
        ChatRequest {
            model,
            max_tokens: MAX_TOKENS,
            system,
            messages,
        }
    }
}

/// What the model is told about one opponent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpponentBrief {
    pub id: AgentId,
    /// Blocks, rounded to one decimal
    pub distance: f32,
    pub health: HealthBucket,
    pub holding: ItemCategory,
    pub visible: bool,
    pub closing: bool,
}

/// Condensed situation report sent as the user prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Brief {
    pub health: HealthBucket,
    pub holding: ItemCategory,
    pub outnumbered: bool,
    pub allies_alive: usize,
    pub allies_fallen: usize,
    pub cover_distance: Option<f32>,
    pub opponents: Vec<OpponentBrief>,
}

impl Brief {
    pub fn from_snapshot(snapshot: &PerceptionSnapshot) -> Self {
        let me = &snapshot.me;
        let allies_alive = snapshot.living_allies().count();
        let opponents = snapshot
            .opponents
            .iter()
            .take(BRIEF_OPPONENTS)
            .map(|o| {
                let toward_me = horizontal(me.position - o.position).normalize_or_zero();
                OpponentBrief {
                    id: o.id,
                    distance: round_tenth(o.distance),
                    health: o.health,
                    holding: o.held,
                    visible: o.line_of_sight,
                    closing: horizontal(o.velocity).dot(toward_me) > CLOSING_SPEED,
                }
            })
            .collect();

        Self {
            health: HealthBucket::from_ratio(me.health_ratio),
            holding: me.held,
            outnumbered: snapshot.is_outnumbered(),
            allies_alive,
            allies_fallen: snapshot.allies.len() - allies_alive,
            cover_distance: snapshot.cover.map(|c| round_tenth(c.distance)),
            opponents,
        }
    }
}

fn round_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

pub struct RemoteInference {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    format: ApiFormat,
}

impl RemoteInference {
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            format: ApiFormat::for_url(&api_url),
            api_key,
            api_url,
            model,
        }
    }

    /// Required: SEEKER_INFERENCE_KEY.
    /// Optional: SEEKER_INFERENCE_URL, SEEKER_INFERENCE_MODEL.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("SEEKER_INFERENCE_KEY")
            .map_err(|_| SeekerError::Inference("SEEKER_INFERENCE_KEY not set".into()))?;
        let api_url = std::env::var("SEEKER_INFERENCE_URL").unwrap_or_else(|_| DEFAULT_URL.into());
        let model = std::env::var("SEEKER_INFERENCE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        Ok(Self::new(api_key, api_url, model))
    }

    pub fn api_format(&self) -> ApiFormat {
        self.format
    }

    /// One chat round trip; returns the model's text
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = self.format.request(&self.model, system, user);
        let response = self
            .format
            .authorize(self.client.post(&self.api_url), &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SeekerError::Inference(format!("API error {}: {}", status, detail)));
        }

        let reply: ChatResponse = response.json().await.map_err(transport)?;
        reply
            .into_text()
            .ok_or_else(|| SeekerError::Inference("Empty response".into()))
    }
}

fn transport(e: reqwest::Error) -> SeekerError {
    SeekerError::Inference(e.to_string())
}

#[async_trait]
impl InferenceChannel for RemoteInference {
    async fn request(&self, snapshot: PerceptionSnapshot) -> Result<Decision> {
        let brief = Brief::from_snapshot(&snapshot);
        let user_prompt = format!(
            "SITUATION:\n{}\n\nRespond with the decision JSON:",
            serde_json::to_string(&brief)?
        );
        let response = self.complete(DECISION_SYSTEM_PROMPT, &user_prompt).await?;
        debug!(agent = %snapshot.agent, chars = response.len(), "remote advice received");
        parse_decision(&response)
    }
}

/// Parse a model response into a decision
pub fn parse_decision(response: &str) -> Result<Decision> {
    let json = extract_json(response)?;
    serde_json::from_str(json).map_err(|e| {
        SeekerError::Inference(format!("Failed to parse decision: {} - Response: {}", e, response))
    })
}

/// The outermost `{...}` of a response that may carry prose or fences
fn extract_json(response: &str) -> Result<&str> {
    match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&response[start..=end]),
        (None, _) => Err(SeekerError::Inference("No JSON found in response".into())),
        _ => Err(SeekerError::Inference("Malformed JSON in response".into())),
    }
}

const DECISION_SYSTEM_PROMPT: &str = r#"You advise a combat agent in a voxel world.
You receive a short situation report as JSON and answer with ONE decision.
Opponents are listed nearest first; "closing" means they are moving in.

ACTIONS:
IDLE, OBSERVE, ATTACK, AMBUSH, EVADE, HOLD_DISTANCE, RETREAT, DEFEND, COUNTER_ATTACK, FINISHER

MOVEMENT STRATEGIES:
NONE, PATH_TO_COVER, PATH_TO_ENEMY, STOP, BACK_STEP, SIDE_STEP, BURST, ORBITAL, DIAGONAL_RETREAT, SCATTER, ZIGZAG

OUTPUT FORMAT (JSON only, no explanation):
{
  "action": "ACTION",
  "movement": {"strategy": "STRATEGY", "target": "opponent id or null", "destination": [x, y, z] or null},
  "voice_line": "short battle cry or null",
  "reasoning": "one short sentence"
}

Examples:
outnumbered, health LOW -> {"action": "RETREAT", "movement": {"strategy": "SCATTER", "target": null, "destination": null}, "voice_line": "Fall back!", "reasoning": "outnumbered"}
one CRITICAL opponent at 2.5 -> {"action": "ATTACK", "movement": {"strategy": "BURST", "target": null, "destination": null}, "voice_line": null, "reasoning": "press the advantage"}
"#;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Either dialect's reply; the other side's field stays empty
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    choices: Vec<Choice>,
}

impl ChatResponse {
    fn into_text(self) -> Option<String> {
        let choices = self.choices;
        self.content
            .into_iter()
            .find_map(|block| block.text)
            .or_else(|| choices.into_iter().next().map(|c| c.message.content))
    }
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::Traits;
    use crate::core::types::Stance;
    use crate::decision::{ActionType, MovementStrategy};
    use crate::perception::{AllyHealth, AllyView, OpponentView, SelfView};
    use glam::Vec3;

    fn snapshot() -> PerceptionSnapshot {
        let opponent = |x: f32, vx: f32| OpponentView {
            id: AgentId::new(),
            position: Vec3::new(x, 0.0, 0.0),
            velocity: Vec3::new(vx, 0.0, 0.0),
            facing: Vec3::NEG_X,
            distance: x,
            health: HealthBucket::Full,
            held: ItemCategory::Axe,
            line_of_sight: true,
        };
        PerceptionSnapshot {
            agent: AgentId::new(),
            taken_at: 0,
            me: SelfView {
                position: Vec3::ZERO,
                velocity: Vec3::ZERO,
                facing: Vec3::X,
                health_ratio: 0.3,
                stance: Stance::Standing,
                held: ItemCategory::Sword,
            },
            opponents: vec![
                opponent(2.04, -3.0),
                opponent(4.0, 2.0),
                opponent(6.0, 0.0),
                opponent(8.0, 0.0),
                opponent(9.0, 0.0),
            ],
            allies: vec![AllyView {
                id: AgentId::new(),
                distance: 3.0,
                health: AllyHealth::Dead,
                health_ratio: 0.0,
            }],
            cover: None,
            traits: Traits::default(),
        }
    }

    #[test]
    fn test_format_from_url() {
        let channel = RemoteInference::new("k".into(), "https://api.example.com".into(), "m".into());
        assert_eq!(channel.api_format(), ApiFormat::OpenAI);
        assert_eq!(ApiFormat::for_url(DEFAULT_URL), ApiFormat::Anthropic);
    }

    #[test]
    fn test_from_env_missing_key() {
        let result = RemoteInference::from_env();
        if std::env::var("SEEKER_INFERENCE_KEY").is_err() {
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_request_shape_per_format() {
        let anthropic = serde_json::to_value(ApiFormat::Anthropic.request("m", "sys", "hi")).unwrap();
        assert_eq!(anthropic["system"], "sys");
        assert_eq!(anthropic["messages"].as_array().unwrap().len(), 1);

        let openai = serde_json::to_value(ApiFormat::OpenAI.request("m", "sys", "hi")).unwrap();
        assert!(openai.get("system").is_none());
        assert_eq!(openai["messages"][0]["role"], "system");
        assert_eq!(openai["max_tokens"], MAX_TOKENS);
    }

    #[test]
    fn test_reply_text_from_either_dialect() {
        let anthropic: ChatResponse = serde_json::from_str(r#"{"content": [{"type": "text", "text": "a"}]}"#).unwrap();
        assert_eq!(anthropic.into_text().as_deref(), Some("a"));

        let openai: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"role": "assistant", "content": "b"}}]}"#).unwrap();
        assert_eq!(openai.into_text().as_deref(), Some("b"));

        let empty: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.into_text().is_none());
    }

    #[test]
    fn test_brief_condenses_snapshot() {
        let brief = Brief::from_snapshot(&snapshot());
        assert_eq!(brief.health, HealthBucket::Low);
        assert!(brief.outnumbered);
        assert_eq!(brief.allies_alive, 0);
        assert_eq!(brief.allies_fallen, 1);
        assert_eq!(brief.opponents.len(), BRIEF_OPPONENTS);
        assert_eq!(brief.opponents[0].distance, 2.0);
        assert!(brief.opponents[0].closing);
        assert!(!brief.opponents[1].closing);
    }

    #[test]
    fn test_parse_decision_with_surrounding_text() {
        let response = r#"Sure:
{"action": "RETREAT", "movement": {"strategy": "SCATTER", "target": null, "destination": null}, "voice_line": "Fall back!", "reasoning": "outnumbered"}
Good luck."#;
        let decision = parse_decision(response).unwrap();
        assert_eq!(decision.action, ActionType::Retreat);
        assert_eq!(decision.movement.strategy, MovementStrategy::Scatter);
        assert_eq!(decision.reasoning, "outnumbered");
    }

    #[test]
    fn test_parse_decision_keeps_unknown_tokens() {
        let decision = parse_decision(r#"{"action": "DANCE", "movement": {"strategy": "TELEPORT"}}"#).unwrap();
        assert_eq!(decision.action, ActionType::Unrecognized("DANCE".into()));
        assert!(!decision.movement.strategy.is_recognized());
    }

    #[test]
    fn test_no_json_is_error() {
        assert!(matches!(
            parse_decision("I cannot help with that"),
            Err(SeekerError::Inference(_))
        ));
        assert!(parse_decision("} backwards {").is_err());
    }
}
