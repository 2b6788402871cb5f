use crate::{
    fallback,
    types::{
        GameAction,
        Item,
        MatchState,
    },
    validator::{
        self,
        RejectReason,
    },
};
use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error)]
#[error("reasoning provider error: {0}")]
pub struct ProviderError(pub String);

/// External reasoning provider. Implementations must be time-bounded: a hung
/// call would otherwise stall the watch loop.
pub trait Reasoner {
    fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> impl Future<Output = Result<String, ProviderError>>;
}

/// Why a decision went to the deterministic fallback. Providers failing is
/// routine, not an operator-facing error, but each reason stays inspectable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackReason {
    #[error("no reasoning provider configured")]
    NoProvider,
    #[error("provider failed: {0}")]
    Provider(String),
    #[error("provider output unparsable: {0}")]
    Malformed(String),
    #[error("provider sequence rejected: {0}")]
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionPath {
    Reasoned,
    Fallback(FallbackReason),
}

impl std::fmt::Display for DecisionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionPath::Reasoned => f.write_str("reasoned"),
            DecisionPath::Fallback(reason) => write!(f, "fallback ({reason})"),
        }
    }
}

/// The full decision chain: provider → parse → validate, with the
/// deterministic engine taking over at the first failure. Never fails.
pub async fn decide_actions<R: Reasoner>(
    reasoner: Option<&R>,
    state: &MatchState,
    actor_index: usize,
) -> (Vec<GameAction>, DecisionPath) {
    match propose(reasoner, state, actor_index).await {
        Ok(actions) => (actions, DecisionPath::Reasoned),
        Err(reason) => {
            let actions = fallback::decide(state, actor_index);
            (actions, DecisionPath::Fallback(reason))
        }
    }
}

async fn propose<R: Reasoner>(
    reasoner: Option<&R>,
    state: &MatchState,
    actor_index: usize,
) -> Result<Vec<GameAction>, FallbackReason> {
    let reasoner = reasoner.ok_or(FallbackReason::NoProvider)?;
    let user = render_state(state, actor_index);
    let text = reasoner
        .complete(SYSTEM_PROMPT, &user)
        .await
        .map_err(|err| FallbackReason::Provider(err.0))?;
    let play = parse_play(&text).map_err(FallbackReason::Malformed)?;
    if !play.thinking.is_empty() {
        debug!(thinking = %play.thinking, "provider reasoning");
    }
    validator::validate(&play.actions, state, actor_index).map_err(FallbackReason::Rejected)
}

const SYSTEM_PROMPT: &str = "\
You are playing a turn-based elimination game. A chamber holds live and blank \
shells. On your turn you may use items from your slots, then you must shoot \
exactly once: an alive opponent (live shell deals damage) or yourself (a blank \
gives you an extra turn). Items: magnifier reveals the next shell to you, \
medkit restores hp, handsaw doubles your next live shot, beer ejects the next \
shell, handcuffs make an opponent skip a turn.\n\
Respond with a single JSON object and nothing else:\n\
{\"thinking\": \"<short reasoning>\", \"actions\": [{\"type\": \"use_item\", \
\"index\": 0}, {\"type\": \"shoot_opponent\", \"target\": \"0x..\"}]}\n\
The actions array must be zero or more item uses followed by exactly one \
shot, where a shot is {\"type\": \"shoot_opponent\", \"target\": \"<address>\"} \
or {\"type\": \"shoot_self\"}.";

fn render_item(item: &Item) -> &'static str {
    match item {
        Item::Nothing => "empty",
        Item::Magnifier => "magnifier",
        Item::Medkit => "medkit",
        Item::Handsaw => "handsaw",
        Item::Beer => "beer",
        Item::Handcuffs => "handcuffs",
    }
}

/// Compact textual snapshot for the provider.
pub fn render_state(state: &MatchState, actor_index: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Match {} round {}. Shells remaining: {} ({} live, {} blank, p(live)={:.2}).\n",
        state.match_id,
        state.round,
        state.shells_remaining,
        state.live_remaining,
        state.blank_remaining,
        state.live_probability(),
    ));
    if state.shell_known {
        let value = if state.known_shell_is_live {
            "LIVE"
        } else {
            "BLANK"
        };
        out.push_str(&format!("You know the next shell is {value}.\n"));
    }
    if state.saw_active {
        out.push_str("Your next live shot deals double damage.\n");
    }
    for (i, player) in state.players.iter().enumerate() {
        let role = if i == actor_index { "you" } else { "opponent" };
        let status = if player.alive {
            format!("{} hp", player.hp)
        } else {
            "eliminated".to_string()
        };
        let items = player
            .items
            .iter()
            .enumerate()
            .map(|(slot, item)| format!("{slot}:{}", render_item(item)))
            .join(", ");
        out.push_str(&format!(
            "{} ({role}): {status}; items [{items}]\n",
            player.address
        ));
    }
    out.push_str("It is your turn. Decide your actions.");
    out
}

#[derive(Debug, Deserialize)]
struct ProposedPlay {
    #[serde(default)]
    thinking: String,
    actions: Vec<GameAction>,
}

/// Tolerates the usual model wrapping (code fences, prose around the JSON);
/// anything that still fails to parse is a malformed output, handled the
/// same as a provider error.
fn parse_play(text: &str) -> Result<ProposedPlay, String> {
    let start = text.find('{').ok_or("no JSON object in output")?;
    let end = text.rfind('}').ok_or("no JSON object in output")?;
    if end < start {
        return Err("no JSON object in output".to_string());
    }
    serde_json::from_str(&text[start..=end]).map_err(|err| err.to_string())
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// OpenAI-compatible chat-completions client. The request timeout doubles as
/// the provider time bound.
#[derive(Clone)]
pub struct LlmReasoner {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmReasoner {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ProviderError(err.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

impl Reasoner for LlmReasoner {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
        };
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| ProviderError(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError(format!(
                "provider responded with {status}: {body}"
            )));
        }
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| ProviderError(err.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError("provider returned no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::{
        test_helpers::{
            FakeReasoner,
            match_state,
        },
        types::Address,
    };

    #[tokio::test]
    async fn decide_actions__uses_provider_output_when_valid() {
        let state = match_state()
            .player("0xaa", 80, vec![Item::Handsaw])
            .player("0xbb", 40, vec![])
            .shells(2, 1)
            .build();
        let reasoner = FakeReasoner::new();
        reasoner.script(Ok(r#"{"thinking": "finish them", "actions": [
            {"type": "use_item", "index": 0},
            {"type": "shoot_opponent", "target": "0xbb"}
        ]}"#
            .to_string()));

        let (actions, path) = decide_actions(Some(&reasoner), &state, 0).await;

        assert_eq!(DecisionPath::Reasoned, path);
        assert_eq!(
            vec![
                GameAction::UseItem { index: 0 },
                GameAction::ShootOpponent {
                    target: Address::from("0xbb")
                }
            ],
            actions
        );
    }

    #[tokio::test]
    async fn decide_actions__accepts_fenced_json() {
        let state = match_state()
            .player("0xaa", 80, vec![])
            .player("0xbb", 40, vec![])
            .build();
        let reasoner = FakeReasoner::new();
        reasoner.script(Ok(
            "```json\n{\"actions\": [{\"type\": \"shoot_self\"}]}\n```".to_string(),
        ));

        let (actions, path) = decide_actions(Some(&reasoner), &state, 0).await;

        assert_eq!(DecisionPath::Reasoned, path);
        assert_eq!(vec![GameAction::ShootSelf], actions);
    }

    #[tokio::test]
    async fn decide_actions__no_provider_goes_straight_to_fallback() {
        let state = match_state()
            .player("0xaa", 80, vec![])
            .player("0xbb", 40, vec![])
            .shells(2, 1)
            .build();

        let (actions, path) =
            decide_actions(None::<&FakeReasoner>, &state, 0).await;

        assert_eq!(
            DecisionPath::Fallback(FallbackReason::NoProvider),
            path
        );
        assert_eq!(fallback::decide(&state, 0), actions);
    }

    #[tokio::test]
    async fn decide_actions__provider_error_routes_to_fallback() {
        let state = match_state()
            .player("0xaa", 80, vec![])
            .player("0xbb", 40, vec![])
            .shells(2, 1)
            .build();
        let reasoner = FakeReasoner::new();
        reasoner.script(Err(ProviderError("timed out".to_string())));

        let (actions, path) = decide_actions(Some(&reasoner), &state, 0).await;

        assert_eq!(
            DecisionPath::Fallback(FallbackReason::Provider("timed out".to_string())),
            path
        );
        assert_eq!(fallback::decide(&state, 0), actions);
    }

    #[tokio::test]
    async fn decide_actions__malformed_output_routes_to_fallback() {
        let state = match_state()
            .player("0xaa", 80, vec![])
            .player("0xbb", 40, vec![])
            .build();
        let reasoner = FakeReasoner::new();
        reasoner.script(Ok("I shoot the other player!".to_string()));

        let (_, path) = decide_actions(Some(&reasoner), &state, 0).await;

        assert!(matches!(
            path,
            DecisionPath::Fallback(FallbackReason::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn decide_actions__rejected_sequence_routes_to_fallback() {
        let state = match_state()
            .player("0xaa", 80, vec![])
            .player("0xbb", 40, vec![])
            .shells(2, 1)
            .build();
        let reasoner = FakeReasoner::new();
        // 0xcc is not in the match
        reasoner.script(Ok(
            r#"{"actions": [{"type": "shoot_opponent", "target": "0xcc"}]}"#.to_string(),
        ));

        let (actions, path) = decide_actions(Some(&reasoner), &state, 0).await;

        assert!(matches!(
            path,
            DecisionPath::Fallback(FallbackReason::Rejected(
                RejectReason::InvalidTarget(_)
            ))
        ));
        assert_eq!(fallback::decide(&state, 0), actions);
    }

    #[test]
    fn render_state__mentions_private_shell_knowledge() {
        let state = match_state()
            .player("0xaa", 80, vec![Item::Medkit])
            .player("0xbb", 40, vec![])
            .shells(1, 2)
            .known_shell(true)
            .build();

        let rendered = render_state(&state, 0);

        assert!(rendered.contains("next shell is LIVE"));
        assert!(rendered.contains("0:medkit"));
        assert!(rendered.contains("p(live)=0.33"));
    }
}
