pub mod tools;

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::{AgentConfig, Config};
use crate::providers::{
    ModelProvider, ProviderMessage, ProviderRequest, ProviderResponse, ToolCall, ToolDefinition,
};
use crate::search::VectorSearchEngine;

use tools::{SearchRoomsTool, ToolContext, ToolRegistry};

/// Reply recorded when the reasoning capability cannot be reached.
pub const APOLOGY_REPLY: &str =
    "I'm sorry, I couldn't process that request right now. Please try again in a moment.";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("reasoning capability unavailable: {0}")]
    ReasoningUnavailable(String),
}

// ============================================================================
// Conversation State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AgentState {
    #[default]
    Idle,
    AwaitingToolResult,
}

/// The dialogue of one session. Owned by the session and passed `&mut`
/// into every agent turn.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: String,
    turns: Vec<Turn>,
    state: AgentState,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            turns: Vec::new(),
            state: AgentState::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Forget every turn. The conversation stays usable.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.state = AgentState::Idle;
    }
}

// ============================================================================
// Decisions
// ============================================================================

/// What the reasoning capability asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentDecision {
    DirectAnswer(String),
    ToolInvocation {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
}

impl AgentDecision {
    /// One invocation per requested tool call, or a single direct answer
    /// when the response calls no tools.
    pub fn from_response(response: &ProviderResponse) -> Vec<Self> {
        let calls = response.tool_calls();
        if calls.is_empty() {
            return vec![Self::DirectAnswer(response.content_text())];
        }
        calls
            .into_iter()
            .map(|c| Self::ToolInvocation {
                id: c.id,
                name: c.name,
                arguments: c.arguments,
            })
            .collect()
    }
}

// ============================================================================
// Agent
// ============================================================================

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub temperature: f64,
    pub system_prompt: String,
    pub max_tool_rounds: u32,
    pub max_tokens: Option<u64>,
}

impl From<&AgentConfig> for AgentSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            system_prompt: config.system_prompt().to_string(),
            max_tool_rounds: config.max_tool_rounds,
            max_tokens: config.max_tokens,
        }
    }
}

/// The hotel assistant: routes each user turn through the model and the
/// room search tool. Holds no per-session state and can serve many
/// conversations at once.
pub struct HotelAgent {
    provider: Arc<dyn ModelProvider>,
    tools: ToolRegistry,
    settings: AgentSettings,
}

impl HotelAgent {
    pub fn new(provider: Arc<dyn ModelProvider>, tools: ToolRegistry, settings: AgentSettings) -> Self {
        Self {
            provider,
            tools,
            settings,
        }
    }

    /// Build the agent described by `config`, with `search_rooms` backed by `engine`.
    pub fn from_config(config: &Config, engine: VectorSearchEngine) -> Result<Self> {
        let provider = crate::providers::resolve_provider(config, &config.agent.model)?;
        let tools = ToolRegistry::new().with_tool(Arc::new(SearchRoomsTool::new(engine)));
        info!(
            provider = provider.name(),
            model = %config.agent.model,
            "hotel agent ready"
        );
        Ok(Self::new(provider, tools, AgentSettings::from(&config.agent)))
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Handle one user turn and return the reply.
    ///
    /// Both the user text and the reply are appended to `conversation`. A
    /// reasoning failure yields [`APOLOGY_REPLY`] instead of an error.
    pub async fn respond(&self, conversation: &mut Conversation, user_text: &str) -> String {
        conversation.push(Turn::user(user_text));

        let reply = match self.run_turn(conversation).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(conversation = %conversation.id(), error = %e, "agent turn failed");
                APOLOGY_REPLY.to_string()
            }
        };

        conversation.state = AgentState::Idle;
        conversation.push(Turn::assistant(reply.clone()));
        reply
    }

    async fn run_turn(&self, conversation: &mut Conversation) -> Result<String, AgentError> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(ProviderMessage::system(&self.settings.system_prompt));
        messages.extend(conversation.turns().iter().map(|t| match t.role {
            Role::User => ProviderMessage::user(&t.text),
            Role::Assistant => ProviderMessage::assistant(&t.text),
        }));

        let context = ToolContext {
            session_key: conversation.id().to_string(),
        };
        let definitions = self.tools.definitions();

        for round in 0..self.settings.max_tool_rounds {
            let response = self.call_model(messages.clone(), definitions.clone()).await?;
            let preamble = response.content_text();

            let mut calls = Vec::new();
            for decision in AgentDecision::from_response(&response) {
                match decision {
                    AgentDecision::DirectAnswer(text) => return non_empty_reply(text),
                    AgentDecision::ToolInvocation {
                        id,
                        name,
                        arguments,
                    } => calls.push(ToolCall {
                        id,
                        name,
                        arguments,
                    }),
                }
            }

            conversation.state = AgentState::AwaitingToolResult;
            debug!(round, calls = calls.len(), "model requested tools");

            messages.push(ProviderMessage::tool_request(preamble, calls.clone()));
            for call in &calls {
                let result = self.tools.execute(call, &context).await;
                messages.push(ProviderMessage::tool_result(call, result.render()));
            }
            conversation.state = AgentState::Idle;
        }

        debug!(
            rounds = self.settings.max_tool_rounds,
            "tool rounds exhausted, asking for a final answer"
        );
        let response = self.call_model(messages, Vec::new()).await?;
        non_empty_reply(response.content_text())
    }

    async fn call_model(
        &self,
        messages: Vec<ProviderMessage>,
        tools: Vec<ToolDefinition>,
    ) -> Result<ProviderResponse, AgentError> {
        let request = ProviderRequest {
            model: self.settings.model.clone(),
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: Some(self.settings.temperature),
            tools,
        };
        self.provider
            .chat(request)
            .await
            .map_err(|e| AgentError::ReasoningUnavailable(format!("{e:#}")))
    }
}

fn non_empty_reply(text: String) -> Result<String, AgentError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AgentError::ReasoningUnavailable(
            "model returned an empty reply".to_string(),
        ));
    }
    Ok(text.to_string())
}
