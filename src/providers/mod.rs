mod gemini;
mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, GEMINI_BASE_URL, OPENAI_BASE_URL};

// ============================================================================
// Provider Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub role: MessageRole,
    pub content: String,
    /// Tool calls made by an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool messages, the id of the call being answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For tool messages, the name of the tool that produced the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ProviderMessage {
    fn plain(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::Assistant, content)
    }

    /// An assistant message that requests tool calls.
    pub fn tool_request(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::plain(MessageRole::Assistant, content)
        }
    }

    /// The result of a tool call, sent back to the model.
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            ..Self::plain(MessageRole::Tool, content)
        }
    }
}

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// A request to a model provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub model: String,
    pub messages: Vec<ProviderMessage>,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f64>,
    /// Tools offered for this call. Empty disables tool use.
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// A response from a model provider.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: TokenUsage,
}

impl ProviderResponse {
    /// A text-only response.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text(text.into())],
            stop_reason: Some("stop".to_string()),
            usage: TokenUsage::default(),
        }
    }

    pub fn content_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool calls contained in the response, in order.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// A content block in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContentBlock {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

// ============================================================================
// Provider Trait
// ============================================================================

#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn chat(&self, request: ProviderRequest) -> Result<ProviderResponse>;
    fn name(&self) -> &str;
}

// ============================================================================
// Provider Resolution
// ============================================================================

pub fn resolve_provider(config: &Config, model: &str) -> Result<Arc<dyn ModelProvider>> {
    let provider_name = detect_provider(config, model)?;
    let provider_config = config.models.providers.get(provider_name);

    match provider_name {
        "openai" => {
            let api_key = provider_config
                .and_then(|p| p.api_key.clone())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .ok_or_else(|| anyhow::anyhow!("No OpenAI API key configured"))?;

            let base_url = provider_config
                .map(|p| p.base_url.clone())
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string());

            Ok(Arc::new(OpenAiProvider::new(api_key, base_url)))
        }
        "google" => {
            let api_key = provider_config
                .and_then(|p| p.api_key.clone())
                .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
                .ok_or_else(|| anyhow::anyhow!("No Google API key configured"))?;

            let base_url = provider_config
                .map(|p| p.base_url.clone())
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string());

            Ok(Arc::new(GeminiProvider::new(api_key, base_url)))
        }
        other => anyhow::bail!("Unsupported provider '{}' for model {}", other, model),
    }
}

fn detect_provider(config: &Config, model: &str) -> Result<&'static str> {
    let lower = model.to_lowercase();

    if lower.starts_with("gemini") {
        return Ok("google");
    }

    if lower.starts_with("gpt")
        || lower.starts_with("o1")
        || lower.starts_with("o3")
        || lower.starts_with("o4")
    {
        return Ok("openai");
    }

    // Anything else goes to an explicitly configured OpenAI-compatible endpoint.
    if config.models.providers.contains_key("openai") {
        return Ok("openai");
    }

    anyhow::bail!("No provider found for model: {}", model)
}
