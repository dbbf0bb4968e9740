use super::*;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// OpenAI chat completions, or any server speaking the same protocol.
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

// ============================================================================
// Conversion
// ============================================================================

fn convert_message(m: ProviderMessage) -> OpenAiMessage {
    let role = match m.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    };

    let tool_calls = if m.tool_calls.is_empty() {
        None
    } else {
        Some(
            m.tool_calls
                .iter()
                .map(|tc| {
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.arguments.to_string(),
                        }
                    })
                })
                .collect(),
        )
    };

    // Assistant messages that only carry tool calls have null content.
    let content = if m.content.is_empty() && tool_calls.is_some() {
        serde_json::Value::Null
    } else {
        serde_json::Value::String(m.content)
    };

    OpenAiMessage {
        role: role.to_string(),
        content,
        tool_call_id: m.tool_call_id,
        tool_calls,
    }
}

fn convert_tool(tool: ToolDefinition) -> serde_json::Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn parse_tool_call(tc: &serde_json::Value) -> Option<ContentBlock> {
    let id = tc.get("id").and_then(|v| v.as_str())?;
    let function = tc.get("function")?;
    let name = function
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let arguments = function
        .get("arguments")
        .and_then(|v| v.as_str())
        .unwrap_or("{}");
    // Unparseable arguments are passed through as a string so the tool can
    // report them.
    let input = serde_json::from_str(arguments)
        .unwrap_or_else(|_| serde_json::Value::String(arguments.to_string()));
    Some(ContentBlock::ToolUse {
        id: id.to_string(),
        name,
        input,
    })
}

// ============================================================================
// ModelProvider Implementation
// ============================================================================

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn chat(&self, request: ProviderRequest) -> Result<ProviderResponse> {
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(request.tools.into_iter().map(convert_tool).collect())
        };

        let body = OpenAiRequest {
            model: request.model,
            messages: request.messages.into_iter().map(convert_message).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({}): {}", status, text);
        }

        let api_resp: OpenAiResponse = resp.json().await?;

        let choice = api_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No choices in OpenAI response"))?;

        let mut content = Vec::new();

        if let Some(text) = choice.message.content.as_str() {
            if !text.is_empty() {
                content.push(ContentBlock::Text(text.to_string()));
            }
        }

        if let Some(tool_calls) = &choice.message.tool_calls {
            content.extend(tool_calls.iter().filter_map(parse_tool_call));
        }

        let usage = api_resp.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });

        debug!(
            blocks = content.len(),
            finish_reason = ?choice.finish_reason,
            "openai chat completion"
        );

        Ok(ProviderResponse {
            content,
            stop_reason: choice.finish_reason,
            usage,
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_request_has_null_content_and_string_arguments() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "search_rooms".into(),
            arguments: json!({"query": "sea view"}),
        };
        let msg = convert_message(ProviderMessage::tool_request("", vec![call]));
        let value = serde_json::to_value(&msg).unwrap();

        assert!(value["content"].is_null());
        assert_eq!(value["tool_calls"][0]["type"], "function");
        assert_eq!(
            value["tool_calls"][0]["function"]["arguments"],
            r#"{"query":"sea view"}"#
        );
    }

    #[test]
    fn malformed_arguments_are_kept_as_string() {
        let block = parse_tool_call(&json!({
            "id": "call_9",
            "function": {"name": "search_rooms", "arguments": "{not json"}
        }))
        .unwrap();
        match block {
            ContentBlock::ToolUse { input, .. } => assert_eq!(input, json!("{not json")),
            other => panic!("unexpected block {other:?}"),
        }
    }
}
