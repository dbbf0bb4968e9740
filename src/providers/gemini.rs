use super::*;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }
}

// ============================================================================
// Gemini API Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<ToolDefinition>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

// ============================================================================
// Helper: Convert ProviderMessages to Gemini format
// ============================================================================

fn text_part(text: String) -> GeminiPart {
    GeminiPart {
        text: Some(text),
        ..GeminiPart::default()
    }
}

fn is_function_response(content: &GeminiContent) -> bool {
    content.role == "user"
        && !content.parts.is_empty()
        && content.parts.iter().all(|p| p.function_response.is_some())
}

/// Split out system messages and map the rest onto Gemini contents.
fn convert_messages(messages: Vec<ProviderMessage>) -> (Option<GeminiContent>, Vec<GeminiContent>) {
    let mut system = Vec::new();
    let mut contents = Vec::new();

    for m in messages {
        match m.role {
            MessageRole::System => system.push(text_part(m.content)),
            MessageRole::User => contents.push(GeminiContent {
                role: "user".to_string(),
                parts: vec![text_part(m.content)],
            }),
            MessageRole::Assistant => {
                let mut parts = Vec::new();
                if !m.content.is_empty() {
                    parts.push(text_part(m.content));
                }
                for call in m.tool_calls {
                    parts.push(GeminiPart {
                        function_call: Some(GeminiFunctionCall {
                            name: call.name,
                            args: call.arguments,
                        }),
                        ..GeminiPart::default()
                    });
                }
                contents.push(GeminiContent {
                    role: "model".to_string(),
                    parts,
                });
            }
            MessageRole::Tool => {
                let part = GeminiPart {
                    function_response: Some(GeminiFunctionResponse {
                        name: m.name.unwrap_or_default(),
                        response: json!({ "content": m.content }),
                    }),
                    ..GeminiPart::default()
                };
                // Responses to one multi-call turn must share a single content.
                match contents.last_mut() {
                    Some(last) if is_function_response(last) => last.parts.push(part),
                    _ => contents.push(GeminiContent {
                        role: "user".to_string(),
                        parts: vec![part],
                    }),
                }
            }
        }
    }

    let system = (!system.is_empty()).then(|| GeminiContent {
        role: "system".to_string(),
        parts: system,
    });
    (system, contents)
}

// ============================================================================
// ModelProvider Implementation
// ============================================================================

#[async_trait]
impl ModelProvider for GeminiProvider {
    async fn chat(&self, request: ProviderRequest) -> Result<ProviderResponse> {
        let (system_instruction, contents) = convert_messages(request.messages);

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(vec![GeminiTool {
                function_declarations: request.tools,
            }])
        };

        let body = GeminiRequest {
            contents,
            system_instruction,
            tools,
            generation_config: Some(GeminiGenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            }),
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({}): {}", status, text);
        }

        let api_resp: GeminiResponse = resp.json().await?;

        let mut content = Vec::new();
        let mut stop_reason = None;

        if let Some(candidate) = api_resp.candidates.and_then(|c| c.into_iter().next()) {
            stop_reason = candidate.finish_reason;
            if let Some(c) = candidate.content {
                for part in c.parts {
                    if let Some(text) = part.text {
                        content.push(ContentBlock::Text(text));
                    }
                    // Gemini does not id its function calls.
                    if let Some(call) = part.function_call {
                        content.push(ContentBlock::ToolUse {
                            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                            name: call.name,
                            input: call.args,
                        });
                    }
                }
            }
        }

        let usage = api_resp
            .usage_metadata
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            });

        debug!(blocks = content.len(), finish_reason = ?stop_reason, "gemini generate content");

        Ok(ProviderResponse {
            content,
            stop_reason,
            usage,
        })
    }

    fn name(&self) -> &str {
        "google"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_become_system_instruction() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "search_rooms".into(),
            arguments: json!({"query": "spa"}),
        };
        let (system, contents) = convert_messages(vec![
            ProviderMessage::system("Be brief."),
            ProviderMessage::user("Spa hotel?"),
            ProviderMessage::tool_request("", vec![call.clone()]),
            ProviderMessage::tool_result(&call, "1. Spa Suite"),
        ]);

        let system = system.unwrap();
        assert_eq!(system.parts[0].text.as_deref(), Some("Be brief."));
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1].role, "model");
        assert_eq!(
            contents[1].parts[0].function_call.as_ref().unwrap().name,
            "search_rooms"
        );
        let response = contents[2].parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.response["content"], "1. Spa Suite");
    }

    #[test]
    fn parallel_tool_results_share_one_content() {
        let calls: Vec<ToolCall> = ["Kyiv", "Odesa"]
            .iter()
            .enumerate()
            .map(|(i, city)| ToolCall {
                id: format!("call_{i}"),
                name: "search_rooms".into(),
                arguments: json!({"query": "spa", "city": city}),
            })
            .collect();
        let (_, contents) = convert_messages(vec![
            ProviderMessage::user("Spa in Kyiv or Odesa?"),
            ProviderMessage::tool_request("", calls.clone()),
            ProviderMessage::tool_result(&calls[0], "1. Skyline Spa Suite"),
            ProviderMessage::tool_result(&calls[1], "No matching rooms found."),
            ProviderMessage::user("Thanks"),
        ]);

        let shape: Vec<(&str, usize)> = contents
            .iter()
            .map(|c| (c.role.as_str(), c.parts.len()))
            .collect();
        assert_eq!(
            shape,
            vec![("user", 1), ("model", 2), ("user", 2), ("user", 1)]
        );
        assert!(contents[3].parts[0].function_response.is_none());
    }
}
