//! HTTP-level tests for the reasoning and embedding providers, run against a
//! wiremock server instead of the real APIs.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hotelchat::config::{EmbeddingConfig, EmbeddingProviderKind};
use hotelchat::embeddings::{vector, EmbeddingError, EmbeddingService};
use hotelchat::providers::{
    ContentBlock, GeminiProvider, ModelProvider, OpenAiProvider, ProviderMessage,
    ProviderRequest, ToolCall, ToolDefinition,
};

fn search_tool() -> ToolDefinition {
    ToolDefinition {
        name: "search_rooms".into(),
        description: "Search rooms".into(),
        parameters: json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        }),
    }
}

fn request(model: &str, messages: Vec<ProviderMessage>) -> ProviderRequest {
    ProviderRequest {
        model: model.into(),
        messages,
        max_tokens: Some(256),
        temperature: Some(0.0),
        tools: vec![search_tool()],
    }
}

// ============================================================================
// OpenAI chat completions
// ============================================================================

#[tokio::test]
async fn openai_parses_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "tools": [{ "type": "function", "function": { "name": "search_rooms" } }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "search_rooms",
                            "arguments": "{\"query\":\"sea view apartment\",\"k\":3}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 42, "completion_tokens": 7 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-test".into(), format!("{}/v1", server.uri()));
    let response = provider
        .chat(request(
            "gpt-4o-mini",
            vec![
                ProviderMessage::system("You are a hotel assistant."),
                ProviderMessage::user("Anything by the sea?"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.stop_reason.as_deref(), Some("tool_calls"));
    assert_eq!(response.usage.input_tokens, Some(42));
    assert_eq!(
        response.tool_calls(),
        vec![ToolCall {
            id: "call_abc".into(),
            name: "search_rooms".into(),
            arguments: json!({"query": "sea view apartment", "k": 3}),
        }]
    );
}

#[tokio::test]
async fn openai_sends_tool_results_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                { "role": "user", "content": "Spa?" },
                { "role": "assistant", "tool_calls": [{ "id": "call_1" }] },
                { "role": "tool", "tool_call_id": "call_1", "content": "No matching rooms found." }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "role": "assistant", "content": "Sorry, nothing matches." },
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let call = ToolCall {
        id: "call_1".into(),
        name: "search_rooms".into(),
        arguments: json!({"query": "spa"}),
    };
    let provider = OpenAiProvider::new("sk-test".into(), format!("{}/v1/", server.uri()));
    let response = provider
        .chat(request(
            "gpt-4o-mini",
            vec![
                ProviderMessage::user("Spa?"),
                ProviderMessage::tool_request("", vec![call.clone()]),
                ProviderMessage::tool_result(&call, "No matching rooms found."),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.content_text(), "Sorry, nothing matches.");
    assert!(response.tool_calls().is_empty());
}

#[tokio::test]
async fn openai_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-test".into(), format!("{}/v1", server.uri()));
    let err = provider
        .chat(request("gpt-4o-mini", vec![ProviderMessage::user("hi")]))
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("429"), "{message}");
    assert!(message.contains("rate limited"), "{message}");
}

// ============================================================================
// Gemini
// ============================================================================

#[tokio::test]
async fn gemini_function_call_gets_an_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "g-test"))
        .and(body_partial_json(json!({
            "systemInstruction": { "parts": [{ "text": "Be helpful." }] },
            "tools": [{ "functionDeclarations": [{ "name": "search_rooms" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{
                        "functionCall": {
                            "name": "search_rooms",
                            "args": { "query": "mountain cabin" }
                        }
                    }]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 3 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiProvider::new("g-test".into(), format!("{}/v1beta", server.uri()));
    let response = provider
        .chat(request(
            "gemini-2.0-flash",
            vec![
                ProviderMessage::system("Be helpful."),
                ProviderMessage::user("A cabin in the mountains?"),
            ],
        ))
        .await
        .unwrap();

    match response.content.as_slice() {
        [ContentBlock::ToolUse { id, name, input }] => {
            assert!(id.starts_with("call_"));
            assert_eq!(name, "search_rooms");
            assert_eq!(input["query"], "mountain cabin");
        }
        other => panic!("unexpected content {other:?}"),
    }
    assert_eq!(response.usage.output_tokens, Some(3));
}

#[tokio::test]
async fn gemini_groups_parallel_function_responses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .and(body_partial_json(json!({
            "contents": [
                { "role": "user" },
                { "role": "model", "parts": [
                    { "functionCall": { "name": "search_rooms" } },
                    { "functionCall": { "name": "search_rooms" } }
                ] },
                { "role": "user", "parts": [
                    { "functionResponse": { "name": "search_rooms", "response": { "content": "1. Skyline Spa Suite (Kyiv)" } } },
                    { "functionResponse": { "name": "search_rooms", "response": { "content": "No matching rooms found." } } }
                ] }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Kyiv has a spa suite." }] },
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let calls: Vec<ToolCall> = ["Kyiv", "Odesa"]
        .iter()
        .enumerate()
        .map(|(i, city)| ToolCall {
            id: format!("call_{i}"),
            name: "search_rooms".into(),
            arguments: json!({ "query": "spa", "city": city }),
        })
        .collect();
    let provider = GeminiProvider::new("g-test".into(), format!("{}/v1beta", server.uri()));
    let response = provider
        .chat(request(
            "gemini-2.0-flash",
            vec![
                ProviderMessage::user("Spa in Kyiv or Odesa?"),
                ProviderMessage::tool_request("", calls.clone()),
                ProviderMessage::tool_result(&calls[0], "1. Skyline Spa Suite (Kyiv)"),
                ProviderMessage::tool_result(&calls[1], "No matching rooms found."),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.content_text(), "Kyiv has a spa suite.");
}

// ============================================================================
// OpenAI embeddings
// ============================================================================

fn openai_embedding_config(server: &MockServer) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: EmbeddingProviderKind::Openai,
        model: "text-embedding-3-small".into(),
        dimensions: 3,
        api_key: Some("sk-embed".into()),
        base_url: Some(format!("{}/v1", server.uri())),
        ..EmbeddingConfig::default()
    }
}

#[tokio::test]
async fn openai_embeddings_are_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer sk-embed"))
        .and(body_partial_json(json!({
            "model": "text-embedding-3-small",
            "dimensions": 3
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "index": 1, "embedding": [0.0, 0.0, 2.0] },
                { "index": 0, "embedding": [3.0, 4.0, 0.0] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = EmbeddingService::from_config(&openai_embedding_config(&server));
    let vectors = service
        .embed_batch(&["sea view".to_string(), "mountain cabin".to_string()])
        .await
        .unwrap();

    assert_eq!(vectors.len(), 2);
    assert!((vectors[0][0] - 0.6).abs() < 1e-6);
    assert!((vectors[0][1] - 0.8).abs() < 1e-6);
    assert_eq!(vectors[1], vec![0.0, 0.0, 1.0]);
    assert!(vectors.iter().all(|v| vector::is_unit_vector(v)));
}

#[tokio::test]
async fn openai_embedding_dimension_is_checked() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [1.0, 0.0] }]
        })))
        .mount(&server)
        .await;

    let service = EmbeddingService::from_config(&openai_embedding_config(&server));
    assert!(matches!(
        service.embed("sea view").await,
        Err(EmbeddingError::DimensionMismatch {
            expected: 3,
            actual: 2
        })
    ));
}

#[tokio::test]
async fn openai_embedding_http_error_is_a_request_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let service = EmbeddingService::from_config(&openai_embedding_config(&server));
    match service.embed("sea view").await {
        Err(EmbeddingError::Request(message)) => assert!(message.contains("500")),
        other => panic!("unexpected result {other:?}"),
    }
}
