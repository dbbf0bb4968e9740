//! Conversation tests: the hotel agent with a real `search_rooms` tool and a
//! scripted reasoning provider standing in for the language model.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use hotelchat::agents::tools::{SearchRoomsTool, ToolRegistry, NO_RESULTS_MARKER, SEARCH_ROOMS_TOOL};
use hotelchat::agents::{AgentSettings, HotelAgent, Role, APOLOGY_REPLY};
use hotelchat::catalog::{Room, RoomStore};
use hotelchat::config::{AgentConfig, EmbeddingConfig, SearchConfig, SimilarityMetric};
use hotelchat::embeddings::EmbeddingService;
use hotelchat::providers::{
    ContentBlock, MessageRole, ModelProvider, ProviderRequest, ProviderResponse, TokenUsage,
};
use hotelchat::search::VectorSearchEngine;
use hotelchat::sessions::SessionStore;

// ============================================================================
// Scripted provider
// ============================================================================

type Script = Box<dyn Fn(&ProviderRequest) -> anyhow::Result<ProviderResponse> + Send + Sync>;

/// A model stand-in: searches on the first user turn, then answers from the
/// tool output it was given. Can be switched offline to simulate outages.
struct FakeModel {
    script: Script,
    offline: Mutex<bool>,
    calls: Mutex<usize>,
}

impl FakeModel {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            offline: Mutex::new(false),
            calls: Mutex::new(0),
        })
    }

    fn set_offline(&self, offline: bool) {
        *self.offline.lock() = offline;
    }
}

#[async_trait::async_trait]
impl ModelProvider for FakeModel {
    async fn chat(&self, request: ProviderRequest) -> anyhow::Result<ProviderResponse> {
        *self.calls.lock() += 1;
        if *self.offline.lock() {
            anyhow::bail!("503 Service Unavailable");
        }
        (self.script)(&request)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

fn search_call(query: &str) -> ProviderResponse {
    ProviderResponse {
        content: vec![ContentBlock::ToolUse {
            id: "call_search".into(),
            name: SEARCH_ROOMS_TOOL.into(),
            input: json!({ "query": query, "k": 2 }),
        }],
        stop_reason: Some("tool_calls".into()),
        usage: TokenUsage::default(),
    }
}

/// Search with the latest user message, then summarize the tool output.
fn search_then_summarize() -> Script {
    Box::new(|request: &ProviderRequest| -> anyhow::Result<ProviderResponse> {
        let last = request.messages.last().expect("request has messages");
        match last.role {
            MessageRole::User => Ok(search_call(&last.content)),
            MessageRole::Tool if last.content.contains(NO_RESULTS_MARKER) => Ok(
                ProviderResponse::text("Sorry, I couldn't find any rooms matching your request."),
            ),
            MessageRole::Tool => {
                let first = last
                    .content
                    .lines()
                    .nth(1)
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                Ok(ProviderResponse::text(format!("My top pick: {first}")))
            }
            _ => Ok(ProviderResponse::text("How can I help?")),
        }
    })
}

fn catalog() -> RoomStore {
    let embedder = EmbeddingService::from_config(&EmbeddingConfig::hashing(256));
    RoomStore::open_in_memory(embedder, SimilarityMetric::Cosine).unwrap()
}

fn agent(provider: Arc<FakeModel>, store: RoomStore) -> Arc<HotelAgent> {
    let engine = VectorSearchEngine::new(store, &SearchConfig::default());
    let tools = ToolRegistry::new().with_tool(Arc::new(SearchRoomsTool::new(engine)));
    Arc::new(HotelAgent::new(
        provider,
        tools,
        AgentSettings::from(&AgentConfig::default()),
    ))
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn empty_catalog_reply_acknowledges_no_matches() {
    let model = FakeModel::new(search_then_summarize());
    let sessions = SessionStore::new(agent(model.clone(), catalog()));

    let reply = sessions
        .chat("guest", "Find family apartments with kitchen in Dnipro")
        .await;

    assert!(reply.contains("couldn't find any rooms"));
    assert_eq!(*model.calls.lock(), 2);

    let history = sessions.get_session("guest").unwrap().history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].text, reply);
}

#[tokio::test]
async fn luxury_request_surfaces_spa_suite() {
    let store = catalog();
    let rooms = [
        Room::new("A", "Old Town Hostel", "Kyiv", "budget hostel Kyiv", 30.0),
        Room::new("B", "Skyline Spa Suite", "Kyiv", "luxury hotel spa Kyiv", 280.0),
        Room::new("C", "Beach Cabin", "Odesa", "beach cabin Odesa", 90.0),
    ];
    for room in &rooms {
        store.upsert(room, &room.description).await.unwrap();
    }

    let model = FakeModel::new(search_then_summarize());
    let sessions = SessionStore::new(agent(model, store));

    let reply = sessions.chat("guest", "luxury hotel with spa").await;
    assert!(
        reply.starts_with("My top pick: 1. Skyline Spa Suite (Kyiv)"),
        "unexpected reply: {reply}"
    );
}

#[tokio::test]
async fn reasoning_failure_then_reset_then_recovery() {
    let model = FakeModel::new(search_then_summarize());
    let sessions = SessionStore::new(agent(model.clone(), catalog()));
    let session = sessions.get_or_create_session("guest");

    model.set_offline(true);
    let reply = session.chat("any rooms in Lviv?").await;
    assert_eq!(reply, APOLOGY_REPLY);
    assert_eq!(session.history().await.len(), 2);

    session.reset().await;
    assert!(session.history().await.is_empty());
    session.reset().await;
    assert!(session.history().await.is_empty());
    assert_eq!(session.info().turns, 0);

    model.set_offline(false);
    let reply = session.chat("any rooms in Lviv?").await;
    assert!(reply.contains("couldn't find any rooms"));
    assert_eq!(session.history().await.len(), 2);
}

#[tokio::test]
async fn sessions_are_isolated() {
    let model = FakeModel::new(Box::new(
        |_: &ProviderRequest| -> anyhow::Result<ProviderResponse> {
            Ok(ProviderResponse::text("Hello!"))
        },
    ));
    let sessions = SessionStore::new(agent(model, catalog()));

    let (a, b) = tokio::join!(sessions.chat("a", "hi"), sessions.chat("b", "hello"));
    assert_eq!((a.as_str(), b.as_str()), ("Hello!", "Hello!"));
    sessions.chat("a", "again").await;

    assert_eq!(sessions.active_count(), 2);
    assert_eq!(sessions.get_session("a").unwrap().history().await.len(), 4);
    assert_eq!(sessions.get_session("b").unwrap().history().await.len(), 2);

    assert!(sessions.delete_session("a"));
    assert!(sessions.get_session("a").is_none());
}
