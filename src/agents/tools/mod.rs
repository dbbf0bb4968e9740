mod common;
mod room_search;

pub use common::*;
pub use room_search::{RoomSearchOutcome, SearchRoomsTool, NO_RESULTS_MARKER, SEARCH_ROOMS_TOOL};

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::providers::{ToolCall, ToolDefinition};

// ============================================================================
// Tool System
// ============================================================================

/// Information about an available tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolInfo {
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }
}

/// Result from executing a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            json: None,
            is_error: false,
        }
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self {
            text: None,
            json: Some(value),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            text: Some(message.into()),
            json: None,
            is_error: true,
        }
    }

    /// The payload handed back to the model.
    pub fn render(&self) -> String {
        match (&self.text, &self.json) {
            (Some(text), _) => text.clone(),
            (None, Some(json)) => json.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// Trait for tool execution.
#[async_trait::async_trait]
pub trait AgentTool: Send + Sync {
    fn info(&self) -> ToolInfo;
    async fn execute(
        &self,
        params: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolResult>;
}

/// Context provided to tools during execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub session_key: String,
}

// ============================================================================
// Registry
// ============================================================================

/// The tools an agent may call, in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn AgentTool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn AgentTool>) {
        let name = tool.info().name;
        match self.by_name.get(&name) {
            Some(&idx) => self.tools[idx] = tool,
            None => {
                self.by_name.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn AgentTool>) -> Self {
        self.register(tool);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn AgentTool>> {
        self.by_name.get(name).map(|&idx| &self.tools[idx])
    }

    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools.iter().map(|t| t.info()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.info().to_definition()).collect()
    }

    /// Run a requested call. Unknown tools and tool failures become error
    /// results for the model rather than errors for the caller.
    pub async fn execute(&self, call: &ToolCall, context: &ToolContext) -> ToolResult {
        let Some(tool) = self.get(&call.name) else {
            warn!(tool = %call.name, "model requested unknown tool");
            return ToolResult::error(format!("Unknown tool: {}", call.name));
        };

        match tool.execute(call.arguments.clone(), context).await {
            Ok(result) => {
                debug!(tool = %call.name, is_error = result.is_error, "tool executed");
                result
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool execution failed");
                ToolResult::error(format!("Tool {} failed: {}", call.name, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait::async_trait]
    impl AgentTool for EchoTool {
        fn info(&self) -> ToolInfo {
            ToolInfo {
                name: "echo".into(),
                description: "Echo the input".into(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn execute(
            &self,
            params: serde_json::Value,
            _context: &ToolContext,
        ) -> anyhow::Result<ToolResult> {
            if params.get("fail").is_some() {
                anyhow::bail!("asked to fail");
            }
            Ok(ToolResult::json(params))
        }
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[tokio::test]
    async fn dispatches_by_name() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));
        let ctx = ToolContext::default();

        let ok = registry.execute(&call("echo", json!({"a": 1})), &ctx).await;
        assert_eq!(ok.render(), r#"{"a":1}"#);

        let unknown = registry.execute(&call("nope", json!({})), &ctx).await;
        assert!(unknown.is_error);
        assert_eq!(unknown.render(), "Unknown tool: nope");

        let failed = registry.execute(&call("echo", json!({"fail": true})), &ctx).await;
        assert!(failed.is_error);
        assert!(failed.render().contains("asked to fail"));
    }

    #[test]
    fn registering_twice_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.definitions().len(), 1);
        assert_eq!(registry.definitions()[0].name, "echo");
    }
}
