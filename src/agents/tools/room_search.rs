use std::fmt::Write as _;

use anyhow::Result;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    read_optional_integer_param, read_optional_number_param, read_optional_string_param,
    read_string_param, AgentTool, ToolContext, ToolInfo, ToolResult,
};
use crate::catalog::RoomFilter;
use crate::search::{RoomResult, SearchRequest, VectorSearchEngine};

pub const SEARCH_ROOMS_TOOL: &str = "search_rooms";

/// Returned to the model when a search matches nothing.
pub const NO_RESULTS_MARKER: &str = "No matching rooms found.";

/// Upper bound on `k` accepted from the model.
const MAX_RESULTS: usize = 20;

/// What a `search_rooms` call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomSearchOutcome {
    Found(Vec<RoomResult>),
    NoResults,
    /// Bad arguments or an engine error, already phrased for the model.
    Failed(String),
}

impl RoomSearchOutcome {
    pub fn render(&self) -> String {
        match self {
            Self::Found(results) => render_results(results),
            Self::NoResults => NO_RESULTS_MARKER.to_string(),
            Self::Failed(message) => message.clone(),
        }
    }

    pub fn into_tool_result(self) -> ToolResult {
        match self {
            Self::Found(results) => ToolResult::text(render_results(&results)),
            Self::NoResults => ToolResult::json(json!({
                "status": "no_results",
                "results": [],
                "message": NO_RESULTS_MARKER,
            })),
            Self::Failed(message) => ToolResult::error(message),
        }
    }
}

fn render_results(results: &[RoomResult]) -> String {
    let mut out = format!(
        "Found {} matching room{}:\n",
        results.len(),
        if results.len() == 1 { "" } else { "s" }
    );
    for (i, r) in results.iter().enumerate() {
        let room = &r.room;
        let _ = writeln!(
            out,
            "{}. {} ({}) - ${:.2}/night, sleeps {}, similarity {:.2}",
            i + 1,
            room.name,
            room.city,
            room.price,
            room.capacity,
            r.score
        );
        let _ = write!(out, "   {}", room.description);
        if !room.amenities.is_empty() {
            let _ = write!(out, " Amenities: {}.", room.amenities.join(", "));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Exposes the vector search engine to the agent as `search_rooms`.
pub struct SearchRoomsTool {
    engine: VectorSearchEngine,
}

impl SearchRoomsTool {
    pub fn new(engine: VectorSearchEngine) -> Self {
        Self { engine }
    }

    fn parse_request(params: &Value) -> Result<SearchRequest, String> {
        if !params.is_object() {
            return Err(format!(
                "{SEARCH_ROOMS_TOOL} expects a JSON object of arguments, got {params}"
            ));
        }

        let query = read_string_param(params, "query")?;
        // Non-positive k is passed through as 0 so the engine reports it.
        let k = read_optional_integer_param(params, "k")?
            .map(|k| usize::try_from(k).unwrap_or(0).min(MAX_RESULTS));
        let city = read_optional_string_param(params, "city");
        let max_price = read_optional_number_param(params, "max_price")?;

        Ok(SearchRequest {
            query,
            k,
            filter: RoomFilter { city, max_price },
        })
    }

    /// Run a search. Never fails; problems come back as [`RoomSearchOutcome::Failed`].
    pub async fn run(&self, params: &Value) -> RoomSearchOutcome {
        let request = match Self::parse_request(params) {
            Ok(request) => request,
            Err(message) => {
                warn!(error = %message, "rejected search_rooms arguments");
                return RoomSearchOutcome::Failed(format!("Invalid search request: {message}"));
            }
        };

        match self.engine.search_with(request).await {
            Ok(results) if results.is_empty() => RoomSearchOutcome::NoResults,
            Ok(results) => {
                debug!(count = results.len(), "search_rooms found rooms");
                RoomSearchOutcome::Found(results)
            }
            Err(e) => {
                warn!(error = %e, "room search failed");
                RoomSearchOutcome::Failed(format!("Room search failed: {e}"))
            }
        }
    }
}

#[async_trait::async_trait]
impl AgentTool for SearchRoomsTool {
    fn info(&self) -> ToolInfo {
        ToolInfo {
            name: SEARCH_ROOMS_TOOL.to_string(),
            description: "Search the hotel room catalog with a natural-language description \
                          of what the guest wants. Returns the best matching rooms with \
                          name, city, nightly price and similarity."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What the guest is looking for, e.g. 'quiet family apartment with kitchen'"
                    },
                    "k": {
                        "type": "integer",
                        "description": format!("Number of rooms to return (default {})", self.engine.default_k())
                    },
                    "city": { "type": "string", "description": "Only rooms in this city" },
                    "max_price": { "type": "number", "description": "Maximum nightly price" }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> Result<ToolResult> {
        Ok(self.run(&params).await.into_tool_result())
    }
}
