/// Default configuration constants used across the system.

/// Default local sentence-transformer model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Default embedding dimension.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Directory under the state dir where downloaded model weights are cached.
pub const DEFAULT_MODEL_CACHE_DIR: &str = "models";

/// Longest input (in characters) the embedding service accepts.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 8192;

/// Default number of rooms returned by a search.
pub const DEFAULT_SEARCH_K: usize = 5;

/// Default upper bound for a single search call (10 seconds).
pub const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 10_000;

/// Default agent model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default number of tool rounds the agent may run per user turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 3;

/// Default system prompt for the hotel assistant.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful hotel assistant. \
     Use the search_rooms tool whenever the user asks for accommodation, \
     and answer only from the rooms it returns. If no rooms match, say so.";

/// Default file name of the catalog database under the state directory.
pub const DEFAULT_CATALOG_FILE: &str = "catalog.db";

/// Base URL of the OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Base URL of the Google Generative Language API.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
