use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::*;

// ============================================================================
// Embedding
// ============================================================================

/// Which backend turns text into vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// In-process model: a sentence transformer, or the hashing model.
    #[default]
    Local,
    /// OpenAI-compatible `/embeddings` endpoint.
    Openai,
}

impl FromStr for EmbeddingProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "openai" => Ok(Self::Openai),
            other => Err(format!("unknown embedding provider: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Where local model weights are downloaded to.
    pub cache_dir: Option<PathBuf>,
}

impl EmbeddingConfig {
    /// The offline hashing model at `dimensions`. Lexical only, with no
    /// notion of synonyms; for tests and hosts without model downloads.
    pub fn hashing(dimensions: usize) -> Self {
        Self {
            model: crate::embeddings::HASHING_MODEL_ID.to_string(),
            dimensions,
            ..Self::default()
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            model: default_embedding_model(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            api_key: None,
            base_url: None,
            cache_dir: None,
        }
    }
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimensions() -> usize {
    DEFAULT_EMBEDDING_DIMENSIONS
}

fn default_max_input_chars() -> usize {
    DEFAULT_MAX_INPUT_CHARS
}

// ============================================================================
// Catalog
// ============================================================================

/// Distance metric used by the room catalog.
///
/// Both metrics operate on unit-normalized vectors, so distances are bounded
/// by `[0, 2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// `1 - dot(a, b)`.
    #[default]
    Cosine,
    /// Euclidean distance `||a - b||`.
    L2,
}

impl SimilarityMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
        }
    }
}

impl FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "l2" | "euclidean" => Ok(Self::L2),
            other => Err(format!("unknown similarity metric: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    /// SQLite file holding the catalog. Defaults to `<state_dir>/catalog.db`.
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub metric: SimilarityMetric,
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: DEFAULT_SEARCH_K,
            timeout_ms: DEFAULT_SEARCH_TIMEOUT_MS,
        }
    }
}

fn default_k() -> usize {
    DEFAULT_SEARCH_K
}

fn default_timeout_ms() -> u64 {
    DEFAULT_SEARCH_TIMEOUT_MS
}

// ============================================================================
// Agent
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    #[serde(default = "default_agent_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f64,
    pub system_prompt: Option<String>,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    pub max_tokens: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_agent_model(),
            temperature: 0.0,
            system_prompt: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            max_tokens: None,
        }
    }
}

impl AgentConfig {
    pub fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

fn default_agent_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tool_rounds() -> u32 {
    DEFAULT_MAX_TOOL_ROUNDS
}

// ============================================================================
// Model providers
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModelsConfig {
    #[serde(default)]
    pub providers: HashMap<String, ModelProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl ModelsConfig {
    pub fn apply_openai_key(&mut self, key: &str) {
        self.apply_key("openai", OPENAI_BASE_URL, key);
    }

    pub fn apply_google_key(&mut self, key: &str) {
        self.apply_key("google", GEMINI_BASE_URL, key);
    }

    fn apply_key(&mut self, name: &str, base_url: &str, key: &str) {
        self.providers
            .entry(name.to_string())
            .or_insert_with(|| ModelProviderConfig {
                base_url: base_url.to_string(),
                api_key: None,
            })
            .api_key = Some(key.to_string());
    }
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LoggingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LoggingLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" | "critical" => Ok(Self::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LoggingLevel,
    pub file: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub console: bool,
    #[serde(default)]
    pub file_enabled: bool,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LoggingLevel::default(),
            file: None,
            console: true,
            file_enabled: false,
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}
