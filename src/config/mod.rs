mod defaults;
mod types;
mod validation;

pub use defaults::*;
pub use types::*;
pub use validation::*;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Top-level hotelchat configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    /// State directory for persistent data.
    #[serde(skip)]
    pub state_dir: PathBuf,
}

impl Config {
    /// Load configuration from file, environment, and defaults.
    ///
    /// Fails when an override is malformed or the merged configuration does
    /// not pass [`validate_config_object`].
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = path
            .map(PathBuf::from)
            .or_else(find_config_file)
            .unwrap_or_else(|| PathBuf::from("hotelchat.json"));

        let mut config = if config_path.exists() {
            info!("Loading config from {}", config_path.display());
            load_config_file(&config_path)
                .with_context(|| format!("invalid config file {}", config_path.display()))?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_env_overrides()?;
        config.state_dir = resolve_state_dir();
        if config.embedding.cache_dir.is_none() {
            config.embedding.cache_dir = Some(config.state_dir.join(DEFAULT_MODEL_CACHE_DIR));
        }

        validate_config_object(&config)?;
        Ok(config)
    }

    /// Write default configuration to a file.
    pub fn write_default(path: &str) -> Result<()> {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Path of the SQLite catalog, falling back to the state directory.
    pub fn catalog_path(&self) -> PathBuf {
        self.catalog
            .path
            .clone()
            .unwrap_or_else(|| self.state_dir.join(DEFAULT_CATALOG_FILE))
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(kind) = parse_env::<EmbeddingProviderKind>("EMBEDDING_PROVIDER")? {
            self.embedding.provider = kind;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(dimensions) = parse_env::<usize>("EMBEDDING_DIMENSIONS")? {
            self.embedding.dimensions = dimensions;
        }
        if let Ok(dir) = std::env::var("EMBEDDING_CACHE_DIR") {
            self.embedding.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(k) = parse_env::<usize>("VECTOR_SEARCH_K")? {
            self.search.default_k = k;
        }
        if let Some(timeout) = parse_env::<u64>("VECTOR_SEARCH_TIMEOUT_MS")? {
            self.search.timeout_ms = timeout;
        }
        if let Some(metric) = parse_env::<SimilarityMetric>("SIMILARITY_METRIC")? {
            self.catalog.metric = metric;
        }
        if let Ok(path) = std::env::var("HOTELCHAT_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(path));
        }

        if let Ok(model) = std::env::var("LLM_MODEL") {
            self.agent.model = model;
        }
        if let Some(temperature) = parse_env::<f64>("LLM_TEMPERATURE")? {
            self.agent.temperature = temperature;
        }

        if let Some(level) = parse_env::<LoggingLevel>("LOG_LEVEL")? {
            self.logging.level = level;
        }
        if let Ok(file) = std::env::var("LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }
        if let Some(console) = parse_env::<bool>("LOG_CONSOLE")? {
            self.logging.console = console;
        }
        if let Some(enabled) = parse_env::<bool>("LOG_FILE_ENABLE")? {
            self.logging.file_enabled = enabled;
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.models.apply_openai_key(&key);
            if self.embedding.api_key.is_none() {
                self.embedding.api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
            self.models.apply_google_key(&key);
        }

        Ok(())
    }
}

/// Read and parse an environment variable. Unset variables yield `None`;
/// set but unparseable values are an error.
fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .to_lowercase()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid value for {name} ({raw:?}): {e}")),
        Err(_) => Ok(None),
    }
}

/// Find the configuration file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("hotelchat.json"),
        PathBuf::from("hotelchat.yaml"),
        PathBuf::from("hotelchat.yml"),
        PathBuf::from("hotelchat.toml"),
    ];

    for path in &candidates {
        if path.exists() {
            return Some(path.clone());
        }
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".hotelchat").join("config.json");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

/// Resolve the state directory for persistent data.
fn resolve_state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HOTELCHAT_STATE_DIR") {
        return PathBuf::from(dir);
    }

    dirs::home_dir()
        .map(|h| h.join(".hotelchat"))
        .unwrap_or_else(|| PathBuf::from(".hotelchat"))
}

/// Load configuration from a file path.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;

    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        _ => {
            // JSON5 is a superset of JSON; fall back to serde_json for its
            // clearer error messages.
            json5::from_str(&content).or_else(|_| serde_json::from_str(&content))?
        }
    };

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_empty());
        assert_eq!(config.search.default_k, DEFAULT_SEARCH_K);
        assert_eq!(config.embedding.dimensions, DEFAULT_EMBEDDING_DIMENSIONS);
        assert_eq!(config.catalog.metric, SimilarityMetric::Cosine);
    }

    #[test]
    fn loads_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "embedding:\n  dimensions: 64\nsearch:\n  defaultK: 3\ncatalog:\n  metric: l2\n"
        )
        .unwrap();

        let config = load_config_file(file.path()).unwrap();
        assert_eq!(config.embedding.dimensions, 64);
        assert_eq!(config.search.default_k, 3);
        assert_eq!(config.catalog.metric, SimilarityMetric::L2);
        assert_eq!(config.agent.model, DEFAULT_MODEL);
    }

    #[test]
    fn loads_json5_file_with_comments() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(
            file,
            "{{\n  // agent settings\n  agent: {{ model: 'gpt-4o-mini', temperature: 0.2 }},\n}}"
        )
        .unwrap();

        let config = load_config_file(file.path()).unwrap();
        assert_eq!(config.agent.model, "gpt-4o-mini");
        assert!((config.agent.temperature - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn catalog_path_defaults_to_state_dir() {
        let config = Config {
            state_dir: PathBuf::from("/tmp/hotelchat-state"),
            ..Config::default()
        };
        assert_eq!(
            config.catalog_path(),
            PathBuf::from("/tmp/hotelchat-state").join(DEFAULT_CATALOG_FILE)
        );
    }

    #[test]
    fn metric_parses_aliases() {
        assert_eq!("COSINE".parse::<SimilarityMetric>().unwrap(), SimilarityMetric::Cosine);
        assert_eq!("euclidean".parse::<SimilarityMetric>().unwrap(), SimilarityMetric::L2);
        assert!("manhattan".parse::<SimilarityMetric>().is_err());
    }
}
