use super::{Config, EmbeddingProviderKind};
use crate::embeddings::{sentence_model_dimensions, HASHING_MODEL_ID, SUPPORTED_SENTENCE_MODELS};
use anyhow::Result;
use tracing::warn;

/// Validation errors for configuration.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn invalid(path: &str, message: &str) -> ConfigValidationError {
    ConfigValidationError {
        path: path.to_string(),
        message: message.to_string(),
    }
}

/// Validate a configuration object.
pub fn validate_config(config: &Config) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    // Embedding service
    if config.embedding.model.trim().is_empty() {
        errors.push(invalid("embedding.model", "Embedding model is required"));
    }
    if config.embedding.provider == EmbeddingProviderKind::Local
        && config.embedding.model != HASHING_MODEL_ID
    {
        match sentence_model_dimensions(&config.embedding.model) {
            None => errors.push(ConfigValidationError {
                path: "embedding.model".to_string(),
                message: format!(
                    "Unknown local embedding model '{}' (supported: {}, {HASHING_MODEL_ID})",
                    config.embedding.model,
                    SUPPORTED_SENTENCE_MODELS.join(", ")
                ),
            }),
            Some(native) if native != config.embedding.dimensions => {
                errors.push(ConfigValidationError {
                    path: "embedding.dimensions".to_string(),
                    message: format!(
                        "Model '{}' produces {native}-dimensional vectors, not {}",
                        config.embedding.model, config.embedding.dimensions
                    ),
                })
            }
            Some(_) => {}
        }
    }
    if config.embedding.dimensions == 0 {
        errors.push(invalid(
            "embedding.dimensions",
            "Embedding dimension must be greater than 0",
        ));
    }
    if config.embedding.max_input_chars == 0 {
        errors.push(invalid(
            "embedding.maxInputChars",
            "Maximum input length must be greater than 0",
        ));
    }
    if config.embedding.provider == EmbeddingProviderKind::Openai
        && config.embedding.api_key.is_none()
    {
        errors.push(invalid(
            "embedding.apiKey",
            "The openai embedding provider requires an API key",
        ));
    }

    // Search
    if config.search.default_k == 0 {
        errors.push(invalid("search.defaultK", "Default K must be at least 1"));
    }
    if config.search.timeout_ms == 0 {
        errors.push(invalid("search.timeoutMs", "Search timeout must be greater than 0"));
    }

    // Agent
    if config.agent.model.trim().is_empty() {
        errors.push(invalid("agent.model", "Agent model is required"));
    }
    if !(0.0..=2.0).contains(&config.agent.temperature) {
        errors.push(invalid(
            "agent.temperature",
            "Temperature must be between 0 and 2",
        ));
    }
    if config.agent.max_tool_rounds == 0 {
        errors.push(invalid(
            "agent.maxToolRounds",
            "At least one tool round is required",
        ));
    }

    // Model providers
    for (name, provider) in &config.models.providers {
        if provider.base_url.is_empty() {
            errors.push(ConfigValidationError {
                path: format!("models.providers.{name}.baseUrl"),
                message: "Provider base URL is required".to_string(),
            });
        }
        if provider.api_key.is_none() {
            warn!(provider = %name, "model provider has no API key configured");
        }
    }

    errors
}

/// Validate configuration and return Result.
pub fn validate_config_object(config: &Config) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Configuration validation failed:\n{}", messages.join("\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_dimension_and_k() {
        let mut config = Config::default();
        config.embedding.dimensions = 0;
        config.search.default_k = 0;

        let errors = validate_config(&config);
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"embedding.dimensions"));
        assert!(paths.contains(&"search.defaultK"));
        assert!(validate_config_object(&config).is_err());
    }

    #[test]
    fn sentence_models_are_accepted_at_their_native_dimension() {
        let mut config = Config::default();
        config.embedding.model = "sentence-transformers/all-MiniLM-L6-v2".into();
        assert!(validate_config(&config).is_empty());

        config.embedding.model = "BAAI/bge-base-en-v1.5".into();
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "embedding.dimensions");

        config.embedding.dimensions = 768;
        assert!(validate_config(&config).is_empty());

        config.embedding.model = "word2vec".into();
        assert_eq!(validate_config(&config)[0].path, "embedding.model");

        config.embedding = crate::config::EmbeddingConfig::hashing(64);
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn openai_embeddings_need_a_key() {
        let mut config = Config::default();
        config.embedding.provider = EmbeddingProviderKind::Openai;
        assert_eq!(validate_config(&config).len(), 1);

        config.embedding.api_key = Some("sk-test".into());
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn temperature_out_of_range() {
        let mut config = Config::default();
        config.agent.temperature = 3.5;
        let errors = validate_config(&config);
        assert_eq!(errors[0].path, "agent.temperature");
        assert_eq!(
            errors[0].to_string(),
            "agent.temperature: Temperature must be between 0 and 2"
        );
    }
}
