//! Embedding service: turns text into fixed-dimension unit vectors.
//!
//! The model behind the service is held by an [`EmbeddingModelHandle`] that
//! is constructed explicitly at startup and loaded lazily, exactly once, on
//! the first call. Every vector the service hands out has the configured
//! dimension and unit length, which is what the room catalog relies on.
//!
//! The `local` provider runs a sentence-transformer model in-process
//! (default `sentence-transformers/all-MiniLM-L6-v2`). The hashing model is
//! a lexical stand-in for tests and machines that cannot fetch weights.

mod local;
mod openai;
mod sentence;
pub mod vector;

pub use local::{HashingEmbeddingProvider, HASHING_MODEL_ID};
pub use openai::OpenAiEmbeddingProvider;
pub use sentence::{sentence_model_dimensions, FastEmbedProvider, SUPPORTED_SENTENCE_MODELS};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::{EmbeddingConfig, EmbeddingProviderKind, OPENAI_BASE_URL};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("input is {len} characters long, the model accepts at most {max}")]
    InputTooLong { len: usize, max: usize },
    #[error("invalid embedding input: {0}")]
    InvalidInput(String),
    #[error("embedding request failed: {0}")]
    Request(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("model produced a zero vector: {0}")]
    ZeroVector(String),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A provider that turns text into dense vector embeddings.
///
/// Implementations must be safe to call concurrently once constructed.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute embeddings for a batch of texts, one vector per input.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// The model identifier used by this provider.
    fn model_name(&self) -> String;

    /// Dimensionality of the vectors produced by [`Self::embed`].
    fn dimensions(&self) -> usize;
}

/// Type-erased wrapper so we can store any provider behind a single type.
pub type EmbeddingProviderBox = Box<dyn EmbeddingProvider>;

/// Constructs a provider from configuration. Runs on the blocking pool and
/// succeeds at most once per handle.
pub type ModelLoader =
    Arc<dyn Fn(&EmbeddingConfig) -> Result<EmbeddingProviderBox, EmbeddingError> + Send + Sync>;

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create an [`EmbeddingProviderBox`] from the embedding configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<EmbeddingProviderBox, EmbeddingError> {
    match config.provider {
        EmbeddingProviderKind::Local if config.model == HASHING_MODEL_ID => {
            Ok(Box::new(HashingEmbeddingProvider::new(config.dimensions)))
        }
        EmbeddingProviderKind::Local => Ok(Box::new(FastEmbedProvider::load(
            &config.model,
            config.cache_dir.clone(),
        )?)),
        EmbeddingProviderKind::Openai => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                EmbeddingError::ModelUnavailable("no OpenAI API key configured".to_string())
            })?;
            let base_url = config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string());
            Ok(Box::new(OpenAiEmbeddingProvider::new(
                api_key,
                base_url,
                config.model.clone(),
                config.dimensions,
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Model handle
// ---------------------------------------------------------------------------

/// Owns the embedding model and loads it on first use.
///
/// Share one handle (behind an `Arc`) between every service that embeds
/// text; concurrent first calls all wait on the same initialization.
pub struct EmbeddingModelHandle {
    config: EmbeddingConfig,
    loader: ModelLoader,
    model: OnceCell<EmbeddingProviderBox>,
    loads: AtomicUsize,
}

impl EmbeddingModelHandle {
    /// A handle that builds its provider with [`create_provider`].
    pub fn new(config: EmbeddingConfig) -> Self {
        Self::with_loader(config, create_provider)
    }

    /// A handle with a custom provider constructor.
    pub fn with_loader<F>(config: EmbeddingConfig, loader: F) -> Self
    where
        F: Fn(&EmbeddingConfig) -> Result<EmbeddingProviderBox, EmbeddingError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            config,
            loader: Arc::new(loader),
            model: OnceCell::new(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Return the loaded model, loading it if this is the first call.
    ///
    /// A failed load is not cached; the next call tries again.
    pub async fn get(&self) -> Result<&dyn EmbeddingProvider, EmbeddingError> {
        let model = self
            .model
            .get_or_try_init(|| async {
                self.loads.fetch_add(1, Ordering::SeqCst);
                info!(
                    provider = ?self.config.provider,
                    model = %self.config.model,
                    dimensions = self.config.dimensions,
                    "loading embedding model"
                );
                let loader = Arc::clone(&self.loader);
                let config = self.config.clone();
                let provider = tokio::task::spawn_blocking(move || loader(&config))
                    .await
                    .map_err(|e| {
                        EmbeddingError::ModelUnavailable(format!("model loader failed: {e}"))
                    })??;
                if provider.dimensions() != self.config.dimensions {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.config.dimensions,
                        actual: provider.dimensions(),
                    });
                }
                Ok(provider)
            })
            .await?;
        Ok(&**model)
    }

    /// Whether the model has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Number of load attempts made so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Embeds text through a shared [`EmbeddingModelHandle`].
#[derive(Clone)]
pub struct EmbeddingService {
    model: Arc<EmbeddingModelHandle>,
}

impl EmbeddingService {
    pub fn new(model: Arc<EmbeddingModelHandle>) -> Self {
        Self { model }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(Arc::new(EmbeddingModelHandle::new(config.clone())))
    }

    /// The configured output dimension D.
    pub fn dimensions(&self) -> usize {
        self.model.config().dimensions
    }

    /// The configured model identifier.
    pub fn model_id(&self) -> &str {
        &self.model.config().model
    }

    pub fn handle(&self) -> &Arc<EmbeddingModelHandle> {
        &self.model
    }

    /// Embed a single text into a unit vector of length D.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Request("provider returned no embedding".to_string()))
    }

    /// Embed several texts in one provider call.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        for text in texts {
            self.validate_input(text)?;
        }

        let model = self.model.get().await?;
        let vectors = model.embed(texts).await?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::Request(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        let expected = self.dimensions();
        let normalized = vectors
            .into_iter()
            .map(|mut v| {
                if v.len() != expected {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected,
                        actual: v.len(),
                    });
                }
                if !vector::l2_normalize(&mut v) {
                    return Err(EmbeddingError::ZeroVector(format!(
                        "model '{}' found nothing to embed",
                        self.model_id()
                    )));
                }
                Ok(v)
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = normalized.len(), dimensions = expected, "embeddings generated");
        Ok(normalized)
    }

    fn validate_input(&self, text: &str) -> Result<(), EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("text is empty".to_string()));
        }
        let len = text.chars().count();
        let max = self.model.config().max_input_chars;
        if len > max {
            return Err(EmbeddingError::InputTooLong { len, max });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config(dimensions: usize) -> EmbeddingConfig {
        EmbeddingConfig::hashing(dimensions)
    }

    #[tokio::test]
    async fn embed_is_deterministic_and_unit_length() {
        let service = EmbeddingService::from_config(&local_config(64));
        let a = service.embed("Cozy sea-view apartment").await.unwrap();
        let b = service.embed("Cozy sea-view apartment").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(vector::is_unit_vector(&a));
    }

    #[tokio::test]
    async fn model_loads_lazily_and_once() {
        let service = EmbeddingService::from_config(&local_config(32));
        assert!(!service.handle().is_loaded());

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move { service.embed(&format!("room number {i}")).await })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            task.unwrap().unwrap();
        }

        assert!(service.handle().is_loaded());
        assert_eq!(service.handle().load_count(), 1);
    }

    #[tokio::test]
    async fn empty_and_oversized_input_are_rejected() {
        let mut config = local_config(32);
        config.max_input_chars = 10;
        let service = EmbeddingService::from_config(&config);

        assert!(matches!(
            service.embed("   ").await,
            Err(EmbeddingError::InvalidInput(_))
        ));
        assert!(matches!(
            service.embed("this text is far too long").await,
            Err(EmbeddingError::InputTooLong { max: 10, .. })
        ));
    }

    #[tokio::test]
    async fn input_the_model_cannot_represent_is_a_model_error() {
        let service = EmbeddingService::from_config(&local_config(32));
        assert!(matches!(
            service.embed("please find me some").await,
            Err(EmbeddingError::ZeroVector(_))
        ));
        assert!(matches!(
            service.embed("!!!").await,
            Err(EmbeddingError::ZeroVector(_))
        ));
    }

    #[test]
    fn sentence_models_are_the_local_default() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, EmbeddingProviderKind::Local);
        assert_eq!(config.model, "sentence-transformers/all-MiniLM-L6-v2");
        assert_eq!(sentence_model_dimensions(&config.model), Some(config.dimensions));
    }

    #[tokio::test]
    async fn unknown_local_model_is_unavailable_and_retried() {
        let mut config = local_config(32);
        config.model = "no-such-model".into();
        let service = EmbeddingService::from_config(&config);

        assert!(matches!(
            service.embed("hotel").await,
            Err(EmbeddingError::ModelUnavailable(_))
        ));
        assert!(!service.handle().is_loaded());
        let _ = service.embed("hotel").await;
        assert_eq!(service.handle().load_count(), 2);
    }

    #[tokio::test]
    async fn provider_with_wrong_dimension_is_rejected() {
        let handle = EmbeddingModelHandle::with_loader(
            local_config(32),
            |_: &EmbeddingConfig| -> Result<EmbeddingProviderBox, EmbeddingError> {
                Ok(Box::new(HashingEmbeddingProvider::new(16)))
            },
        );
        let service = EmbeddingService::new(Arc::new(handle));
        assert!(matches!(
            service.embed("hotel").await,
            Err(EmbeddingError::DimensionMismatch {
                expected: 32,
                actual: 16
            })
        ));
    }
}
