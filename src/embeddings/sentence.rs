//! Local sentence-transformer models, run in-process through `fastembed`.
//!
//! Weights are downloaded on the first load and cached on disk; after that
//! the model works offline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{EmbeddingError, EmbeddingProvider};

/// Model ids accepted for the `local` provider, besides the hashing model.
pub const SUPPORTED_SENTENCE_MODELS: &[&str] = &[
    "sentence-transformers/all-MiniLM-L6-v2",
    "sentence-transformers/all-MiniLM-L12-v2",
    "BAAI/bge-small-en-v1.5",
    "BAAI/bge-base-en-v1.5",
    "nomic-ai/nomic-embed-text-v1.5",
];

/// Map a model id onto a fastembed model and its output dimension.
///
/// Matching is case-insensitive and the organization prefix is optional.
fn resolve_model(name: &str) -> Option<(EmbeddingModel, usize)> {
    let lowered = name.trim().to_lowercase();
    let short = lowered
        .rsplit_once('/')
        .map(|(_, model)| model)
        .unwrap_or(lowered.as_str());
    match short {
        "all-minilm-l6-v2" => Some((EmbeddingModel::AllMiniLML6V2, 384)),
        "all-minilm-l12-v2" => Some((EmbeddingModel::AllMiniLML12V2, 384)),
        "bge-small-en-v1.5" => Some((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Some((EmbeddingModel::BGEBaseENV15, 768)),
        "nomic-embed-text-v1.5" => Some((EmbeddingModel::NomicEmbedTextV15, 768)),
        _ => None,
    }
}

/// Output dimension of a supported sentence model, `None` if unknown.
pub fn sentence_model_dimensions(name: &str) -> Option<usize> {
    resolve_model(name).map(|(_, dimensions)| dimensions)
}

/// A sentence-transformer model held in memory.
///
/// fastembed needs exclusive access per inference call, so batches are run
/// one at a time on the blocking pool.
pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    name: String,
    dimensions: usize,
}

impl FastEmbedProvider {
    /// Load `name`, downloading it into `cache_dir` if it is not there yet.
    ///
    /// Blocks for the duration of the download and ONNX session setup.
    pub fn load(name: &str, cache_dir: Option<PathBuf>) -> Result<Self, EmbeddingError> {
        let (model, dimensions) = resolve_model(name).ok_or_else(|| {
            EmbeddingError::ModelUnavailable(format!(
                "unknown local embedding model '{name}' (supported: {})",
                SUPPORTED_SENTENCE_MODELS.join(", ")
            ))
        })?;

        let mut options = InitOptions::new(model).with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        let started = Instant::now();
        let embedding = TextEmbedding::try_new(options).map_err(|e| {
            EmbeddingError::ModelUnavailable(format!("failed to load '{name}': {e}"))
        })?;
        info!(
            model = name,
            dimensions,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sentence model loaded"
        );

        Ok(Self {
            model: Arc::new(Mutex::new(embedding)),
            name: name.to_string(),
            dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let batch = texts.to_vec();
        let vectors = tokio::task::spawn_blocking(move || {
            let mut model = model.lock();
            model.embed(batch, None)
        })
        .await
        .map_err(|e| EmbeddingError::Request(format!("embedding task failed: {e}")))?
        .map_err(|e| EmbeddingError::Request(format!("local inference failed: {e}")))?;

        debug!(model = %self.name, count = vectors.len(), "local embeddings computed");
        Ok(vectors)
    }

    fn model_name(&self) -> String {
        self.name.clone()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
