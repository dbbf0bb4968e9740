//! Vector search engine: embeds a query and ranks catalog rooms against it.

use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::{Room, RoomFilter, RoomStore, StoreError};
use crate::config::SearchConfig;
use crate::embeddings::vector::distance_to_score;
use crate::embeddings::{EmbeddingError, EmbeddingService};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("search timed out after {} ms", .0.as_millis())]
    Timeout(Duration),
}

/// One ranked room.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomResult {
    pub room: Room,
    /// Similarity in `[0, 1]`, higher is closer.
    pub score: f64,
    pub distance: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    /// Number of results; the engine default when `None`.
    pub k: Option<usize>,
    pub filter: RoomFilter,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn with_filter(mut self, filter: RoomFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Stateless search over a [`RoomStore`]. Clones share the same catalog.
#[derive(Clone)]
pub struct VectorSearchEngine {
    embedder: EmbeddingService,
    store: RoomStore,
    default_k: usize,
    timeout: Duration,
}

impl VectorSearchEngine {
    /// Queries are embedded with the same service the catalog was built with.
    pub fn new(store: RoomStore, config: &SearchConfig) -> Self {
        Self {
            embedder: store.embedder().clone(),
            store,
            default_k: config.default_k,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub fn store(&self) -> &RoomStore {
        &self.store
    }

    /// The `k` rooms most similar to `query`, best first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<RoomResult>, SearchError> {
        self.search_with(SearchRequest::new(query).with_k(k)).await
    }

    pub async fn search_with(&self, request: SearchRequest) -> Result<Vec<RoomResult>, SearchError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(SearchError::InvalidQuery("query text is empty".to_string()));
        }
        let k = request.k.unwrap_or(self.default_k);
        if k == 0 {
            return Err(SearchError::InvalidQuery("k must be at least 1".to_string()));
        }

        let started = Instant::now();
        let results = tokio::time::timeout(self.timeout, self.run(query, k, request.filter))
            .await
            .map_err(|_| {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "room search timed out");
                SearchError::Timeout(self.timeout)
            })??;

        debug!(
            k,
            results = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "room search complete"
        );
        Ok(results)
    }

    async fn run(
        &self,
        query: &str,
        k: usize,
        filter: RoomFilter,
    ) -> Result<Vec<RoomResult>, SearchError> {
        let embedding = self.embedder.embed(query).await.map_err(|e| match e {
            EmbeddingError::InvalidInput(msg) => SearchError::InvalidQuery(msg),
            other => SearchError::Embedding(other),
        })?;

        let store = self.store.clone();
        let matches =
            tokio::task::spawn_blocking(move || store.nearest_filtered(&embedding, k, &filter))
                .await
                .map_err(|e| StoreError::Task(e.to_string()))??;

        let mut results: Vec<RoomResult> = matches
            .into_iter()
            .map(|m| RoomResult {
                score: distance_to_score(m.distance),
                distance: m.distance,
                room: m.room,
            })
            .collect();

        if !results.windows(2).all(|w| w[0].distance <= w[1].distance) {
            warn!("catalog returned unsorted matches, re-sorting");
            results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        }
        results.truncate(k);
        Ok(results)
    }
}
