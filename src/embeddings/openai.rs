use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbeddingError, EmbeddingProvider};

/// Calls an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddingProvider {
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    client: reqwest::Client,
}

impl OpenAiEmbeddingProvider {
    pub fn new(api_key: String, base_url: String, model: String, dimensions: usize) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dimensions,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = OpenAiEmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };

        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(EmbeddingError::Request(format!(
                "embedding API error ({status}): {text}"
            )));
        }

        let mut parsed: OpenAiEmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| EmbeddingError::Request(format!("malformed embedding response: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::Request(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);
        debug!(model = %self.model, count = parsed.data.len(), "remote embeddings received");
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
