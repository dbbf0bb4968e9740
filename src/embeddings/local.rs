use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use super::{EmbeddingError, EmbeddingProvider};

/// Identifier of the built-in hashing model, the offline stand-in for a
/// sentence model in tests and on hosts without model downloads.
pub const HASHING_MODEL_ID: &str = "hashing-trigram-v1";

/// Weight of a whole-word feature.
const WORD_WEIGHT: f32 = 1.0;

/// Weight of a single character trigram feature.
const TRIGRAM_WEIGHT: f32 = 0.25;

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("token pattern is valid"));

/// Function words that carry no meaning for room matching.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "by", "for", "from", "i", "in", "is", "it", "me", "my", "near",
    "of", "on", "or", "please", "some", "the", "to", "with", "want", "need", "looking", "find",
];

/// A local embedding model based on signed feature hashing.
///
/// Each lower-cased word contributes one feature and each of its
/// boundary-marked character trigrams contributes a lighter one. Features are
/// bucketed by SHA-256 so the output is identical on every platform and run.
/// Vectors are returned unnormalized; the embedding service normalizes them.
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();

        for token in TOKEN_RE.find_iter(&lowered).map(|m| m.as_str()) {
            if STOP_WORDS.contains(&token) {
                continue;
            }
            self.add_feature(&mut vector, &format!("w:{token}"), WORD_WEIGHT);

            let marked: Vec<char> = format!("<{token}>").chars().collect();
            for window in marked.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, &format!("c:{trigram}"), TRIGRAM_WEIGHT);
            }
        }

        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(bucket) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if self.dimensions == 0 {
            return Err(EmbeddingError::ModelUnavailable(
                "hashing model configured with zero dimensions".to_string(),
            ));
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn model_name(&self) -> String {
        HASHING_MODEL_ID.to_string()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
