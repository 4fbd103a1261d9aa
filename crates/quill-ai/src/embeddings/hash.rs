use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{embeddings::EmbeddingsClient, AiError};

/// A lightweight, fully-local embedder based on the hashing trick.
///
/// This is not a neural embedding model, but identical inputs always map to
/// identical unit vectors, which is exactly what the offline backend and
/// deterministic tests need.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub(crate) fn model_id(&self) -> String {
        format!("hash:dims={}", self.dims)
    }

    fn token_hash(token: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        hasher.finish()
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims];

        for token in tokenize(text) {
            let idx = (Self::token_hash(&token) % self.dims as u64) as usize;
            vec[idx] += 1.0;
        }

        l2_normalize(&mut vec);
        vec
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingsClient for HashEmbedder {
    async fn embed(
        &self,
        input: &[String],
        cancel: CancellationToken,
    ) -> Result<Vec<Vec<f32>>, AiError> {
        if cancel.is_cancelled() {
            return Err(AiError::Cancelled);
        }
        Ok(input.iter().map(|text| self.embed_one(text)).collect())
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
}

fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}
