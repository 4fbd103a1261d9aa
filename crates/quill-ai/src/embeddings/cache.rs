use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::{embeddings::EmbeddingsClient, AiError};

/// Wraps an [`EmbeddingsClient`] with a memory-bounded in-process vector
/// cache.
///
/// Cache keys include the backend and model identity, so vectors computed
/// under one configuration are never served under another. Entries are
/// evicted in insertion order once the memory budget is exceeded.
pub struct CachedEmbeddings<C> {
    inner: C,
    backend: &'static str,
    model: String,
    cache: VectorCache,
}

impl<C> CachedEmbeddings<C> {
    pub fn new(
        inner: C,
        backend: &'static str,
        model: impl Into<String>,
        max_memory_bytes: usize,
    ) -> Self {
        Self {
            inner,
            backend,
            model: model.into(),
            cache: VectorCache::new(max_memory_bytes),
        }
    }
}

#[async_trait]
impl<C: EmbeddingsClient> EmbeddingsClient for CachedEmbeddings<C> {
    async fn embed(
        &self,
        input: &[String],
        cancel: CancellationToken,
    ) -> Result<Vec<Vec<f32>>, AiError> {
        if input.is_empty() {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(AiError::Cancelled);
        }

        let mut out = vec![None::<Vec<f32>>; input.len()];
        let mut miss_slots = Vec::new();
        let mut miss_inputs = Vec::new();

        for (idx, text) in input.iter().enumerate() {
            let key = EmbeddingCacheKey::new(self.backend, &self.model, text);
            if let Some(hit) = self.cache.get(&key) {
                out[idx] = Some(hit);
            } else {
                miss_slots.push((idx, key));
                miss_inputs.push(text.clone());
            }
        }

        if !miss_inputs.is_empty() {
            let embeddings = self.inner.embed(&miss_inputs, cancel).await?;
            if embeddings.len() != miss_inputs.len() {
                return Err(AiError::UnexpectedResponse(format!(
                    "embedder returned unexpected batch size: expected {}, got {}",
                    miss_inputs.len(),
                    embeddings.len()
                )));
            }

            for ((idx, key), embedding) in miss_slots.into_iter().zip(embeddings.into_iter()) {
                out[idx] = Some(embedding.clone());
                self.cache.insert(key, embedding);
            }
        }

        out.into_iter()
            .enumerate()
            .map(|(idx, item)| {
                item.ok_or_else(|| {
                    AiError::UnexpectedResponse(format!("missing embedding output for index {idx}"))
                })
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct EmbeddingCacheKey([u8; 32]);

impl EmbeddingCacheKey {
    fn new(backend: &str, model: &str, text: &str) -> Self {
        let mut hasher = Sha256::new();
        for part in [backend, model, text] {
            // Length-prefix each part so distinct (model, text) splits can
            // never collide on the same digest input.
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hasher.finalize().into())
    }
}

struct VectorCache {
    max_bytes: usize,
    state: Mutex<VectorCacheState>,
}

#[derive(Default)]
struct VectorCacheState {
    bytes: usize,
    order: VecDeque<EmbeddingCacheKey>,
    entries: HashMap<EmbeddingCacheKey, Vec<f32>>,
}

impl VectorCache {
    fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            state: Mutex::new(VectorCacheState::default()),
        }
    }

    fn get(&self, key: &EmbeddingCacheKey) -> Option<Vec<f32>> {
        let state = self.state.lock().expect("vector cache poisoned");
        state.entries.get(key).cloned()
    }

    fn insert(&self, key: EmbeddingCacheKey, vector: Vec<f32>) {
        let cost = entry_cost(&vector);
        if cost > self.max_bytes {
            return;
        }

        let mut state = self.state.lock().expect("vector cache poisoned");
        if state.entries.contains_key(&key) {
            return;
        }

        while state.bytes + cost > self.max_bytes {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            if let Some(evicted) = state.entries.remove(&oldest) {
                state.bytes -= entry_cost(&evicted);
            }
        }

        state.bytes += cost;
        state.order.push_back(key);
        state.entries.insert(key, vector);
    }
}

fn entry_cost(vector: &[f32]) -> usize {
    std::mem::size_of::<EmbeddingCacheKey>() + vector.len() * std::mem::size_of::<f32>()
}
