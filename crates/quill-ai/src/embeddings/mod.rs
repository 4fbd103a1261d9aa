mod cache;
mod hash;
mod provider;

pub use cache::CachedEmbeddings;
pub use hash::HashEmbedder;
pub use provider::ProviderEmbeddings;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    config::{AiConfig, EmbeddingsBackend},
    AiError,
};

/// A vectorization backend producing one fixed-dimension embedding vector
/// per input string, in input order.
///
/// Identical inputs must map to identical vectors for the lifetime of the
/// backend; the match engine's determinism depends on it.
#[async_trait]
pub trait EmbeddingsClient: Send + Sync {
    async fn embed(
        &self,
        input: &[String],
        cancel: CancellationToken,
    ) -> Result<Vec<Vec<f32>>, AiError>;
}

/// Construct the configured [`EmbeddingsClient`], wrapped in the in-process
/// vector cache so re-embedding an unchanged vocabulary costs no external
/// calls.
pub fn embeddings_client_from_config(
    config: &AiConfig,
) -> Result<Arc<dyn EmbeddingsClient>, AiError> {
    let max_memory_bytes = config.embeddings.max_memory_bytes;

    let hash_client = |max_memory_bytes: usize| -> Arc<dyn EmbeddingsClient> {
        let embedder = HashEmbedder::default();
        let model = embedder.model_id();
        Arc::new(CachedEmbeddings::new(
            embedder,
            "hash",
            model,
            max_memory_bytes,
        ))
    };

    match config.embeddings.backend {
        EmbeddingsBackend::Hash => Ok(hash_client(max_memory_bytes)),
        EmbeddingsBackend::Provider => {
            if config.embeddings.model.trim().is_empty() {
                tracing::warn!(
                    target: "quill.ai",
                    "embeddings backend is `provider` but no embeddings model is configured; falling back to hash embeddings"
                );
                return Ok(hash_client(max_memory_bytes));
            }

            let inner = ProviderEmbeddings::from_config(config)?;
            let backend = inner.backend_id();
            let model = inner.model().to_string();
            Ok(Arc::new(CachedEmbeddings::new(
                inner,
                backend,
                model,
                max_memory_bytes,
            )))
        }
    }
}
