use std::time::Duration;

use url::Url;

/// Configuration for the Quill suggestion engines.
#[derive(Debug, Clone, PartialEq)]
pub struct AiConfig {
    pub provider: ProviderConfig,
    pub embeddings: EmbeddingsConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            embeddings: EmbeddingsConfig::default(),
        }
    }
}

/// Which chat backend to talk to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Ollama,
    OpenAiCompatible,
}

/// Chat backend settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub url: Url,
    pub model: String,
    pub api_key: Option<String>,
    /// Per-request HTTP timeout. Expiry surfaces as [`crate::AiError::Timeout`],
    /// which callers treat the same as a declined prediction.
    pub timeout: Duration,
    /// Default generation cap applied when a request does not set one.
    pub max_output_tokens: u32,
    /// Upper bound on in-flight backend calls. Must be at least 1.
    pub concurrency: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Ollama,
            url: Url::parse("http://localhost:11434").expect("default provider url is valid"),
            model: String::new(),
            api_key: None,
            timeout: Duration::from_secs(30),
            max_output_tokens: 400,
            concurrency: 4,
        }
    }
}

/// Which vectorization backend produces embedding vectors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EmbeddingsBackend {
    /// Fully local hashing-trick vectors. Deterministic and offline; no
    /// neural model involved.
    Hash,
    /// The configured provider's embeddings endpoint.
    Provider,
}

/// Vectorization settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingsConfig {
    pub backend: EmbeddingsBackend,
    /// Embedding model name, e.g. `nomic-embed-text`. Required for the
    /// provider backend, ignored by the hash backend.
    pub model: String,
    /// Inputs per provider request when embedding a batch.
    pub batch_size: usize,
    /// Memory budget for the in-process embedding vector cache.
    pub max_memory_bytes: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingsBackend::Hash,
            model: String::new(),
            batch_size: 32,
            max_memory_bytes: 64 * 1024 * 1024,
        }
    }
}
