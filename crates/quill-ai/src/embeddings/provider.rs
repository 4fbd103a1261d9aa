use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    config::{AiConfig, ProviderKind},
    embeddings::EmbeddingsClient,
    providers::{ollama_endpoint, openai_compatible_endpoint},
    AiError,
};

/// Provider-backed vectorization via the configured backend's embeddings
/// endpoint: `/v1/embeddings` for OpenAI-compatible servers, `/api/embed`
/// for Ollama.
#[derive(Debug)]
pub struct ProviderEmbeddings {
    kind: ProviderKind,
    base_url: Url,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    batch_size: usize,
    client: reqwest::Client,
}

impl ProviderEmbeddings {
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let model = config.embeddings.model.trim().to_string();
        if model.is_empty() {
            return Err(AiError::InvalidConfig(
                "embeddings.model is required for the provider backend".into(),
            ));
        }

        Ok(Self {
            kind: config.provider.kind,
            base_url: config.provider.url.clone(),
            model,
            api_key: config.provider.api_key.clone(),
            timeout: config.provider.timeout,
            batch_size: config.embeddings.batch_size.max(1),
            client: reqwest::Client::builder().build()?,
        })
    }

    pub(crate) fn backend_id(&self) -> &'static str {
        match self.kind {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAiCompatible => "openai_compatible",
        }
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(api_key) => request.bearer_auth(api_key),
            None => request,
        }
    }

    async fn embed_chunk(&self, chunk: &[String]) -> Result<Vec<Vec<f32>>, AiError> {
        match self.kind {
            ProviderKind::Ollama => self.embed_ollama(chunk).await,
            ProviderKind::OpenAiCompatible => self.embed_openai(chunk).await,
        }
    }

    async fn embed_openai(&self, chunk: &[String]) -> Result<Vec<Vec<f32>>, AiError> {
        let url = openai_compatible_endpoint(&self.base_url, "/embeddings")?;
        let body = OpenAiEmbeddingsRequest {
            model: &self.model,
            input: chunk,
        };

        let response = self
            .authorize(self.client.post(url))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let parsed: OpenAiEmbeddingsResponse = response.json().await?;
        if parsed.data.len() != chunk.len() {
            return Err(AiError::UnexpectedResponse(format!(
                "expected {} embeddings, got {}",
                chunk.len(),
                parsed.data.len()
            )));
        }

        // The index field, not response order, is authoritative.
        let mut data = parsed.data;
        data.sort_by_key(|item| item.index);
        for (expected, item) in data.iter().enumerate() {
            if item.index != expected {
                return Err(AiError::UnexpectedResponse(format!(
                    "embedding indexes are not contiguous: missing index {expected}"
                )));
            }
            if item.embedding.is_empty() {
                return Err(AiError::UnexpectedResponse(
                    "provider returned empty embedding vector".into(),
                ));
            }
        }

        Ok(data.into_iter().map(|item| item.embedding).collect())
    }

    async fn embed_ollama(&self, chunk: &[String]) -> Result<Vec<Vec<f32>>, AiError> {
        let url = ollama_endpoint(&self.base_url, "/api/embed")?;
        let body = OllamaEmbedRequest {
            model: &self.model,
            input: chunk,
        };

        let response = self
            .authorize(self.client.post(url))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let parsed: OllamaEmbedResponse = response.json().await?;
        if let Some(embeddings) = parsed.embeddings {
            if embeddings.len() != chunk.len() {
                return Err(AiError::UnexpectedResponse(format!(
                    "expected {} embeddings, got {}",
                    chunk.len(),
                    embeddings.len()
                )));
            }
            if embeddings.iter().any(|embedding| embedding.is_empty()) {
                return Err(AiError::UnexpectedResponse(
                    "ollama returned empty embedding vector".into(),
                ));
            }
            return Ok(embeddings);
        }

        if let Some(embedding) = parsed.embedding {
            if chunk.len() != 1 {
                return Err(AiError::UnexpectedResponse(
                    "ollama returned single embedding for batch request".into(),
                ));
            }
            if embedding.is_empty() {
                return Err(AiError::UnexpectedResponse(
                    "ollama returned empty embedding vector".into(),
                ));
            }
            return Ok(vec![embedding]);
        }

        Err(AiError::UnexpectedResponse(
            "missing embeddings in response".into(),
        ))
    }
}

#[async_trait]
impl EmbeddingsClient for ProviderEmbeddings {
    async fn embed(
        &self,
        input: &[String],
        cancel: CancellationToken,
    ) -> Result<Vec<Vec<f32>>, AiError> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let fut = async {
            let mut out = Vec::with_capacity(input.len());
            for chunk in input.chunks(self.batch_size) {
                out.extend(self.embed_chunk(chunk).await?);
            }
            Ok::<_, AiError>(out)
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(AiError::Cancelled),
            res = fut => res,
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingsResponse {
    data: Vec<OpenAiEmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embeddings: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}
