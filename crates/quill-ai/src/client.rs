use std::sync::Arc;

use async_trait::async_trait;
use quill_core::ChatRequest;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::{
    config::{AiConfig, ProviderKind},
    providers::{ChatClient, OllamaProvider, OpenAiCompatibleProvider},
    AiError,
};

/// Chat capability front door: picks the configured provider and bounds the
/// number of in-flight backend calls.
///
/// `AiClient` itself holds no per-request state; a single instance is shared
/// by all concurrent suggestion requests in the process.
pub struct AiClient {
    provider: Arc<dyn ChatClient>,
    semaphore: Arc<Semaphore>,
    default_max_output_tokens: u32,
}

impl std::fmt::Debug for AiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiClient")
            .field("default_max_output_tokens", &self.default_max_output_tokens)
            .finish_non_exhaustive()
    }
}

impl AiClient {
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let provider: Arc<dyn ChatClient> = match config.provider.kind {
            ProviderKind::Ollama => Arc::new(OllamaProvider::new(
                config.provider.url.clone(),
                config.provider.model.clone(),
                config.provider.timeout,
            )?),
            ProviderKind::OpenAiCompatible => Arc::new(OpenAiCompatibleProvider::new(
                config.provider.url.clone(),
                config.provider.model.clone(),
                config.provider.timeout,
                config.provider.api_key.clone(),
            )?),
        };

        Self::with_provider(
            provider,
            config.provider.concurrency,
            config.provider.max_output_tokens,
        )
    }

    /// Wrap an already-built backend, e.g. a test double.
    pub fn with_provider(
        provider: Arc<dyn ChatClient>,
        concurrency: usize,
        default_max_output_tokens: u32,
    ) -> Result<Self, AiError> {
        if concurrency == 0 {
            return Err(AiError::InvalidConfig(
                "provider.concurrency must be >= 1".into(),
            ));
        }

        Ok(Self {
            provider,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            default_max_output_tokens,
        })
    }

    pub async fn chat(
        &self,
        mut request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<String, AiError> {
        if request.options.max_output_tokens.is_none() {
            request.options.max_output_tokens = Some(self.default_max_output_tokens);
        }

        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AiError::UnexpectedResponse("ai client shutting down".into()))?;

        self.provider.chat(request, cancel).await
    }
}

#[async_trait]
impl ChatClient for AiClient {
    async fn chat(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<String, AiError> {
        AiClient::chat(self, request, cancel).await
    }
}
