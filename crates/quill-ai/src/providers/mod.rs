mod ollama;
mod openai_compatible;

pub use ollama::OllamaProvider;
pub use openai_compatible::OpenAiCompatibleProvider;

pub(crate) use ollama::ollama_endpoint;
pub(crate) use openai_compatible::openai_compatible_endpoint;

use async_trait::async_trait;
use quill_core::ChatRequest;
use tokio_util::sync::CancellationToken;

use crate::AiError;

/// A chat-capable language model backend.
///
/// The backend must honor the request's stop sequences (generation halts
/// exactly at a configured stop string) and should behave deterministically
/// at temperature 0. Implementations observe `cancel` cooperatively and
/// return [`AiError::Cancelled`] without yielding partial output.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(&self, request: ChatRequest, cancel: CancellationToken)
        -> Result<String, AiError>;
}
