use std::sync::Arc;

use quill_core::CompletionRequest;
use tokio_util::sync::CancellationToken;

use crate::{
    client::AiClient,
    completion::CompletionEngine,
    config::AiConfig,
    embeddings::{embeddings_client_from_config, EmbeddingsClient},
    providers::ChatClient,
    semantic_match::{CandidateIndex, MatchOptions, MatchResult, SemanticMatcher},
    AiError,
};

/// The in-process lookup surface a host web layer calls into: inline
/// insertion suggestions for free-text fields, closest-match ranking for
/// constrained-choice fields.
///
/// One instance is shared by all concurrent requests; every method is safe
/// to call from any number of tasks at once.
pub struct SuggestionService {
    completions: CompletionEngine,
    embeddings: Arc<dyn EmbeddingsClient>,
    matcher: SemanticMatcher,
}

impl SuggestionService {
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let chat = Arc::new(AiClient::from_config(config)?);
        let embeddings = embeddings_client_from_config(config)?;
        Ok(Self::new(chat, embeddings))
    }

    /// Assemble a service from explicit capabilities, e.g. test doubles.
    pub fn new(chat: Arc<dyn ChatClient>, embeddings: Arc<dyn EmbeddingsClient>) -> Self {
        Self {
            completions: CompletionEngine::new(chat),
            matcher: SemanticMatcher::new(embeddings.clone()),
            embeddings,
        }
    }

    /// Suggest an inline insertion for a free-text field, or `""` when the
    /// model declines.
    pub async fn insertion_suggestion(
        &self,
        request: &CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<String, AiError> {
        self.completions.suggest(request, cancel).await
    }

    /// Embed a constrained-choice field's vocabulary. Call once per
    /// vocabulary at startup and share the index across requests.
    pub async fn build_index(
        &self,
        labels: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<CandidateIndex, AiError> {
        CandidateIndex::build(self.embeddings.as_ref(), labels, cancel).await
    }

    /// The single closest vocabulary entry for `query`.
    pub async fn best_match(
        &self,
        index: &CandidateIndex,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<MatchResult, AiError> {
        self.matcher.best(index, query, cancel).await
    }

    /// The ranked closest vocabulary entries for `query`.
    pub async fn closest_matches(
        &self,
        index: &CandidateIndex,
        query: &str,
        options: &MatchOptions,
        cancel: CancellationToken,
    ) -> Result<Vec<MatchResult>, AiError> {
        self.matcher.closest(index, query, options, cancel).await
    }
}
