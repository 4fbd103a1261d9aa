//! `quill-ai` augments text-input UI with model-backed suggestions.
//!
//! Two independent pipelines share one shape (build a deterministic
//! scaffold, invoke an external model capability, sanitize the output):
//!
//! - [`CompletionEngine`] turns cursor-context text into a bounded inline
//!   insertion suggestion via a [`ChatClient`].
//! - [`SemanticMatcher`] ranks a fixed [`CandidateIndex`] vocabulary
//!   against a free-text query via an [`EmbeddingsClient`].
//!
//! Both capabilities are traits with production HTTP providers
//! ([`OllamaProvider`], [`OpenAiCompatibleProvider`]) and deterministic
//! local stand-ins ([`HashEmbedder`]), so every pipeline is testable
//! without a live model backend. [`SuggestionService`] bundles the two
//! pipelines for a host application layer.

mod client;
mod completion;
mod config;
mod embeddings;
mod error;
mod providers;
mod semantic_match;
mod service;

pub use client::AiClient;
pub use completion::CompletionEngine;
pub use config::{AiConfig, EmbeddingsBackend, EmbeddingsConfig, ProviderConfig, ProviderKind};
pub use embeddings::{
    embeddings_client_from_config, CachedEmbeddings, EmbeddingsClient, HashEmbedder,
    ProviderEmbeddings,
};
pub use error::AiError;
pub use providers::{ChatClient, OllamaProvider, OpenAiCompatibleProvider};
pub use semantic_match::{Candidate, CandidateIndex, MatchOptions, MatchResult, SemanticMatcher};
pub use service::SuggestionService;
