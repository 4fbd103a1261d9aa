use std::cmp::Ordering;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{embeddings::EmbeddingsClient, AiError};

/// A vocabulary label together with its embedding vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub label: String,
    pub vector: Vec<f32>,
}

/// One ranked match: a candidate label and its similarity to the query.
/// Higher scores are closer; cosine similarity lies in `[-1, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchResult {
    pub label: String,
    pub score: f32,
}

/// Ranking controls for [`SemanticMatcher::closest`].
#[derive(Clone, Debug, PartialEq)]
pub struct MatchOptions {
    /// Upper bound on returned results.
    pub max_results: usize,
    /// Drop results scoring below this similarity, if set.
    pub min_score: Option<f32>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_results: 10,
            min_score: None,
        }
    }
}

/// A fixed vocabulary with precomputed embedding vectors.
///
/// Built once (typically at process startup) and immutable afterwards, so
/// any number of concurrent queries can share it without locking. If the
/// vocabulary changes, build a fresh index and swap the whole thing.
#[derive(Clone, Debug)]
pub struct CandidateIndex {
    candidates: Vec<Candidate>,
}

impl CandidateIndex {
    /// Embed `labels` in one order-preserving batch call and freeze the
    /// result.
    pub async fn build(
        embeddings: &dyn EmbeddingsClient,
        labels: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<Self, AiError> {
        let vectors = embeddings.embed(&labels, cancel).await?;
        if vectors.len() != labels.len() {
            return Err(AiError::UnexpectedResponse(format!(
                "expected {} embeddings, got {}",
                labels.len(),
                vectors.len()
            )));
        }

        let candidates = labels
            .into_iter()
            .zip(vectors)
            .map(|(label, vector)| Candidate { label, vector })
            .collect();
        Ok(Self { candidates })
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Ranks a [`CandidateIndex`] against free-text queries.
///
/// Queries must be vectorized by the same capability that built the index;
/// vectors from different backends are not comparable.
pub struct SemanticMatcher {
    embeddings: Arc<dyn EmbeddingsClient>,
}

impl SemanticMatcher {
    pub fn new(embeddings: Arc<dyn EmbeddingsClient>) -> Self {
        Self { embeddings }
    }

    /// The single best match for `query`. Ties go to the earlier candidate.
    pub async fn best(
        &self,
        index: &CandidateIndex,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<MatchResult, AiError> {
        let scores = self.score(index, query, cancel).await?;

        let mut best = 0;
        for (idx, score) in scores.iter().enumerate().skip(1) {
            if *score > scores[best] {
                best = idx;
            }
        }

        Ok(MatchResult {
            label: index.candidates[best].label.clone(),
            score: scores[best],
        })
    }

    /// The ranked closest matches for `query`, best first.
    pub async fn closest(
        &self,
        index: &CandidateIndex,
        query: &str,
        options: &MatchOptions,
        cancel: CancellationToken,
    ) -> Result<Vec<MatchResult>, AiError> {
        let scores = self.score(index, query, cancel).await?;

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
        // Stable sort keeps equal scores in input order.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let min_score = options.min_score.unwrap_or(f32::NEG_INFINITY);
        Ok(ranked
            .into_iter()
            .filter(|(_, score)| *score >= min_score)
            .take(options.max_results)
            .map(|(idx, score)| MatchResult {
                label: index.candidates[idx].label.clone(),
                score,
            })
            .collect())
    }

    async fn score(
        &self,
        index: &CandidateIndex,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<f32>, AiError> {
        if index.is_empty() {
            return Err(AiError::InvalidConfig(
                "semantic match requires at least one candidate".into(),
            ));
        }

        let mut vectors = self
            .embeddings
            .embed(&[query.to_string()], cancel)
            .await?;
        let query_vector = vectors
            .pop()
            .ok_or_else(|| AiError::UnexpectedResponse("missing query embedding".into()))?;

        Ok(index
            .candidates
            .iter()
            .map(|candidate| cosine_similarity(&query_vector, &candidate.vector))
            .collect())
    }
}

/// Cosine similarity: the angle between two vectors, insensitive to their
/// magnitudes. Zero vectors score 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}
