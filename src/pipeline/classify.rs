//! Embedding classifier: score text spans against a fixed target concept.
//!
//! The classifier wraps any [`Embedder`] and adds three guarantees the title
//! detector relies on:
//!
//! * **Empty input is rejected** before it reaches the model. A blank block
//!   yields a degenerate vector.
//! * **Calls are serialised** per classifier. Local embedding models are not
//!   necessarily reentrant, so every `embed` goes through one async mutex.
//! * **The concept anchor is computed once** ([`EmbeddingClassifier::anchor`])
//!   and then reused for every block of every page.
//!
//! The classifier is an ordinary value constructed by the caller and passed
//! into the detector; there is no process-wide model instance.

use crate::error::EmbeddingError;
use crate::pipeline::layout::normalize_text;
use async_trait::async_trait;
use edgequake_llm::{EmbeddingProvider, ProviderFactory};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Anything that can turn text into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one piece of (already normalised, non-empty) text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Short human-readable name used in logs.
    fn name(&self) -> &str;
}

/// [`Embedder`] backed by an `edgequake-llm` embedding provider.
pub struct LlmEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
}

impl LlmEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    /// Auto-detect an embedding provider from the environment
    /// (`OPENAI_API_KEY`, `GEMINI_API_KEY`, `OLLAMA_HOST`, …).
    pub fn from_env() -> Result<Self, EmbeddingError> {
        let (_llm, embedding) = ProviderFactory::from_env().map_err(|e| {
            EmbeddingError::ModelUnavailable(format!(
                "No embedding provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY or run a local Ollama server.\n\
                Error: {}",
                e
            ))
        })?;
        Ok(Self::new(embedding))
    }
}

#[async_trait]
impl Embedder for LlmEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self
            .provider
            .embed(&[text.to_string()])
            .await
            .map_err(|e| EmbeddingError::Provider(e.to_string()))?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Provider("provider returned no vectors".into()))
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

/// The Concept Embedding: the classification anchor for one detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptAnchor {
    concept: String,
    vector: Vec<f32>,
}

impl ConceptAnchor {
    pub fn concept(&self) -> &str {
        &self.concept
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }
}

/// Serialised, validating front-end over an [`Embedder`].
pub struct EmbeddingClassifier {
    embedder: Arc<dyn Embedder>,
    gate: Mutex<()>,
}

impl fmt::Debug for EmbeddingClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingClassifier")
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

impl EmbeddingClassifier {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            gate: Mutex::new(()),
        }
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    /// Embed `text` after whitespace normalisation.
    ///
    /// # Errors
    /// [`EmbeddingError::EmptyInput`] when nothing is left after
    /// normalisation; [`EmbeddingError::ZeroVector`] when the model returns a
    /// vector with no magnitude; provider failures otherwise.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = normalize_text(text);
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let vector = {
            let _guard = self.gate.lock().await;
            self.embedder.embed(&text).await?
        };

        if vector.iter().all(|v| *v == 0.0) {
            return Err(EmbeddingError::ZeroVector);
        }
        Ok(vector)
    }

    /// Compute the concept anchor. Call once per detection pass.
    pub async fn anchor(&self, concept: &str) -> Result<ConceptAnchor, EmbeddingError> {
        let vector = self.embed(concept).await?;
        debug!(
            "Concept anchor '{}' → {} dimensions via {}",
            concept,
            vector.len(),
            self.embedder.name()
        );
        Ok(ConceptAnchor {
            concept: normalize_text(concept),
            vector,
        })
    }

    /// Similarity between `text` and the anchor.
    pub async fn score(&self, anchor: &ConceptAnchor, text: &str) -> Result<f32, EmbeddingError> {
        let vector = self.embed(text).await?;
        similarity(&vector, anchor.vector())
    }
}

/// Cosine similarity (`1 - cosine_distance`), in `[-1, 1]`.
///
/// Accumulates in `f64` so scores near the threshold do not flip with the
/// summation order of long vectors.
pub fn similarity(a: &[f32], b: &[f32]) -> Result<f32, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let (mut dot, mut norm_a, mut norm_b) = (0f64, 0f64, 0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(EmbeddingError::ZeroVector);
    }

    let cos = dot / (norm_a.sqrt() * norm_b.sqrt());
    Ok(cos.clamp(-1.0, 1.0) as f32)
}
