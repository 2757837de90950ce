use async_trait::async_trait;
use thiserror::Error;

use crate::rag::grounding::SENTINEL_ANSWER;

/// Backend failures. They never cross the provider boundary: `embed` turns
/// them into a zero vector and `generate` into the sentinel answer, but they
/// are logged with this type so the cause stays visible.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{backend} returned {status}: {body}")]
    Status {
        backend: &'static str,
        status: u16,
        body: String,
    },
    #[error("failed to decode {backend} response: {message}")]
    Decode {
        backend: &'static str,
        message: String,
    },
    #[error("expected a {expected}-dimensional embedding, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("{0} returned an empty response")]
    EmptyResponse(&'static str),
    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    async fn try_embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Never fails: any error or wrong-length response yields a zero vector
    /// of `dimension()` length.
    async fn embed(&self, text: &str) -> Vec<f32> {
        let expected = self.dimension();
        let result = self.try_embed(text).await.and_then(|vector| {
            if vector.len() == expected {
                Ok(vector)
            } else {
                Err(ProviderError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                })
            }
        });

        match result {
            Ok(vector) => vector,
            Err(err) => {
                tracing::warn!("Embedding via {} failed, using zero vector: {}", self.name(), err);
                vec![0.0; expected]
            }
        }
    }
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    /// `system` is sent verbatim as the system instructions.
    async fn try_generate(&self, system: &str, prompt: &str) -> Result<String, ProviderError>;

    /// Trimmed answer, or the sentinel answer when the backend fails.
    async fn generate(&self, system: &str, prompt: &str) -> String {
        match self.try_generate(system, prompt).await {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) => {
                tracing::warn!("Generation via {} returned no text", self.name());
                SENTINEL_ANSWER.to_string()
            }
            Err(err) => {
                tracing::warn!("Generation via {} failed: {}", self.name(), err);
                SENTINEL_ANSWER.to_string()
            }
        }
    }
}

/// An all-zero vector marks a failed embedding.
pub fn is_zero_vector(vector: &[f32]) -> bool {
    vector.iter().all(|value| *value == 0.0)
}
