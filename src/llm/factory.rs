use std::sync::Arc;
use std::time::Duration;

use super::cohere::CohereProvider;
use super::dashscope::DashScopeProvider;
use super::openai::OpenAiProvider;
use super::provider::{EmbeddingProvider, GenerationProvider, ProviderError};
use super::types::SamplingParams;
use crate::core::config::{AppConfig, ProviderKind};

/// The embedding and generation handles shared by ingestion and querying.
#[derive(Clone)]
pub struct ProviderSet {
    pub kind: ProviderKind,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn GenerationProvider>,
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("kind", &self.kind)
            .field("dimension", &self.embedder.dimension())
            .finish()
    }
}

/// Builds the configured backend. A missing API key is an error.
pub fn build_providers(config: &AppConfig) -> Result<ProviderSet, ProviderError> {
    let settings = &config.providers;
    let kind = settings.kind;
    let backend = settings.active();
    let api_key = backend
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            ProviderError::InvalidConfig(format!(
                "providers.{}.api_key is not set",
                kind.as_str()
            ))
        })?;

    let params = SamplingParams::from(settings);
    let timeout = Duration::from_secs(settings.timeout_secs);
    let retries = settings.max_retries;

    let set = match kind {
        ProviderKind::OpenAi => {
            let provider = Arc::new(OpenAiProvider::new(api_key, backend, params, timeout, retries)?);
            ProviderSet {
                kind,
                embedder: provider.clone(),
                generator: provider,
            }
        }
        ProviderKind::Cohere => {
            let provider = Arc::new(CohereProvider::new(api_key, backend, params, timeout, retries)?);
            ProviderSet {
                kind,
                embedder: provider.clone(),
                generator: provider,
            }
        }
        ProviderKind::DashScope => {
            let provider =
                Arc::new(DashScopeProvider::new(api_key, backend, params, timeout, retries)?);
            ProviderSet {
                kind,
                embedder: provider.clone(),
                generator: provider,
            }
        }
    };

    tracing::info!(
        "Using {} provider ({} dimensions, chat model {})",
        kind.as_str(),
        set.embedder.dimension(),
        backend.chat_model
    );
    Ok(set)
}
