use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{bearer_headers, JsonClient};
use super::provider::{EmbeddingProvider, GenerationProvider, ProviderError};
use super::types::SamplingParams;
use crate::core::config::BackendSettings;

const BACKEND: &str = "cohere";

/// Cohere v1 `embed` and `chat`. System instructions travel as the `preamble`.
#[derive(Clone)]
pub struct CohereProvider {
    http: JsonClient,
    embedding_model: String,
    chat_model: String,
    dimension: usize,
    params: SamplingParams,
}

impl CohereProvider {
    pub fn new(
        api_key: &str,
        settings: &BackendSettings,
        params: SamplingParams,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self, ProviderError> {
        let http = JsonClient::new(
            BACKEND,
            &settings.base_url,
            bearer_headers(api_key)?,
            timeout,
            max_retries,
        )?;
        Ok(Self {
            http,
            embedding_model: settings.embedding_model.clone(),
            chat_model: settings.chat_model.clone(),
            dimension: settings.embedding_dimension,
            params,
        })
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: [&'a str; 1],
    model: &'a str,
    input_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Embeddings,
}

/// `embeddings` is a bare list by default and keyed by type when
/// `embedding_types` is requested.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Embeddings {
    Plain(Vec<Vec<f32>>),
    ByType { float: Vec<Vec<f32>> },
}

impl EmbedResponse {
    fn into_vector(self) -> Result<Vec<f32>, ProviderError> {
        let vectors = match self.embeddings {
            Embeddings::Plain(vectors) => vectors,
            Embeddings::ByType { float } => float,
        };
        vectors
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse(BACKEND))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    model: &'a str,
    preamble: &'a str,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl EmbeddingProvider for CohereProvider {
    fn name(&self) -> &str {
        BACKEND
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn try_embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let request = EmbedRequest {
            texts: [text],
            model: &self.embedding_model,
            input_type: "search_document",
        };
        let response: EmbedResponse = self.http.post("embed", &request).await?;
        response.into_vector()
    }
}

#[async_trait]
impl GenerationProvider for CohereProvider {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn try_generate(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let request = ChatRequest {
            message: prompt,
            model: &self.chat_model,
            preamble: system,
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
        };
        let response: ChatResponse = self.http.post("chat", &request).await?;
        response.text.ok_or(ProviderError::EmptyResponse(BACKEND))
    }
}
