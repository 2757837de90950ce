use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{bearer_headers, JsonClient};
use super::provider::{EmbeddingProvider, GenerationProvider, ProviderError};
use super::types::{ChatMessage, ChatRequest, SamplingParams};
use crate::core::config::BackendSettings;

const BACKEND: &str = "openai";

/// OpenAI-compatible embeddings and chat completions.
#[derive(Clone)]
pub struct OpenAiProvider {
    http: JsonClient,
    embedding_model: String,
    chat_model: String,
    dimension: usize,
    params: SamplingParams,
}

impl OpenAiProvider {
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
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl EmbeddingResponse {
    fn into_vector(mut self) -> Result<Vec<f32>, ProviderError> {
        self.data.sort_by_key(|entry| entry.index);
        self.data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or(ProviderError::EmptyResponse(BACKEND))
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    fn into_text(self) -> Result<String, ProviderError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ProviderError::EmptyResponse(BACKEND))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn name(&self) -> &str {
        BACKEND
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn try_embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: [text],
        };
        let response: EmbeddingResponse = self.http.post("embeddings", &request).await?;
        response.into_vector()
    }
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn try_generate(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let chat = ChatRequest::new(system, prompt, self.params);
        let request = CompletionRequest {
            model: &self.chat_model,
            messages: &chat.messages,
            temperature: chat.temperature,
            max_tokens: chat.max_tokens,
            stream: false,
        };
        let response: CompletionResponse = self.http.post("chat/completions", &request).await?;
        response.into_text()
    }
}
