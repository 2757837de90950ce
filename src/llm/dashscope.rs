use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{bearer_headers, JsonClient};
use super::provider::{EmbeddingProvider, GenerationProvider, ProviderError};
use super::types::{ChatMessage, ChatRequest, SamplingParams};
use crate::core::config::BackendSettings;

const BACKEND: &str = "dashscope";
const EMBEDDING_PATH: &str = "services/embeddings/text-embedding/text-embedding";
const GENERATION_PATH: &str = "services/aigc/text-generation/generation";

/// Alibaba DashScope (Qwen) native text-embedding and text-generation services.
#[derive(Clone)]
pub struct DashScopeProvider {
    http: JsonClient,
    embedding_model: String,
    chat_model: String,
    dimension: usize,
    params: SamplingParams,
}

impl DashScopeProvider {
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
    input: EmbeddingInput<'a>,
    parameters: EmbeddingParameters,
}

#[derive(Serialize)]
struct EmbeddingInput<'a> {
    texts: [&'a str; 1],
}

#[derive(Serialize)]
struct EmbeddingParameters {
    text_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    output: EmbeddingOutput,
}

#[derive(Debug, Deserialize)]
struct EmbeddingOutput {
    #[serde(default)]
    embeddings: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    text_index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    fn into_vector(self) -> Result<Vec<f32>, ProviderError> {
        self.output
            .embeddings
            .into_iter()
            .min_by_key(|item| item.text_index)
            .map(|item| item.embedding)
            .ok_or(ProviderError::EmptyResponse(BACKEND))
    }
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    input: GenerationInput<'a>,
    parameters: GenerationParameters,
}

#[derive(Serialize)]
struct GenerationInput<'a> {
    messages: &'a [ChatMessage],
}

#[derive(Serialize)]
struct GenerationParameters {
    result_format: &'static str,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    output: GenerationOutput,
}

/// `message` result format fills `choices`; the legacy `text` format fills `text`.
#[derive(Debug, Deserialize)]
struct GenerationOutput {
    #[serde(default)]
    choices: Vec<GenerationChoice>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationChoice {
    message: ChatMessage,
}

impl GenerationResponse {
    fn into_text(self) -> Result<String, ProviderError> {
        let GenerationOutput { choices, text } = self.output;
        choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .or(text)
            .ok_or(ProviderError::EmptyResponse(BACKEND))
    }
}

#[async_trait]
impl EmbeddingProvider for DashScopeProvider {
    fn name(&self) -> &str {
        BACKEND
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn try_embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: EmbeddingInput { texts: [text] },
            parameters: EmbeddingParameters {
                text_type: "document",
            },
        };
        let response: EmbeddingResponse = self.http.post(EMBEDDING_PATH, &request).await?;
        response.into_vector()
    }
}

#[async_trait]
impl GenerationProvider for DashScopeProvider {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn try_generate(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let chat = ChatRequest::new(system, prompt, self.params);
        let request = GenerationRequest {
            model: &self.chat_model,
            input: GenerationInput {
                messages: &chat.messages,
            },
            parameters: GenerationParameters {
                result_format: "message",
                temperature: chat.temperature,
                max_tokens: chat.max_tokens,
            },
        };
        let response: GenerationResponse = self.http.post(GENERATION_PATH, &request).await?;
        response.into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embedding_output_is_unwrapped() {
        let response: EmbeddingResponse = serde_json::from_value(json!({
            "output": {
                "embeddings": [{ "text_index": 0, "embedding": [0.5, 0.25] }]
            },
            "usage": { "total_tokens": 3 },
            "request_id": "r-1"
        }))
        .unwrap();

        assert_eq!(response.into_vector().unwrap(), vec![0.5, 0.25]);
    }

    #[test]
    fn generation_accepts_message_and_text_formats() {
        let message: GenerationResponse = serde_json::from_value(json!({
            "output": {
                "choices": [{
                    "finish_reason": "stop",
                    "message": { "role": "assistant", "content": "Use rclpy." }
                }]
            }
        }))
        .unwrap();
        assert_eq!(message.into_text().unwrap(), "Use rclpy.");

        let text: GenerationResponse =
            serde_json::from_value(json!({ "output": { "text": "Use rclcpp." } })).unwrap();
        assert_eq!(text.into_text().unwrap(), "Use rclcpp.");

        let empty: GenerationResponse = serde_json::from_value(json!({ "output": {} })).unwrap();
        assert!(empty.into_text().is_err());
    }
}
