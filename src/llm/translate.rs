//! Plain text translation through the configured generation backend.
//!
//! Unlike question answering there is no sentinel fallback here: a backend
//! failure is surfaced to the caller as `ServiceUnavailable`.

use std::sync::Arc;

use serde::Serialize;

use super::provider::GenerationProvider;
use crate::core::errors::ApiError;

pub const DEFAULT_TARGET_LANGUAGE: &str = "Urdu";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Translation {
    pub translated_text: String,
    pub target_language: String,
}

#[derive(Clone)]
pub struct Translator {
    generator: Arc<dyn GenerationProvider>,
}

impl Translator {
    pub fn new(generator: Arc<dyn GenerationProvider>) -> Self {
        Self { generator }
    }

    /// Translates `text` into `target_language`, or Urdu when none is given.
    pub async fn translate(
        &self,
        text: &str,
        target_language: Option<&str>,
    ) -> Result<Translation, ApiError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ApiError::bad_request("text must not be empty"));
        }
        let language = target_language
            .map(str::trim)
            .filter(|language| !language.is_empty())
            .unwrap_or(DEFAULT_TARGET_LANGUAGE);

        let reply = self
            .generator
            .try_generate(&system_prompt(language), &user_prompt(language, text))
            .await
            .map_err(|err| {
                tracing::error!("Translation via {} failed: {}", self.generator.name(), err);
                ApiError::ServiceUnavailable
            })?;

        let translated = reply.trim();
        if translated.is_empty() {
            tracing::warn!("Translation via {} returned no text", self.generator.name());
            return Err(ApiError::ServiceUnavailable);
        }
        Ok(Translation {
            translated_text: translated.to_string(),
            target_language: language.to_string(),
        })
    }
}

fn system_prompt(language: &str) -> String {
    format!(
        "You are a helpful assistant that translates text into {}. \
         Reply with the translation only.",
        language
    )
}

fn user_prompt(language: &str, text: &str) -> String {
    format!("Translate the following text into {}:\n\n{}", language, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoGenerator {
        reply: Option<&'static str>,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl EchoGenerator {
        fn new(reply: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GenerationProvider for EchoGenerator {
        fn name(&self) -> &str {
            "echo"
        }

        async fn try_generate(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
            self.seen.lock().unwrap().push((system.to_string(), prompt.to_string()));
            self.reply
                .map(str::to_string)
                .ok_or(ProviderError::EmptyResponse("echo"))
        }
    }

    #[tokio::test]
    async fn defaults_to_urdu_and_sends_text_verbatim() {
        let generator = EchoGenerator::new(Some(" ایک نوڈ ایک عمل ہے۔ \n"));
        let translator = Translator::new(generator.clone());

        let translation = translator.translate("  A node is a process. ", None).await.unwrap();

        assert_eq!(translation.translated_text, "ایک نوڈ ایک عمل ہے۔");
        assert_eq!(translation.target_language, "Urdu");
        let seen = generator.seen.lock().unwrap();
        assert!(seen[0].0.contains("translates text into Urdu"));
        assert_eq!(seen[0].1, "Translate the following text into Urdu:\n\nA node is a process.");
    }

    #[tokio::test]
    async fn honors_requested_language() {
        let generator = EchoGenerator::new(Some("Un nodo es un proceso."));
        let translator = Translator::new(generator.clone());

        let translation = translator.translate("A node is a process.", Some(" Spanish ")).await.unwrap();

        assert_eq!(translation.target_language, "Spanish");
        assert!(generator.seen.lock().unwrap()[0].1.starts_with("Translate the following text into Spanish:"));
    }

    #[tokio::test]
    async fn blank_text_is_rejected_without_calling_the_backend() {
        let generator = EchoGenerator::new(Some("unused"));
        let translator = Translator::new(generator.clone());

        let result = translator.translate(" \n ", Some("French")).await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert!(generator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn backend_failure_is_unavailable() {
        let translator = Translator::new(EchoGenerator::new(None));
        assert!(matches!(
            translator.translate("Servo", None).await,
            Err(ApiError::ServiceUnavailable)
        ));

        let blank = Translator::new(EchoGenerator::new(Some("   ")));
        assert!(matches!(blank.translate("Servo", None).await, Err(ApiError::ServiceUnavailable)));
    }
}
