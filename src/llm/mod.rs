pub mod cohere;
pub mod dashscope;
pub mod factory;
pub mod http;
pub mod openai;
pub mod provider;
pub mod translate;
pub mod types;

pub use factory::{build_providers, ProviderSet};
pub use provider::{is_zero_vector, EmbeddingProvider, GenerationProvider, ProviderError};
pub use translate::{Translation, Translator};
pub use types::{ChatMessage, ChatRequest, SamplingParams};
