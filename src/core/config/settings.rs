//! Typed view over the merged YAML configuration.
//!
//! Every section has serde defaults so an empty `config.yml` yields a usable
//! development setup; only provider credentials are required at startup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub providers: ProviderSettings,
    pub vector_store: VectorStoreSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub ingest: IngestSettings,
    pub auth: AuthSettings,
    pub database: DatabaseSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub admin_key: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_allowed_origins: vec!["*".to_string()],
            admin_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    #[serde(alias = "open_ai")]
    OpenAi,
    Cohere,
    #[serde(alias = "qwen")]
    DashScope,
}

impl ProviderKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "openai" | "open_ai" => Some(Self::OpenAi),
            "cohere" => Some(Self::Cohere),
            "dashscope" | "qwen" => Some(Self::DashScope),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Cohere => "cohere",
            Self::DashScope => "dashscope",
        }
    }
}

/// Connection settings for one hosted model API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub chat_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub openai: BackendSettings,
    pub cohere: BackendSettings,
    pub dashscope: BackendSettings,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::OpenAi,
            timeout_secs: 30,
            max_retries: 2,
            temperature: 0.3,
            max_tokens: 1000,
            openai: BackendSettings {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: None,
                embedding_model: "text-embedding-ada-002".to_string(),
                embedding_dimension: 1536,
                chat_model: "gpt-4o-mini".to_string(),
            },
            cohere: BackendSettings {
                base_url: "https://api.cohere.ai/v1".to_string(),
                api_key: None,
                embedding_model: "embed-multilingual-v3.0".to_string(),
                embedding_dimension: 1024,
                chat_model: "command-r-plus".to_string(),
            },
            dashscope: BackendSettings {
                base_url: "https://dashscope.aliyuncs.com/api/v1".to_string(),
                api_key: None,
                embedding_model: "text-embedding-v1".to_string(),
                embedding_dimension: 1024,
                chat_model: "qwen-max".to_string(),
            },
        }
    }
}

impl ProviderSettings {
    pub fn active(&self) -> &BackendSettings {
        match self.kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Cohere => &self.cohere,
            ProviderKind::DashScope => &self.dashscope,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreBackend {
    #[default]
    Qdrant,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    pub backend: VectorStoreBackend,
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    /// Only used by the SQLite backend; defaults to `<data dir>/vectors.db`.
    pub sqlite_path: Option<PathBuf>,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            backend: VectorStoreBackend::Qdrant,
            url: "http://localhost:6333".to_string(),
            api_key: None,
            collection: "hackathon_book_docs".to_string(),
            sqlite_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub min_score: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub extensions: Vec<String>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            extensions: vec!["md".to_string(), "mdx".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub session_expiry_hours: i64,
    pub min_password_length: usize,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_expiry_hours: 24,
            min_password_length: 8,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Defaults to `<data dir>/book_rag.db`.
    pub path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.providers.kind, ProviderKind::OpenAi);
        assert_eq!(config.providers.active().embedding_dimension, 1536);
        assert_eq!(config.vector_store.collection, "hackathon_book_docs");
    }

    #[test]
    fn provider_kind_accepts_aliases() {
        let config: AppConfig = serde_yaml::from_str("providers:\n  kind: qwen\n").unwrap();
        assert_eq!(config.providers.kind, ProviderKind::DashScope);
        assert_eq!(config.providers.active().embedding_dimension, 1024);
        assert_eq!(ProviderKind::parse("Cohere"), Some(ProviderKind::Cohere));
        assert_eq!(ProviderKind::parse("llama"), None);
    }
}
