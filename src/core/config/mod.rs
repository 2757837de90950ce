pub mod paths;
pub mod service;
pub mod settings;
pub mod validation;

pub use paths::AppPaths;
pub use service::ConfigService;
pub use settings::{
    AppConfig, AuthSettings, BackendSettings, ChunkingSettings, DatabaseSettings, IngestSettings,
    ProviderKind, ProviderSettings, RetrievalSettings, ServerSettings, VectorStoreBackend,
    VectorStoreSettings,
};
