use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthService;
use crate::core::config::{AppConfig, AppPaths, ConfigService, VectorStoreBackend};
use crate::core::db::open_pool;
use crate::core::errors::ApiError;
use crate::core::security::AdminKey;
use crate::history::ChatLogStore;
use crate::llm::{build_providers, ProviderSet, Translator};
use crate::rag::{IngestionPipeline, QdrantStore, RagEngine, SqliteVectorStore, VectorStore};

pub mod error;

use error::InitializationError;

/// Shared application state handed to every route.
///
/// Everything is constructed once in [`AppState::initialize`] and passed down
/// as `Arc` handles; nothing here is a global.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Arc<AppConfig>,
    pub admin_key: AdminKey,
    pub providers: ProviderSet,
    pub store: Arc<dyn VectorStore>,
    pub pipeline: IngestionPipeline,
    pub engine: RagEngine,
    pub translator: Translator,
    pub history: ChatLogStore,
    pub auth: AuthService,
}

impl AppState {
    /// Discovers paths and loads configuration from the default locations.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::new(paths.clone());
        Self::initialize_with(config).await
    }

    /// Builds the state in dependency order:
    /// 1. Load and validate configuration
    /// 2. Construct the embedding and generation providers
    /// 3. Open the application database (chat logs, users)
    /// 4. Connect the vector store
    /// 5. Wire the ingestion pipeline, the RAG engine and the translator
    pub async fn initialize_with(config: ConfigService) -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(config.paths().clone());
        let settings = config
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let providers =
            build_providers(&settings).map_err(|e| InitializationError::Providers(e.into()))?;

        let db_path = settings
            .database
            .path
            .clone()
            .unwrap_or_else(|| paths.db_path.clone());
        let pool = open_pool(&db_path, 8)
            .await
            .map_err(|e| InitializationError::Database(e.into()))?;
        let history = ChatLogStore::new(pool.clone())
            .await
            .map_err(|e| InitializationError::Database(e.into()))?;
        let auth = AuthService::new(pool, settings.auth)
            .await
            .map_err(|e| InitializationError::Database(e.into()))?;
        match auth.purge_expired_sessions().await {
            Ok(0) => {}
            Ok(purged) => tracing::info!("Purged {} expired sessions", purged),
            Err(err) => tracing::warn!("Could not purge expired sessions: {}", err),
        }

        let store = build_vector_store(&settings, &paths)
            .await
            .map_err(|e| InitializationError::VectorStore(e.into()))?;

        let collection = settings.vector_store.collection.clone();
        let pipeline = IngestionPipeline::new(
            providers.embedder.clone(),
            store.clone(),
            collection.clone(),
            settings.chunking,
            settings.ingest.extensions.clone(),
        )
        .map_err(|e| InitializationError::Config(e.into()))?;
        let engine = RagEngine::new(
            providers.embedder.clone(),
            providers.generator.clone(),
            store.clone(),
            collection,
            settings.retrieval,
        );
        let translator = Translator::new(providers.generator.clone());

        tracing::info!(
            "Initialized with {} provider ({} dimensions) and {} vector store",
            providers.kind.as_str(),
            providers.embedder.dimension(),
            store.name()
        );

        Ok(Arc::new(AppState {
            admin_key: AdminKey::new(settings.server.admin_key.clone()),
            paths,
            config,
            settings: Arc::new(settings),
            providers,
            store,
            pipeline,
            engine,
            translator,
            history,
            auth,
        }))
    }
}

async fn build_vector_store(
    settings: &AppConfig,
    paths: &AppPaths,
) -> Result<Arc<dyn VectorStore>, ApiError> {
    let vector = &settings.vector_store;
    match vector.backend {
        VectorStoreBackend::Qdrant => {
            let timeout = Duration::from_secs(settings.providers.timeout_secs.max(1));
            Ok(Arc::new(QdrantStore::new(vector, timeout)?))
        }
        VectorStoreBackend::Sqlite => {
            let store = match &vector.sqlite_path {
                Some(path) => SqliteVectorStore::with_path(path.clone()).await?,
                None => SqliteVectorStore::new(paths).await?,
            };
            Ok(Arc::new(store))
        }
    }
}
