//! Shared SQLite pool setup.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use super::errors::ApiError;

/// Opens (creating if missing) a WAL-mode SQLite database with foreign keys on.
pub async fn open_pool(db_path: &Path, max_connections: u32) -> Result<SqlitePool, ApiError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(ApiError::internal)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .map_err(ApiError::internal)
}
