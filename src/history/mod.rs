//! Append-only chat log.
//!
//! One row per answered query. Rows are never updated; reads page backwards
//! from the newest entry and return oldest-first. `page_url` records which
//! book page the reader asked from, when the client sends it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::core::errors::ApiError;

const DEFAULT_LOG_LIMIT: i64 = 50;
const MAX_LOG_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    FullBook,
    SelectedText,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::FullBook => "full_book",
            QueryMode::SelectedText => "selected_text",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "selected_text" => QueryMode::SelectedText,
            _ => QueryMode::FullBook,
        }
    }
}

/// A log row to be written.
#[derive(Debug, Clone)]
pub struct ChatLogEntry {
    pub session_id: String,
    pub user_id: Option<String>,
    pub mode: QueryMode,
    pub book_id: Option<String>,
    pub page_url: Option<String>,
    pub query: String,
    pub response: String,
    pub source_chunks: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatLog {
    pub id: i64,
    pub session_id: String,
    pub user_id: Option<String>,
    pub mode: QueryMode,
    pub book_id: Option<String>,
    pub page_url: Option<String>,
    pub query: String,
    pub response: String,
    pub source_chunks: Value,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ChatLogStore {
    pool: SqlitePool,
}

impl ChatLogStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, ApiError> {
        let store = Self { pool };
        store.init_db().await?;
        Ok(store)
    }

    async fn init_db(&self) -> Result<(), ApiError> {
        sqlx::query(
            "\
            CREATE TABLE IF NOT EXISTS chat_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                user_id TEXT,
                mode TEXT NOT NULL CHECK(mode IN ('full_book', 'selected_text')),
                book_id TEXT,
                page_url TEXT,
                query TEXT NOT NULL,
                response TEXT NOT NULL,
                source_chunks TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        // tables created before page_url existed
        let has_page_url: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('chat_logs') WHERE name = 'page_url'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(ApiError::internal)?;
        if has_page_url == 0 {
            sqlx::query("ALTER TABLE chat_logs ADD COLUMN page_url TEXT")
                .execute(&self.pool)
                .await
                .map_err(ApiError::internal)?;
        }

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chat_logs_session_id_id ON chat_logs(session_id, id)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(())
    }

    /// Writes one row and returns its id.
    pub async fn append(&self, entry: &ChatLogEntry) -> Result<i64, ApiError> {
        let session_id = entry.session_id.trim();
        if session_id.is_empty() {
            return Err(ApiError::bad_request("session_id must not be empty"));
        }
        let source_chunks = serde_json::to_string(&entry.source_chunks).map_err(ApiError::internal)?;

        let result = sqlx::query(
            "INSERT INTO chat_logs (session_id, user_id, mode, book_id, page_url, query, response, source_chunks)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(session_id)
        .bind(entry.user_id.as_deref())
        .bind(entry.mode.as_str())
        .bind(entry.book_id.as_deref())
        .bind(entry.page_url.as_deref().map(str::trim).filter(|url| !url.is_empty()))
        .bind(&entry.query)
        .bind(&entry.response)
        .bind(source_chunks)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(result.last_insert_rowid())
    }

    /// The newest `limit` rows of a session, oldest first. With `user_id`,
    /// only that user's rows are returned.
    pub async fn list_by_session(
        &self,
        session_id: &str,
        user_id: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<ChatLog>, ApiError> {
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);

        let rows = sqlx::query(
            "\
            SELECT id, session_id, user_id, mode, book_id, page_url, query, response, source_chunks, created_at
            FROM chat_logs
            WHERE session_id = ?1 AND (?2 IS NULL OR user_id = ?2)
            ORDER BY id DESC
            LIMIT ?3",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut logs = rows
            .iter()
            .map(chat_log_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ApiError::internal)?;
        logs.reverse();
        Ok(logs)
    }

    pub async fn count_by_session(&self, session_id: &str) -> Result<i64, ApiError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM chat_logs WHERE session_id = ?1")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)
    }
}

fn chat_log_from_row(row: &SqliteRow) -> Result<ChatLog, sqlx::Error> {
    let mode: String = row.try_get("mode")?;
    let source_chunks: String = row.try_get("source_chunks")?;
    Ok(ChatLog {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        user_id: row.try_get("user_id")?,
        mode: QueryMode::parse(&mode),
        book_id: row.try_get("book_id")?,
        page_url: row.try_get("page_url")?,
        query: row.try_get("query")?,
        response: row.try_get("response")?,
        source_chunks: serde_json::from_str(&source_chunks).unwrap_or(Value::Array(Vec::new())),
        created_at: row.try_get("created_at")?,
    })
}
