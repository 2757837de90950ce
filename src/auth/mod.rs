//! Users, bearer sessions and onboarding profiles.

pub mod password;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::core::config::AuthSettings;
use crate::core::errors::ApiError;
use crate::rag::types::{ExperienceLevel, UserProfile};
use password::{generate_token, hash_password, token_digest, verify_password};

const MAX_EMAIL_LEN: usize = 254;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: String,
}

/// Issued on signup and signin. `token` is shown once and stored only hashed.
#[derive(Debug, Clone, Serialize)]
pub struct AuthGrant {
    pub user: User,
    pub token: String,
    pub expires_at: String,
}

#[derive(Debug, Clone)]
pub struct AuthService {
    pool: SqlitePool,
    settings: AuthSettings,
}

impl AuthService {
    pub async fn new(pool: SqlitePool, settings: AuthSettings) -> Result<Self, ApiError> {
        let service = Self { pool, settings };
        service.init_db().await?;
        Ok(service)
    }

    async fn init_db(&self) -> Result<(), ApiError> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
            "CREATE TABLE IF NOT EXISTS auth_sessions (
                token_hash TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            )",
            "CREATE INDEX IF NOT EXISTS idx_auth_sessions_user_id ON auth_sessions(user_id)",
            "CREATE TABLE IF NOT EXISTS user_profiles (
                user_id TEXT PRIMARY KEY,
                software_experience TEXT NOT NULL,
                hardware_experience TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            )",
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(ApiError::internal)?;
        }
        Ok(())
    }

    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<AuthGrant, ApiError> {
        let email = normalize_email(email)?;
        if password.chars().count() < self.settings.min_password_length {
            return Err(ApiError::BadRequest(format!(
                "password must be at least {} characters",
                self.settings.min_password_length
            )));
        }
        let name = name.map(str::trim).filter(|n| !n.is_empty());

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(ApiError::internal)??;

        let user_id = Uuid::new_v4().to_string();
        let inserted = sqlx::query("INSERT INTO users (id, email, name, password_hash) VALUES (?1, ?2, ?3, ?4)")
            .bind(&user_id)
            .bind(&email)
            .bind(name)
            .bind(&password_hash)
            .execute(&self.pool)
            .await;
        if let Err(err) = inserted {
            if is_unique_violation(&err) {
                return Err(ApiError::Conflict("an account with this email already exists".to_string()));
            }
            return Err(ApiError::internal(err));
        }

        let user = self
            .find_user_by_id(&user_id)
            .await?
            .ok_or_else(|| ApiError::Internal("user vanished after insert".to_string()))?;
        tracing::info!("Registered user {}", user.id);
        self.issue_session(user).await
    }

    pub async fn signin(&self, email: &str, password: &str) -> Result<AuthGrant, ApiError> {
        let email = normalize_email(email).map_err(|_| ApiError::Unauthorized)?;
        let row = sqlx::query("SELECT id, email, name, created_at, password_hash FROM users WHERE email = ?1")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        let Some(row) = row else {
            return Err(ApiError::Unauthorized);
        };

        let stored_hash: String = row.try_get("password_hash").map_err(ApiError::internal)?;
        let password = password.to_string();
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
            .await
            .map_err(ApiError::internal)?;
        if !valid {
            return Err(ApiError::Unauthorized);
        }

        let user = user_from_row(&row).map_err(ApiError::internal)?;
        self.issue_session(user).await
    }

    /// Returns whether a session was actually removed.
    pub async fn signout(&self, token: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE token_hash = ?1")
            .bind(token_digest(token))
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(result.rows_affected() > 0)
    }

    /// Resolves a bearer token to its user. Expired sessions are deleted.
    pub async fn authenticate(&self, token: &str) -> Result<User, ApiError> {
        let digest = token_digest(token);
        let row = sqlx::query(
            "\
            SELECT u.id, u.email, u.name, u.created_at, s.expires_at
            FROM auth_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = ?1",
        )
        .bind(&digest)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;
        let Some(row) = row else {
            return Err(ApiError::Unauthorized);
        };

        let expires_at: i64 = row.try_get("expires_at").map_err(ApiError::internal)?;
        if expires_at <= Utc::now().timestamp() {
            sqlx::query("DELETE FROM auth_sessions WHERE token_hash = ?1")
                .bind(&digest)
                .execute(&self.pool)
                .await
                .map_err(ApiError::internal)?;
            return Err(ApiError::Unauthorized);
        }

        user_from_row(&row).map_err(ApiError::internal)
    }

    /// Deletes sessions past their expiry. Run once at startup.
    pub async fn purge_expired_sessions(&self) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= ?1")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(result.rows_affected())
    }

    /// Stored onboarding profile, or the all-intermediate default.
    pub async fn profile(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        let row = sqlx::query("SELECT software_experience, hardware_experience FROM user_profiles WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        let Some(row) = row else {
            return Ok(UserProfile::default());
        };
        let software: String = row.try_get("software_experience").map_err(ApiError::internal)?;
        let hardware: String = row.try_get("hardware_experience").map_err(ApiError::internal)?;
        Ok(UserProfile {
            software_experience: ExperienceLevel::parse(&software),
            hardware_experience: ExperienceLevel::parse(&hardware),
        })
    }

    pub async fn save_profile(&self, user_id: &str, profile: UserProfile) -> Result<UserProfile, ApiError> {
        sqlx::query(
            "\
            INSERT INTO user_profiles (user_id, software_experience, hardware_experience)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
                software_experience = excluded.software_experience,
                hardware_experience = excluded.hardware_experience,
                updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')",
        )
        .bind(user_id)
        .bind(profile.software_experience.as_str())
        .bind(profile.hardware_experience.as_str())
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;
        Ok(profile)
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, ApiError> {
        let row = sqlx::query("SELECT id, email, name, created_at FROM users WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(ApiError::internal)
    }

    async fn issue_session(&self, user: User) -> Result<AuthGrant, ApiError> {
        let token = generate_token();
        let expires = Utc::now() + Duration::hours(self.settings.session_expiry_hours);

        sqlx::query("INSERT INTO auth_sessions (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)")
            .bind(token_digest(&token))
            .bind(&user.id)
            .bind(expires.timestamp())
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(AuthGrant {
            user,
            token,
            expires_at: format_timestamp(expires),
        })
    }
}

fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    let valid = email.len() <= MAX_EMAIL_LEN
        && !email.chars().any(char::is_whitespace)
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'));
    if !valid {
        return Err(ApiError::bad_request("a valid email address is required"));
    }
    Ok(email)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}
