//! # Sentry Store - SQLite Backend
//!
//! SQLite implementation of the credential store boundary.
//!
//! The schema is bootstrapped at open; full migration tooling stays outside
//! the core, as does everything else about the relational layer.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use sentry_credential::HashRecord;
use sentry_store::{CredentialStore, StoreError, UserCredential};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id        INTEGER PRIMARY KEY,
    username       TEXT NOT NULL UNIQUE,
    password_hash  TEXT NOT NULL,
    verified       INTEGER NOT NULL DEFAULT 0,
    active         INTEGER NOT NULL DEFAULT 1,
    created_at     INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_username ON users (username);
"#;

/// Credential store backed by a SQLite database file.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqliteCredentialStore {
    /// Opens or creates the credential database under `base_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the connection
    /// fails, or the schema cannot be applied.
    pub async fn open(base_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base = base_path.as_ref();
        std::fs::create_dir_all(base)
            .map_err(|e| StoreError::Connection(format!("failed to create directory: {e}")))?;

        let db_path = base.join("users.db");
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        debug!(path = %db_path.display(), "opening credential database");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement.trim())
                .execute(&pool)
                .await
                .map_err(|e| StoreError::Connection(format!("schema bootstrap failed: {e}")))?;
        }

        info!("credential store ready");

        Ok(Self { pool, db_path })
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time before UNIX epoch")
            .as_secs() as i64
    }

    fn row_to_credential(row: (i64, String, String, bool, bool)) -> UserCredential {
        let (user_id, username, password_hash, verified, active) = row;
        UserCredential {
            user_id: user_id as u64,
            username,
            password_hash: HashRecord::from_phc_string(password_hash),
            verified,
            active,
        }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get_credential(&self, user_id: u64) -> Result<Option<UserCredential>, StoreError> {
        let row: Option<(i64, String, String, bool, bool)> = sqlx::query_as(
            "SELECT user_id, username, password_hash, verified, active FROM users WHERE user_id = ?",
        )
        .bind(user_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(row.map(Self::row_to_credential))
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<UserCredential>, StoreError> {
        let row: Option<(i64, String, String, bool, bool)> = sqlx::query_as(
            "SELECT user_id, username, password_hash, verified, active FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(row.map(Self::row_to_credential))
    }

    async fn put_credential(&self, credential: UserCredential) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO users (user_id, username, password_hash, verified, active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(credential.user_id as i64)
        .bind(&credential.username)
        .bind(credential.password_hash.as_str())
        .bind(credential.verified)
        .bind(credential.active)
        .bind(Self::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::AlreadyExists(credential.username))
            }
            Err(e) => Err(StoreError::Query(e.to_string())),
        }
    }
}
