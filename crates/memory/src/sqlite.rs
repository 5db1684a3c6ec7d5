//! SQLite context store.
//!
//! A single table, `message_contexts`, holds every message ever recorded.
//! Rows are only inserted; the creation timestamp is assigned by SQLite with
//! millisecond precision and ties are broken by the autoincrement id.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use complimenter_core::error::MemoryError;
use complimenter_core::memory::ContextStore;
use complimenter_core::message::{MessageRecord, Role};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// A durable, file-backed context store.
pub struct SqliteContextStore {
    pool: SqlitePool,
}

impl SqliteContextStore {
    /// Open (or create) the database file at `path`.
    ///
    /// The parent directory is created if it does not exist yet.
    pub async fn open(path: &Path) -> Result<Self, MemoryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!(
                    "Failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("Database initialized at {}", path.display());
        Ok(store)
    }

    /// An in-process ephemeral database (useful for tests).
    pub async fn in_memory() -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite url: {e}")))?;

        // Every connection to :memory: is its own database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        Self::from_pool(pool).await
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, MemoryError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create the table and its index.
    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS message_contexts (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id    TEXT NOT NULL,
                role       TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("message_contexts table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_message_contexts_user_id ON message_contexts(user_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("user_id index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Parse a `MessageRecord` from a SQLite row.
    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<MessageRecord, MemoryError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| MemoryError::QueryFailed(format!("id column: {e}")))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| MemoryError::QueryFailed(format!("user_id column: {e}")))?;
        let role: String = row
            .try_get("role")
            .map_err(|e| MemoryError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| MemoryError::QueryFailed(format!("content column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| MemoryError::QueryFailed(format!("created_at column: {e}")))?;

        let created_at = NaiveDateTime::parse_from_str(&created_at_str, TIMESTAMP_FORMAT)
            .map(|dt| dt.and_utc())
            .map_err(|e| {
                MemoryError::QueryFailed(format!("created_at '{created_at_str}' of row {id}: {e}"))
            })?;

        Ok(MessageRecord {
            id,
            user_id,
            role: Role::parse(&role),
            content,
            created_at,
        })
    }
}

#[async_trait]
impl ContextStore for SqliteContextStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn record(&self, user_id: &str, role: Role, content: &str) -> Result<(), MemoryError> {
        sqlx::query("INSERT INTO message_contexts (user_id, role, content) VALUES (?1, ?2, ?3)")
            .bind(user_id)
            .bind(role.as_str())
            .bind(content)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("INSERT failed: {e}")))?;

        let preview: String = content.chars().take(100).collect();
        debug!(user_id, role = %role, content = %preview, "Saved message");
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<MessageRecord>, MemoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT id, user_id, role, content, created_at
            FROM message_contexts
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("Recent messages: {e}")))?;

        let mut records = rows
            .iter()
            .map(Self::row_to_record)
            .collect::<Result<Vec<_>, _>>()?;
        records.reverse();

        debug!(user_id, count = records.len(), "Fetched messages");
        Ok(records)
    }

    async fn count(&self, user_id: &str) -> Result<usize, MemoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM message_contexts WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("COUNT failed: {e}")))?;

        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| MemoryError::QueryFailed(format!("count column: {e}")))?;
        Ok(count as usize)
    }
}
