//! ContextStore trait — persistent per-user chat history.
//!
//! The store is append-only: records are never updated or deleted. Reads
//! return a bounded window of the most recent records, oldest first.

use async_trait::async_trait;
use crate::error::MemoryError;
use crate::message::{ContextMessage, MessageRecord, Role};

/// The core ContextStore trait.
///
/// Implementations: SQLite, in-memory (for testing and ephemeral sessions).
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Append a message for a user.
    async fn record(
        &self,
        user_id: &str,
        role: Role,
        content: &str,
    ) -> std::result::Result<(), MemoryError>;

    /// The `limit` most recent records for a user, oldest first.
    async fn recent(
        &self,
        user_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<MessageRecord>, MemoryError>;

    /// Total number of records stored for a user.
    async fn count(&self, user_id: &str) -> std::result::Result<usize, MemoryError>;

    /// Convenience: the context window projected to `{role, content}` pairs.
    async fn context_window(
        &self,
        user_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<ContextMessage>, MemoryError> {
        Ok(self
            .recent(user_id, limit)
            .await?
            .into_iter()
            .map(ContextMessage::from)
            .collect())
    }
}
