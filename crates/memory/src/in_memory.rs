//! In-memory context store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use complimenter_core::error::MemoryError;
use complimenter_core::memory::ContextStore;
use complimenter_core::message::{MessageRecord, Role};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A context store that keeps every record in a Vec, in write order.
pub struct InMemoryContextStore {
    records: Arc<RwLock<Vec<MessageRecord>>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    fn name(&self) -> &str { "in_memory" }

    async fn record(&self, user_id: &str, role: Role, content: &str) -> Result<(), MemoryError> {
        let mut records = self.records.write().await;
        // Id and timestamp are assigned under the write lock so both follow write order.
        let id = records.len() as i64 + 1;
        records.push(MessageRecord {
            id,
            user_id: user_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<MessageRecord>, MemoryError> {
        let records = self.records.read().await;
        let mut window: Vec<MessageRecord> = records
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .take(limit)
            .cloned()
            .collect();
        window.reverse();
        Ok(window)
    }

    async fn count(&self, user_id: &str) -> Result<usize, MemoryError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .count())
    }
}
