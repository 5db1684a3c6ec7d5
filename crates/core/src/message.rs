//! Message records — the append-only chat history kept per user.
//!
//! User sends a message → frontend records it → pipeline reads the most recent
//! records as context → frontend records the bot's reply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person chatting with the bot
    User,
    /// A reply produced by the bot
    Bot,
    /// Internal markers (e.g. which category was requested)
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Bot => "bot",
            Role::System => "system",
        }
    }

    /// Parse a stored role. Unknown values are treated as `System` so that a
    /// hand-edited database never breaks context retrieval.
    pub fn parse(s: &str) -> Self {
        match s {
            "user" => Role::User,
            "bot" => Role::Bot,
            _ => Role::System,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted message. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Store-assigned, monotonically increasing id
    pub id: i64,

    /// Opaque platform user identifier
    pub user_id: String,

    pub role: Role,

    pub content: String,

    /// Assigned by the store at write time
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Project the record onto what the pipeline needs.
    pub fn to_context(&self) -> ContextMessage {
        ContextMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A `{role, content}` pair fed to the compliment pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: Role,
    pub content: String,
}

impl ContextMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(Role::Bot, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

impl From<MessageRecord> for ContextMessage {
    fn from(record: MessageRecord) -> Self {
        Self {
            role: record.role,
            content: record.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_roundtrips_through_str() {
        for role in [Role::User, Role::Bot, Role::System] {
            assert_eq!(Role::parse(role.as_str()), role);
        }
        assert_eq!(Role::parse("assistant"), Role::System);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Bot).unwrap();
        assert_eq!(json, "\"bot\"");
    }

    #[test]
    fn record_projects_to_context() {
        let record = MessageRecord {
            id: 7,
            user_id: "42".into(),
            role: Role::User,
            content: "hello".into(),
            created_at: Utc::now(),
        };
        assert_eq!(record.to_context(), ContextMessage::user("hello"));
    }
}
