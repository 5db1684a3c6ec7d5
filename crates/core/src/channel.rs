//! Channel trait — the abstraction over chat platforms.
//!
//! A Channel connects the bot to a messaging platform (Telegram, CLI). It
//! turns platform updates into [`InboundEvent`]s and renders
//! [`OutboundMessage`]s, including inline keyboards, back to the platform.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;

/// An event delivered by a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    /// The `/start` command
    Start { user_id: String, chat_id: String },

    /// Any other text message
    Text {
        user_id: String,
        chat_id: String,
        text: String,
    },

    /// An inline button press
    Callback {
        user_id: String,
        chat_id: String,
        /// Platform id used to acknowledge the press
        callback_id: String,
        data: String,
    },
}

impl InboundEvent {
    pub fn user_id(&self) -> &str {
        match self {
            InboundEvent::Start { user_id, .. }
            | InboundEvent::Text { user_id, .. }
            | InboundEvent::Callback { user_id, .. } => user_id,
        }
    }

    pub fn chat_id(&self) -> &str {
        match self {
            InboundEvent::Start { chat_id, .. }
            | InboundEvent::Text { chat_id, .. }
            | InboundEvent::Callback { chat_id, .. } => chat_id,
        }
    }
}

/// One inline button: visible text plus the callback payload it sends back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: data.into(),
        }
    }
}

/// Rows of inline buttons attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { rows }
    }

    /// Every button, row by row.
    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.rows.iter().flatten()
    }
}

/// A reply the bot wants delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub chat_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<Keyboard>,
}

impl OutboundMessage {
    pub fn text(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// The core Channel trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "telegram", "cli").
    fn name(&self) -> &str;

    /// Start listening for incoming events.
    ///
    /// Returns a receiver that yields events. The channel handles polling
    /// internally.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<InboundEvent, ChannelError>>,
        ChannelError,
    >;

    /// Deliver a message.
    async fn send(&self, message: &OutboundMessage) -> std::result::Result<(), ChannelError>;

    /// Acknowledge a button press (if the platform requires it).
    async fn acknowledge(&self, _callback_id: &str) -> std::result::Result<(), ChannelError> {
        Ok(()) // No-op default
    }

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Health check — is the channel connected and operational?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}
