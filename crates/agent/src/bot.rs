//! Bot frontend — turns channel events into replies.
//!
//! Every inbound message, every bot reply and a `requested_compliment_type`
//! marker per request are written to the context store. Only persistence
//! failures reach this layer; they are answered with an apology.

use crate::pipeline::ComplimentPipeline;
use complimenter_core::category::Category;
use complimenter_core::channel::{InboundEvent, InlineButton, Keyboard, OutboundMessage};
use complimenter_core::error::MemoryError;
use complimenter_core::memory::ContextStore;
use complimenter_core::message::Role;
use complimenter_core::provider::Compliment;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const GREETING: &str = "Привет! Я бот-генератор комплиментов. Отправь короткое сообщение — \
опиши ситуацию или настроение, и выбери тип комплимента, чтобы получить персональный комплимент.";
pub const CHOOSE_CATEGORY: &str = "Выбери тип комплимента:";
pub const MORE_PROMPT: &str = "Хочешь ещё?";
pub const APOLOGY: &str =
    "Упс, возникла ошибка при генерации комплимента. Попробуйте ещё раз позже.";

/// Callback payload prefix for category buttons.
pub const CALLBACK_PREFIX: &str = "type:";
/// Default number of context messages fed to the pipeline.
pub const DEFAULT_CONTEXT_LIMIT: usize = 2;

pub struct ComplimentBot {
    store: Arc<dyn ContextStore>,
    pipeline: Arc<ComplimentPipeline>,
    context_limit: usize,
}

impl ComplimentBot {
    pub fn new(store: Arc<dyn ContextStore>, pipeline: Arc<ComplimentPipeline>) -> Self {
        Self {
            store,
            pipeline,
            context_limit: DEFAULT_CONTEXT_LIMIT,
        }
    }

    pub fn with_context_limit(mut self, limit: usize) -> Self {
        self.context_limit = limit;
        self
    }

    pub fn store(&self) -> &Arc<dyn ContextStore> {
        &self.store
    }

    pub fn pipeline(&self) -> &Arc<ComplimentPipeline> {
        &self.pipeline
    }

    /// Handle one event and return the messages to send, in order.
    pub async fn handle(&self, event: InboundEvent) -> Vec<OutboundMessage> {
        match event {
            InboundEvent::Start { user_id, chat_id } => {
                self.remember(&user_id, Role::User, "/start").await;
                info!(user_id = %user_id, "Start");
                vec![OutboundMessage::text(chat_id, GREETING).with_keyboard(category_keyboard())]
            }
            InboundEvent::Text {
                user_id,
                chat_id,
                text,
            } => {
                self.remember(&user_id, Role::User, &text).await;
                vec![OutboundMessage::text(chat_id, CHOOSE_CATEGORY).with_keyboard(category_keyboard())]
            }
            InboundEvent::Callback {
                user_id,
                chat_id,
                data,
                ..
            } => {
                let Some(raw) = data.strip_prefix(CALLBACK_PREFIX) else {
                    debug!(user_id = %user_id, data = %data, "Ignoring unknown callback");
                    return Vec::new();
                };
                let category = Category::normalize(raw);

                let text = match self.compliment(&user_id, category).await {
                    Ok(compliment) => compliment.into_text(),
                    Err(e) => {
                        error!(user_id = %user_id, error = %e, "Generation failed");
                        APOLOGY.to_string()
                    }
                };
                self.remember(&user_id, Role::Bot, &text).await;

                vec![
                    OutboundMessage::text(chat_id.clone(), text),
                    OutboundMessage::text(chat_id, MORE_PROMPT).with_keyboard(follow_up_keyboard(category)),
                ]
            }
        }
    }

    /// Read the context window, log the request marker and produce.
    pub async fn compliment(
        &self,
        user_id: &str,
        category: Category,
    ) -> Result<Compliment, MemoryError> {
        let context = self.store.context_window(user_id, self.context_limit).await?;
        self.store
            .record(
                user_id,
                Role::System,
                &format!("requested_compliment_type:{category}"),
            )
            .await?;
        Ok(self.pipeline.produce(user_id, category, &context).await)
    }

    /// Produce from the stored context without writing anything.
    pub async fn preview(
        &self,
        user_id: &str,
        category: Category,
    ) -> Result<Compliment, MemoryError> {
        let context = self.store.context_window(user_id, self.context_limit).await?;
        Ok(self.pipeline.produce(user_id, category, &context).await)
    }

    async fn remember(&self, user_id: &str, role: Role, content: &str) {
        if let Err(e) = self.store.record(user_id, role, content).await {
            warn!(user_id, role = %role, error = %e, "Failed to save message");
        }
    }
}

/// The three category buttons.
pub fn category_keyboard() -> Keyboard {
    let button = |c: Category| InlineButton::new(c.label(), format!("{CALLBACK_PREFIX}{c}"));
    Keyboard::new(vec![
        vec![button(Category::Appearance), button(Category::Character)],
        vec![button(Category::Achievements)],
    ])
}

/// "One more" of the same category, or another one.
pub fn follow_up_keyboard(category: Category) -> Keyboard {
    Keyboard::new(vec![vec![
        InlineButton::new("Ещё один", format!("{CALLBACK_PREFIX}{category}")),
        InlineButton::new("Другой тип", format!("{CALLBACK_PREFIX}random")),
    ]])
}
