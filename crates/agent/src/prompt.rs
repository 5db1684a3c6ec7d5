//! Prompt composition.
//!
//! A template is plain text with three placeholders: `{recipient}`,
//! `{category}` and `{context}`. The context is rendered as one
//! `role: content` line per message, or `Нет` when there is none.

use complimenter_core::category::Category;
use complimenter_core::message::ContextMessage;

/// Stand-in for an empty transcript.
pub const EMPTY_CONTEXT: &str = "Нет";

pub const DEFAULT_TEMPLATE: &str = "Ты — тёплый и искренний помощник. Придумай один короткий \
(1–2 предложения) персональный комплимент для девушки по имени {recipient}.\n\
Тип комплимента: {category}.\n\
Контекст последних сообщений:\n{context}\n\
Обращайся к {recipient} по имени, пиши по-русски, без кавычек и пояснений.";

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    recipient: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            recipient: recipient.into(),
        }
    }

    /// The built-in template addressed to `recipient`.
    pub fn with_default(recipient: impl Into<String>) -> Self {
        Self::new(DEFAULT_TEMPLATE, recipient)
    }

    pub fn render(&self, category: Category, context: &[ContextMessage]) -> String {
        self.template
            .replace("{recipient}", &self.recipient)
            .replace("{category}", category.as_str())
            .replace("{context}", &render_transcript(context))
    }
}

/// `role: content` lines, oldest first.
pub fn render_transcript(context: &[ContextMessage]) -> String {
    if context.is_empty() {
        return EMPTY_CONTEXT.to_string();
    }
    context
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_renders_placeholder() {
        let prompt = PromptTemplate::new("[{context}]", "Оля").render(Category::Character, &[]);
        assert_eq!(prompt, "[Нет]");
    }

    #[test]
    fn transcript_lines_in_order() {
        let context = vec![ContextMessage::user("привет"), ContextMessage::bot("здравствуй")];
        assert_eq!(render_transcript(&context), "user: привет\nbot: здравствуй");
    }

    #[test]
    fn default_template_fills_every_placeholder() {
        let prompt = PromptTemplate::with_default("Оля").render(
            Category::Achievements,
            &[ContextMessage::user("сдала экзамен")],
        );
        assert!(prompt.contains("Оля"));
        assert!(prompt.contains("achievements"));
        assert!(prompt.contains("user: сдала экзамен"));
        assert!(!prompt.contains('{'));
    }
}
