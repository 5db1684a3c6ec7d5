//! Rule-based responder — the last tier, which cannot fail.
//!
//! One fixed sentence per category plus a default, addressed to the
//! recipient. An exam mentioned anywhere in the context adds a reassurance.

use complimenter_core::category::Category;
use complimenter_core::message::ContextMessage;

/// Appended when the context mentions an exam.
pub const EXAM_REASSURANCE: &str = " Уверена, ты отлично справишься с экзаменом.";

/// Lowercase substrings that count as an exam mention.
const EXAM_MARKERS: [&str; 2] = ["exam", "экзам"];

pub const DEFAULT_RECIPIENT: &str = "Оля";

#[derive(Debug, Clone)]
pub struct RuleBasedResponder {
    recipient: String,
}

impl Default for RuleBasedResponder {
    fn default() -> Self {
        Self::new(DEFAULT_RECIPIENT)
    }
}

impl RuleBasedResponder {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
        }
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// The sentence for `category`, with the exam clause when it applies.
    pub fn respond(&self, category: Category, context: &[ContextMessage]) -> String {
        let mut text = self.sentence(category);
        if mentions_exam(context) {
            text.push_str(EXAM_REASSURANCE);
        }
        text
    }

    fn sentence(&self, category: Category) -> String {
        let name = &self.recipient;
        match category {
            Category::Appearance => {
                format!("{name}, у тебя удивительная внешность — твоя улыбка делает день ярче.")
            }
            Category::Character => {
                format!("{name}, твоё доброе и внимательное отношение к людям действительно впечатляет.")
            }
            Category::Achievements => format!(
                "{name}, твои достижения вдохновляют — видно, сколько сил ты вкладываешь в своё дело."
            ),
        }
    }
}

fn mentions_exam(context: &[ContextMessage]) -> bool {
    context.iter().any(|m| {
        let lower = m.content.to_lowercase();
        EXAM_MARKERS.iter().any(|marker| lower.contains(marker))
    })
}
