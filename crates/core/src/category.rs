//! Compliment categories and the normalization of free-text category input.

use serde::{Deserialize, Serialize};

/// The thematic kind of compliment requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Appearance,
    /// Used for anything unrecognized
    #[default]
    Character,
    Achievements,
}

impl Category {
    /// All categories, in keyboard order.
    pub const ALL: [Category; 3] = [
        Category::Appearance,
        Category::Character,
        Category::Achievements,
    ];

    /// Stable wire name (used in callback data and stored markers).
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Appearance => "appearance",
            Category::Character => "character",
            Category::Achievements => "achievements",
        }
    }

    /// Localized label shown on keyboard buttons and in prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Appearance => "Внешность",
            Category::Character => "Характер",
            Category::Achievements => "Достижения",
        }
    }

    /// Exact match on the wire name only.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Map any user or callback input onto a category.
    ///
    /// Total: unknown, empty or garbage input yields [`Category::Character`].
    pub fn normalize(input: &str) -> Self {
        let t = input.trim().to_lowercase();
        match t.as_str() {
            "внешность" | "внешний" | "внешний вид" => Category::Appearance,
            "характер" | "личность" => Category::Character,
            "достижения" | "успехи" | "работа" | "career" | "учёба" => {
                Category::Achievements
            }
            other => Self::from_wire(other).unwrap_or_default(),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Self::normalize(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_normalize_to_themselves() {
        for c in Category::ALL {
            assert_eq!(Category::normalize(c.as_str()), c);
        }
    }

    #[test]
    fn russian_synonyms() {
        assert_eq!(Category::normalize("Внешность"), Category::Appearance);
        assert_eq!(Category::normalize("внешний вид"), Category::Appearance);
        assert_eq!(Category::normalize("  ЛИЧНОСТЬ "), Category::Character);
        assert_eq!(Category::normalize("успехи"), Category::Achievements);
        assert_eq!(Category::normalize("учёба"), Category::Achievements);
        assert_eq!(Category::normalize("career"), Category::Achievements);
    }

    #[test]
    fn unknown_input_defaults_to_character() {
        for input in ["", "   ", "random", "beauty", "🙂", "type:appearance"] {
            assert_eq!(Category::normalize(input), Category::Character, "{input:?}");
        }
    }

    #[test]
    fn from_wire_is_strict() {
        assert_eq!(Category::from_wire("appearance"), Some(Category::Appearance));
        assert_eq!(Category::from_wire("Appearance"), None);
        assert_eq!(Category::from_wire("внешность"), None);
    }
}
