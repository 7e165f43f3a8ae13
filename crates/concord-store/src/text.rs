//! # Text Normalisation
//!
//! Two texts are "the same" for deduplication when their normalised forms
//! are byte-identical. Normalisation is deliberately shallow:
//!
//! 1. **Whitespace**: leading/trailing whitespace removed, inner runs
//!    collapsed to a single space (this also folds CR/LF).
//! 2. **Case**: Unicode lower-casing.
//!
//! No stemming, no punctuation stripping, no fuzzy matching.
//!
//! ## Example
//!
//! ```rust
//! use concord_store::text::normalize_text;
//!
//! assert_eq!(normalize_text("  I HATE\nthis "), normalize_text("i hate this"));
//! ```

use concord_adjudicator::Label;
use serde::{Deserialize, Serialize};

/// Dedup key: trimmed, lower-cased, whitespace-collapsed.
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Replaces line breaks with spaces and trims, keeping case and inner spacing.
///
/// Used before writing a text into a single CSV cell of the row store.
#[must_use]
pub fn flatten_text(raw: &str) -> String {
    raw.replace(['\r', '\n'], " ").trim().to_string()
}

/// One immutable unit of corpus text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    /// 1-based corpus position; doubles as the row-store `row_index`.
    pub id: u64,
    /// Dedup key, see [`normalize_text`].
    pub normalized_text: String,
    /// Text as read from the corpus.
    pub raw_text: String,
    /// Ground-truth annotation, already decoded to the canonical polarity.
    pub reference_label: Option<Label>,
}

impl TextUnit {
    /// Creates a unit and derives its normalised text.
    pub fn new(id: u64, raw_text: impl Into<String>, reference_label: Option<Label>) -> Self {
        let raw_text = raw_text.into();
        Self {
            id,
            normalized_text: normalize_text(&raw_text),
            raw_text,
            reference_label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_and_folds() {
        assert_eq!(normalize_text("  Hello   World \t"), "hello world");
        assert_eq!(normalize_text("a\r\nb"), "a b");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_normalize_is_not_fuzzy() {
        assert_ne!(normalize_text("I hate this"), normalize_text("I hate this!"));
    }

    #[test]
    fn test_flatten_keeps_case() {
        assert_eq!(flatten_text(" Line one\nLine Two\r\n"), "Line one Line Two");
    }

    #[test]
    fn test_text_unit_derives_key() {
        let unit = TextUnit::new(3, "I Hate  This", Some(Label::Toxic));
        assert_eq!(unit.normalized_text, "i hate this");
        assert_eq!(unit.raw_text, "I Hate  This");
        assert_eq!(unit.id, 3);
    }
}
