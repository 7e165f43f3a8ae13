//! Label inference from free-text classifier answers.
//!
//! LLM adjudicators answer in prose ("This statement is negative because…").
//! [`ResponseParser`] maps such an answer to a [`Label`] with an ordered
//! list of keyword rules: the first rule with a matching keyword wins, and
//! an answer matching nothing falls back to the fail-closed default.
//!
//! Rule order matters. Neutral synonyms are checked before toxic keywords,
//! so "neutral, not harmful" resolves to neutral.

use crate::label::Label;

/// Neutral synonyms, checked first.
pub const NEUTRAL_KEYWORDS: &[&str] = &["positive", "neutral", "happy"];

/// Toxic keywords, checked second.
pub const TOXIC_KEYWORDS: &[&str] = &[
    "negative",
    "toxic",
    "harmful",
    "sexual",
    "slur",
    "violence",
    "hate",
    "discriminatory",
    "abuse",
    "harassment",
    "graphic",
    "explicit",
    "threat",
    "danger",
    "profanity",
    "stalking",
    "bullying",
    "racism",
];

/// One step of the ordered predicate list.
#[derive(Debug, Clone)]
pub struct LabelRule {
    label: Label,
    keywords: Vec<String>,
}

impl LabelRule {
    /// Creates a rule yielding `label` when any keyword is a substring of
    /// the lower-cased answer.
    pub fn new<I, S>(label: Label, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label,
            keywords: keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .collect(),
        }
    }

    fn matches(&self, answer: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|k| answer.contains(k.as_str()))
            .map(String::as_str)
    }
}

/// Outcome of parsing one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    /// The inferred label. Never [`Label::Unknown`] with the default rules.
    pub label: Label,
    /// Keyword that decided the label, if any.
    pub matched: Option<String>,
    /// True when no rule matched and the fallback was used.
    pub ambiguous: bool,
}

/// Deterministic keyword-precedence classifier.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    rules: Vec<LabelRule>,
    fallback: Label,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    /// Neutral synonyms, then toxic keywords, then toxic.
    pub fn new() -> Self {
        Self::with_rules(
            vec![
                LabelRule::new(Label::Neutral, NEUTRAL_KEYWORDS.iter().copied()),
                LabelRule::new(Label::Toxic, TOXIC_KEYWORDS.iter().copied()),
            ],
            Label::Toxic,
        )
    }

    /// Custom rule list with an explicit fallback label.
    pub fn with_rules(rules: Vec<LabelRule>, fallback: Label) -> Self {
        Self { rules, fallback }
    }

    /// Label used when no rule matches.
    pub fn fallback(&self) -> Label {
        self.fallback
    }

    /// Maps an answer to a label.
    pub fn parse(&self, answer: &str) -> ParsedResponse {
        let lowered = answer.to_lowercase();
        for rule in &self.rules {
            if let Some(keyword) = rule.matches(&lowered) {
                return ParsedResponse {
                    label: rule.label,
                    matched: Some(keyword.to_string()),
                    ambiguous: false,
                };
            }
        }
        ParsedResponse {
            label: self.fallback,
            matched: None,
            ambiguous: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_answers() {
        let parser = ResponseParser::new();
        assert_eq!(parser.parse("Neutral").label, Label::Neutral);
        assert_eq!(parser.parse("toxic").label, Label::Toxic);
        assert_eq!(parser.parse("Negative.").label, Label::Toxic);
        assert_eq!(parser.parse("POSITIVE").label, Label::Neutral);
    }

    #[test]
    fn test_neutral_checked_before_toxic() {
        let parser = ResponseParser::new();
        let parsed = parser.parse("Neutral - nothing harmful here");
        assert_eq!(parsed.label, Label::Neutral);
        assert_eq!(parsed.matched.as_deref(), Some("neutral"));
    }

    #[test]
    fn test_toxic_keyword_in_prose() {
        let parser = ResponseParser::new();
        let parsed = parser.parse("This contains a racial slur.");
        assert_eq!(parsed.label, Label::Toxic);
        assert_eq!(parsed.matched.as_deref(), Some("slur"));
        assert!(!parsed.ambiguous);
    }

    #[test]
    fn test_ambiguous_answer_fails_closed() {
        let parser = ResponseParser::new();
        let parsed = parser.parse("I cannot help with that request.");
        assert_eq!(parsed.label, Label::Toxic);
        assert!(parsed.ambiguous);
        assert!(parsed.matched.is_none());
    }

    #[test]
    fn test_custom_rules_and_fallback() {
        let parser = ResponseParser::with_rules(
            vec![LabelRule::new(Label::Toxic, ["yes"])],
            Label::Neutral,
        );
        assert_eq!(parser.parse("YES").label, Label::Toxic);
        assert_eq!(parser.parse("no").label, Label::Neutral);
        assert_eq!(parser.fallback(), Label::Neutral);
    }
}
