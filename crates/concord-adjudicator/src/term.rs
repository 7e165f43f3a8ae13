//! Parsing of "name the toxic term" answers used during re-screening.

use regex::Regex;

/// Answers that mean "nothing found", compared case-insensitively.
const NO_TERM_ANSWERS: &[&str] = &["rt", "no toxic term found"];

/// Extracts the toxic term named by a screening answer.
///
/// Precedence: the canonical `The toxic term in the statement is **"…"**`
/// phrasing, then the first double-quoted span, then the bare answer when
/// it is at most `max_words` words long. Everything else is "no term".
#[derive(Debug, Clone)]
pub struct TermExtractor {
    verdict_phrase: Regex,
    quoted: Regex,
    max_words: usize,
}

impl Default for TermExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TermExtractor {
    /// Extractor accepting bare answers of up to three words.
    pub fn new() -> Self {
        Self {
            verdict_phrase: Regex::new(r#"The toxic term in the statement is \*\*"(.*?)"\*\*"#)
                .expect("static pattern"),
            quoted: Regex::new(r#""(.*?)""#).expect("static pattern"),
            max_words: 3,
        }
    }

    /// Overrides the bare-answer word limit.
    pub fn with_max_words(mut self, max_words: usize) -> Self {
        self.max_words = max_words;
        self
    }

    /// Returns the named term, or `None` when the answer names nothing.
    pub fn extract(&self, answer: &str) -> Option<String> {
        let candidate = if let Some(caps) = self.verdict_phrase.captures(answer) {
            caps[1].trim().to_string()
        } else if let Some(caps) = self.quoted.captures(answer) {
            caps[1].trim().to_string()
        } else {
            let trimmed = answer.trim();
            if trimmed.split_whitespace().count() > self.max_words {
                return None;
            }
            trimmed.to_string()
        };

        let lowered = candidate.to_lowercase();
        if candidate.is_empty() || NO_TERM_ANSWERS.contains(&lowered.as_str()) {
            None
        } else {
            Some(candidate)
        }
    }
}
