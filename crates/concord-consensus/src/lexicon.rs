//! Toxic-term lexicon with exact token matching.

use std::collections::HashSet;
use std::path::Path;

use concord_store::normalize_text;
use tracing::info;

use crate::error::{ConsensusError, Result};

/// An ordered list of lower-case toxic terms.
///
/// Matching is by whole whitespace token of the normalised text, never by
/// substring: `"class"` does not match the term `"ass"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lexicon {
    terms: Vec<String>,
}

impl Lexicon {
    /// Builds a lexicon from terms, trimming, lower-casing and dropping blanks
    /// and repeats while keeping first-seen order.
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();
        Self { terms }
    }

    /// Loads the first column of a header-less CSV file, one term per row.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let wrap = |source| ConsensusError::Lexicon {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(wrap)?;

        let mut cells = Vec::new();
        for record in reader.records() {
            let record = record.map_err(wrap)?;
            if let Some(cell) = record.get(0) {
                cells.push(cell.to_string());
            }
        }
        let lexicon = Self::from_terms(cells);
        info!(path = %path.display(), terms = lexicon.len(), "lexicon loaded");
        Ok(lexicon)
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// True when the lexicon has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms in file order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// First term, in lexicon order, that is a token of `text`.
    pub fn first_hit(&self, text: &str) -> Option<&str> {
        let normalized = normalize_text(text);
        let tokens: HashSet<&str> = normalized.split_whitespace().collect();
        self.terms
            .iter()
            .find(|term| tokens.contains(term.as_str()))
            .map(String::as_str)
    }
}
