//! # Deduplication Stage
//!
//! Collapses rows sharing the same normalised text before aggregation.
//!
//! ## Policy
//!
//! - **Key**: [`normalize_text`] (exact match after trim, case fold and
//!   whitespace collapse).
//! - **Winner**: first occurrence; later ones are dropped and counted.
//! - **Invariant**: `unique + duplicates_removed == total`, asserted.
//!
//! [`Deduplicator`] additionally keeps provenance for every occurrence so
//! texts present in several inputs (for example both truth sets) can be
//! reported.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::info;

use crate::text::normalize_text;

/// Where one occurrence of a text was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    /// Name of the input (file or set).
    pub input: String,
    /// Row index within that input.
    pub row_index: u64,
}

/// All occurrences of one normalised text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupEntry {
    /// The dedup key.
    pub normalized_text: String,
    /// Occurrences in observation order; the first one won.
    pub occurrences: Vec<Provenance>,
}

impl DedupEntry {
    /// The winning occurrence.
    pub fn first(&self) -> &Provenance {
        &self.occurrences[0]
    }

    /// Distinct input names this text was seen in.
    pub fn inputs(&self) -> BTreeSet<&str> {
        self.occurrences.iter().map(|p| p.input.as_str()).collect()
    }
}

/// Streaming deduplicator with provenance.
#[derive(Debug, Default)]
pub struct Deduplicator {
    index: HashMap<String, usize>,
    entries: Vec<DedupEntry>,
    observed: usize,
}

impl Deduplicator {
    /// Creates an empty deduplicator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence; returns true if the text is new.
    pub fn observe(&mut self, input: &str, row_index: u64, text: &str) -> bool {
        self.observed += 1;
        let key = normalize_text(text);
        let provenance = Provenance {
            input: input.to_string(),
            row_index,
        };
        match self.index.get(&key) {
            Some(&slot) => {
                self.entries[slot].occurrences.push(provenance);
                false
            }
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push(DedupEntry {
                    normalized_text: key,
                    occurrences: vec![provenance],
                });
                true
            }
        }
    }

    /// Total occurrences observed.
    pub fn total_observed(&self) -> usize {
        self.observed
    }

    /// Distinct texts observed.
    pub fn unique_count(&self) -> usize {
        self.entries.len()
    }

    /// Occurrences dropped as duplicates.
    pub fn duplicates_removed(&self) -> usize {
        self.observed - self.entries.len()
    }

    /// Entries in first-seen order.
    pub fn entries(&self) -> &[DedupEntry] {
        &self.entries
    }

    /// Texts seen more than once.
    pub fn duplicates(&self) -> impl Iterator<Item = &DedupEntry> {
        self.entries.iter().filter(|e| e.occurrences.len() > 1)
    }

    /// Texts seen in more than one input.
    pub fn conflicts(&self) -> Vec<&DedupEntry> {
        self.entries
            .iter()
            .filter(|e| e.inputs().len() > 1)
            .collect()
    }
}

/// Output of [`dedup_by_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deduplicated<T> {
    /// Surviving items, in input order.
    pub items: Vec<T>,
    /// Input size.
    pub total_rows: usize,
    /// Items dropped.
    pub duplicates_removed: usize,
}

impl<T> Deduplicated<T> {
    /// Surviving item count.
    pub fn unique_rows(&self) -> usize {
        self.items.len()
    }
}

/// Keeps the first item per normalised text.
///
/// # Panics
///
/// Panics if the kept and dropped counts do not add up to the input size.
pub fn dedup_by_text<T, F>(items: Vec<T>, text: F) -> Deduplicated<T>
where
    F: Fn(&T) -> &str,
{
    let total_rows = items.len();
    let mut seen = std::collections::HashSet::with_capacity(total_rows);
    let mut kept = Vec::with_capacity(total_rows);
    let mut duplicates_removed = 0;

    for item in items {
        if seen.insert(normalize_text(text(&item))) {
            kept.push(item);
        } else {
            duplicates_removed += 1;
        }
    }

    assert_eq!(
        kept.len() + duplicates_removed,
        total_rows,
        "dedup partition broken: {} unique + {} removed != {} total",
        kept.len(),
        duplicates_removed,
        total_rows
    );
    info!(
        total_rows,
        unique_rows = kept.len(),
        duplicates_removed,
        "deduplicated by normalised text"
    );

    Deduplicated {
        items: kept,
        total_rows,
        duplicates_removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_occurrence_wins() {
        let items = vec![(1, "Hello"), (2, "hello "), (3, "other"), (4, "HELLO")];
        let result = dedup_by_text(items, |(_, t)| *t);

        assert_eq!(result.items, vec![(1, "Hello"), (3, "other")]);
        assert_eq!(result.total_rows, 4);
        assert_eq!(result.duplicates_removed, 2);
        assert_eq!(result.unique_rows(), 2);
    }

    #[test]
    fn test_dedup_partition_property() {
        let corpora: Vec<Vec<&str>> = vec![
            vec![],
            vec!["a"],
            vec!["a", "a", "a"],
            vec!["a", "b", "A", " b", "c", "a b", "a  b"],
        ];
        for corpus in corpora {
            let total = corpus.len();
            let result = dedup_by_text(corpus, |t| *t);
            assert_eq!(result.unique_rows() + result.duplicates_removed, total);
        }
    }

    #[test]
    fn test_provenance_and_conflicts() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.observe("toxic_truth", 1, "you idiot"));
        assert!(dedup.observe("toxic_truth", 2, "fine"));
        assert!(!dedup.observe("toxic_truth", 3, "Fine"));
        assert!(!dedup.observe("clean_truth", 1, "you  IDIOT"));

        assert_eq!(dedup.total_observed(), 4);
        assert_eq!(dedup.unique_count(), 2);
        assert_eq!(dedup.duplicates_removed(), 2);
        assert_eq!(dedup.duplicates().count(), 2);

        let conflicts = dedup.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].normalized_text, "you idiot");
        assert_eq!(conflicts[0].first().input, "toxic_truth");
        assert_eq!(
            conflicts[0].inputs().into_iter().collect::<Vec<_>>(),
            vec!["clean_truth", "toxic_truth"]
        );
    }
}
