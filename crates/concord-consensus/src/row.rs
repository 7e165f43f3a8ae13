//! # Consensus Rows
//!
//! A [`ConsensusRow`] is a derived, read-only view of one stored row: the
//! per-source labels, whether they agree, and the unweighted majority.
//!
//! ## Vote views
//!
//! | View | Participating labels | Answers |
//! |------|----------------------|---------|
//! | [`VoteView::Decided`] | every known label, fail-safe substitutions included | what did we decide? |
//! | [`VoteView::Valid`] | known labels that are not fail-safe substitutions | what did the models say? |
//!
//! `unknown` labels never participate.
//!
//! ## Invariants
//!
//! - `agreement` holds iff the participating labels form a set of size one.
//! - `disagreeing_sources` lists participating sources whose label differs
//!   from `majority_label`, so it is empty exactly when `agreement` holds.
//!   A row without any participating vote has neither.
//! - Majority ties resolve to toxic.

use std::collections::BTreeSet;

use concord_adjudicator::Label;
use concord_store::{normalize_text, StoredRow};
use serde::{Deserialize, Serialize};

/// Which labels take part in agreement and votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteView {
    /// Fail-safe substitutions count as ordinary toxic votes.
    #[default]
    Decided,
    /// Fail-safe substitutions are left out.
    Valid,
}

/// One source's label on one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLabel {
    /// Source name.
    pub source: String,
    /// Stored label.
    pub label: Label,
    /// True when the label is a fail-safe substitution.
    pub failed: bool,
}

/// Toxic/neutral vote counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteBreakdown {
    /// Participating toxic labels.
    pub toxic: usize,
    /// Participating neutral labels.
    pub neutral: usize,
}

impl VoteBreakdown {
    /// Participating labels.
    pub fn voting(&self) -> usize {
        self.toxic + self.neutral
    }
}

/// Per-row consensus view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRow {
    /// Row index in the row store.
    pub text_id: u64,
    /// Stored text.
    pub text: String,
    /// Dedup key of `text`.
    pub normalized_text: String,
    /// Ground-truth annotation.
    pub reference_label: Option<Label>,
    /// Labels in source column order.
    pub per_source_labels: Vec<SourceLabel>,
    /// View used to derive the fields below.
    pub view: VoteView,
    /// All participating labels are equal.
    pub agreement: bool,
    /// Unweighted majority; `None` without participating votes.
    pub majority_label: Option<Label>,
    /// `majority_count / voting_count`, `0.0` without votes.
    pub vote_confidence: f64,
    /// Participating vote counts.
    pub breakdown: VoteBreakdown,
    /// Participating sources that differ from the majority.
    pub disagreeing_sources: BTreeSet<String>,
}

impl ConsensusRow {
    /// Derives the view of `row`; `sources` gives the column names.
    pub fn from_stored(row: &StoredRow, sources: &[String], view: VoteView) -> Self {
        let per_source_labels: Vec<SourceLabel> = sources
            .iter()
            .zip(&row.labels)
            .map(|(source, label)| SourceLabel {
                source: source.clone(),
                label: *label,
                failed: row.is_failed(source),
            })
            .collect();

        let participates = |s: &SourceLabel| {
            s.label.is_known() && (view == VoteView::Decided || !s.failed)
        };

        let mut breakdown = VoteBreakdown::default();
        for entry in per_source_labels.iter().filter(|s| participates(*s)) {
            match entry.label {
                Label::Toxic => breakdown.toxic += 1,
                Label::Neutral => breakdown.neutral += 1,
                Label::Unknown => {}
            }
        }

        let voting = breakdown.voting();
        let (majority_label, vote_confidence) = if voting == 0 {
            (None, 0.0)
        } else if breakdown.toxic >= breakdown.neutral {
            (Some(Label::Toxic), breakdown.toxic as f64 / voting as f64)
        } else {
            (Some(Label::Neutral), breakdown.neutral as f64 / voting as f64)
        };

        let agreement = voting > 0 && (breakdown.toxic == 0 || breakdown.neutral == 0);
        let disagreeing_sources = per_source_labels
            .iter()
            .filter(|s| participates(*s) && Some(s.label) != majority_label)
            .map(|s| s.source.clone())
            .collect();

        Self {
            text_id: row.row_index,
            text: row.text.clone(),
            normalized_text: normalize_text(&row.text),
            reference_label: row.reference,
            per_source_labels,
            view,
            agreement,
            majority_label,
            vote_confidence,
            breakdown,
            disagreeing_sources,
        }
    }

    /// Participating `(source, label)` pairs.
    pub fn votes(&self) -> impl Iterator<Item = (&str, Label)> + '_ {
        self.per_source_labels
            .iter()
            .filter(|s| s.label.is_known() && (self.view == VoteView::Decided || !s.failed))
            .map(|s| (s.source.as_str(), s.label))
    }

    /// Stored label of `source`.
    pub fn label_of(&self, source: &str) -> Option<Label> {
        self.per_source_labels
            .iter()
            .find(|s| s.source == source)
            .map(|s| s.label)
    }

    /// Participating toxic votes.
    pub fn toxic_sources(&self) -> usize {
        self.breakdown.toxic
    }

    /// Participating votes.
    pub fn participating(&self) -> usize {
        self.breakdown.voting()
    }

    /// Majority and reference are both known and differ.
    pub fn disagrees_with_reference(&self) -> bool {
        match (self.majority_label, self.reference_label) {
            (Some(majority), Some(reference)) => majority != reference,
            _ => false,
        }
    }

    /// The single agreed label, when there is one.
    pub fn agreed_label(&self) -> Option<Label> {
        if self.agreement {
            self.majority_label
        } else {
            None
        }
    }

    /// Converts back to a row-store row.
    pub fn to_stored(&self) -> StoredRow {
        StoredRow::new(
            self.text_id,
            self.reference_label,
            &self.text,
            self.per_source_labels.iter().map(|s| s.label).collect(),
        )
        .with_failed_sources(
            self.per_source_labels
                .iter()
                .filter(|s| s.failed)
                .map(|s| s.source.clone())
                .collect(),
        )
    }
}
