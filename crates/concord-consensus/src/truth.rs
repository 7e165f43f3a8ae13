//! # Aggregate Truth Table
//!
//! Merges the unanimous buckets, the weighted-vote decisions on unanimous
//! misses, and the corrected disagreement sets into one labelled table.
//!
//! | Origin | Rows | Label |
//! |--------|------|-------|
//! | `common_tp` | unanimous toxic, reference toxic | toxic |
//! | `common_tn` | unanimous neutral, reference neutral | neutral |
//! | `common_fp_vote` | unanimous toxic, reference neutral | weighted decision |
//! | `common_fn_vote` | unanimous neutral, reference toxic | weighted decision |
//! | `corrected_fp` | corrected `at_least_one_fp` | correction truth |
//! | `corrected_fn` | corrected `at_least_one_fn` | correction truth |
//!
//! Entries are deduplicated by normalised text in the order above; the
//! first occurrence wins.

use concord_adjudicator::Label;
use concord_store::{dedup_by_text, Deduplicator};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::correction::CorrectionSet;
use crate::partition::{Bucket, Partition};
use crate::vote::WeightedVoter;

/// Where a truth entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruthOrigin {
    /// `common_tp` bucket.
    CommonTp,
    /// `common_tn` bucket.
    CommonTn,
    /// `common_fp` bucket, weighted decision.
    CommonFpVote,
    /// `common_fn` bucket, weighted decision.
    CommonFnVote,
    /// Corrected `at_least_one_fp` row.
    CorrectedFp,
    /// Corrected `at_least_one_fn` row.
    CorrectedFn,
}

/// One labelled text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruthEntry {
    /// Row index.
    pub text_id: u64,
    /// Stored text.
    pub text: String,
    /// Truth label.
    pub label: Label,
    /// Origin of the label.
    pub origin: TruthOrigin,
}

/// Deduplicated truth table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruthTable {
    /// Surviving entries.
    pub entries: Vec<TruthEntry>,
    /// Entries before deduplication.
    pub total_candidates: usize,
    /// Entries dropped as duplicates.
    pub duplicates_removed: usize,
    /// Normalised texts labelled both toxic and neutral among the candidates.
    pub conflicts: Vec<String>,
}

impl TruthTable {
    /// Builds the table from a partition and its correction sets.
    pub fn build(partition: &Partition, voter: &WeightedVoter, corrections: &[CorrectionSet]) -> Self {
        let mut candidates = Vec::new();

        let fixed = [
            (Bucket::CommonTp, TruthOrigin::CommonTp, Some(Label::Toxic)),
            (Bucket::CommonTn, TruthOrigin::CommonTn, Some(Label::Neutral)),
            (Bucket::CommonFp, TruthOrigin::CommonFpVote, None),
            (Bucket::CommonFn, TruthOrigin::CommonFnVote, None),
        ];
        for (bucket, origin, label) in fixed {
            for row in partition.rows(bucket) {
                candidates.push(TruthEntry {
                    text_id: row.text_id,
                    text: row.text.clone(),
                    label: label.unwrap_or_else(|| voter.vote(row).decision),
                    origin,
                });
            }
        }

        for bucket in [Bucket::AtLeastOneFp, Bucket::AtLeastOneFn] {
            let origin = if bucket == Bucket::AtLeastOneFp {
                TruthOrigin::CorrectedFp
            } else {
                TruthOrigin::CorrectedFn
            };
            for set in corrections.iter().filter(|s| s.bucket == bucket) {
                candidates.extend(set.rows().map(|row| TruthEntry {
                    text_id: row.text_id,
                    text: row.text.clone(),
                    label: row.truth,
                    origin,
                }));
            }
        }

        let mut by_label = Deduplicator::new();
        for entry in &candidates {
            by_label.observe(entry.label.as_str(), entry.text_id, &entry.text);
        }
        let conflicts: Vec<String> = by_label
            .conflicts()
            .into_iter()
            .map(|e| e.normalized_text.clone())
            .collect();
        if !conflicts.is_empty() {
            warn!(conflicts = conflicts.len(), "texts labelled both toxic and neutral");
        }

        let deduped = dedup_by_text(candidates, |e| e.text.as_str());
        let table = Self {
            total_candidates: deduped.total_rows,
            duplicates_removed: deduped.duplicates_removed,
            entries: deduped.items,
            conflicts,
        };
        info!(
            entries = table.entries.len(),
            toxic = table.count(Label::Toxic),
            neutral = table.count(Label::Neutral),
            duplicates_removed = table.duplicates_removed,
            "truth table built"
        );
        table
    }

    /// Entries with `label`.
    pub fn count(&self, label: Label) -> usize {
        self.entries.iter().filter(|e| e.label == label).count()
    }
}
