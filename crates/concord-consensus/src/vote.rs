//! # Weighted Vote
//!
//! Combines the reference annotation and every participating source label
//! into one weighted toxic score.
//!
//! ```text
//! weighted_sum = w_ref · [reference == toxic] + Σ_s w_s · [label_s == toxic]
//! decision     = toxic  iff  weighted_sum ≥ threshold
//! ```
//!
//! The threshold defaults to half the total weight of the reference plus
//! all sources of the row. There is no randomness and no hidden tie-break:
//! the decision is a pure function of `weighted_sum` and `threshold`.
//!
//! ## Confidence tiers
//!
//! | Tier | Condition |
//! |------|-----------|
//! | `high` | `weighted_sum ≥ tiers.high` |
//! | `medium` | `weighted_sum ≥ tiers.medium` |
//! | none | below both |
//!
//! ## Review flag
//!
//! A row decided neutral whose text contains a lexicon term while fewer
//! than `review_max_toxic_sources` sources said toxic is flagged for
//! manual review.

use std::collections::BTreeMap;

use concord_adjudicator::Label;
use serde::{Deserialize, Serialize};

use crate::error::{ConsensusError, Result};
use crate::lexicon::Lexicon;
use crate::row::ConsensusRow;

/// Per-signal weights and the decision threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteWeights {
    reference_weight: f64,
    source_weights: BTreeMap<String, f64>,
    default_weight: f64,
    threshold: Option<f64>,
}

impl Default for VoteWeights {
    fn default() -> Self {
        Self::new()
    }
}

impl VoteWeights {
    /// Reference weight 2, every source weight 1, threshold at half the total.
    pub fn new() -> Self {
        Self {
            reference_weight: 2.0,
            source_weights: BTreeMap::new(),
            default_weight: 1.0,
            threshold: None,
        }
    }

    /// Sets the reference weight.
    pub fn with_reference_weight(mut self, weight: f64) -> Result<Self> {
        check_weight("reference", weight)?;
        self.reference_weight = weight;
        Ok(self)
    }

    /// Sets one source's weight.
    pub fn with_source_weight(mut self, source: impl Into<String>, weight: f64) -> Result<Self> {
        let source = source.into();
        check_weight(&source, weight)?;
        self.source_weights.insert(source, weight);
        Ok(self)
    }

    /// Fixes the decision threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Result<Self> {
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(ConsensusError::InvalidThreshold(threshold));
        }
        self.threshold = Some(threshold);
        Ok(self)
    }

    /// Weight of the reference signal.
    pub fn reference_weight(&self) -> f64 {
        self.reference_weight
    }

    /// Weight of `source`.
    pub fn weight_of(&self, source: &str) -> f64 {
        self.source_weights
            .get(source)
            .copied()
            .unwrap_or(self.default_weight)
    }

    /// Reference weight plus the weights of `sources`.
    pub fn total_weight<'a>(&self, sources: impl IntoIterator<Item = &'a str>) -> f64 {
        self.reference_weight + sources.into_iter().map(|s| self.weight_of(s)).sum::<f64>()
    }

    /// Configured threshold, or half of the total weight.
    pub fn threshold_for<'a>(&self, sources: impl IntoIterator<Item = &'a str>) -> f64 {
        self.threshold
            .unwrap_or_else(|| self.total_weight(sources) / 2.0)
    }
}

fn check_weight(name: &str, weight: f64) -> Result<()> {
    if weight.is_finite() && weight > 0.0 {
        Ok(())
    } else {
        Err(ConsensusError::InvalidWeight {
            name: name.to_string(),
            weight,
        })
    }
}

/// Tier boundaries on the weighted sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceTiers {
    /// Lower bound of `high`.
    pub high: f64,
    /// Lower bound of `medium`.
    pub medium: f64,
}

impl Default for ConfidenceTiers {
    fn default() -> Self {
        Self {
            high: 6.0,
            medium: 4.0,
        }
    }
}

/// Confidence of a weighted vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    /// At or above the high bound.
    High,
    /// At or above the medium bound.
    Medium,
}

impl ConfidenceTiers {
    /// Tier for `weighted_sum`.
    pub fn tier(&self, weighted_sum: f64) -> Option<ConfidenceTier> {
        if weighted_sum >= self.high {
            Some(ConfidenceTier::High)
        } else if weighted_sum >= self.medium {
            Some(ConfidenceTier::Medium)
        } else {
            None
        }
    }
}

/// Outcome of the weighted vote on one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedVote {
    /// Row index.
    pub text_id: u64,
    /// Weighted toxic score.
    pub weighted_sum: f64,
    /// Threshold the score was compared against.
    pub threshold: f64,
    /// Toxic iff `weighted_sum ≥ threshold`.
    pub decision: Label,
    /// Confidence tier of the score.
    pub tier: Option<ConfidenceTier>,
    /// Lexicon hit on a neutral decision with few toxic sources.
    pub needs_review: bool,
}

/// Applies [`VoteWeights`] to consensus rows.
#[derive(Debug, Clone)]
pub struct WeightedVoter {
    weights: VoteWeights,
    tiers: ConfidenceTiers,
    review_max_toxic_sources: usize,
    lexicon: Option<Lexicon>,
}

impl Default for WeightedVoter {
    fn default() -> Self {
        Self::new(VoteWeights::new())
    }
}

impl WeightedVoter {
    /// Voter with default tiers and no review lexicon.
    pub fn new(weights: VoteWeights) -> Self {
        Self {
            weights,
            tiers: ConfidenceTiers::default(),
            review_max_toxic_sources: 3,
            lexicon: None,
        }
    }

    /// Sets the confidence tiers.
    pub fn with_tiers(mut self, tiers: ConfidenceTiers) -> Self {
        self.tiers = tiers;
        self
    }

    /// Enables the review flag with `lexicon`.
    pub fn with_review(mut self, lexicon: Lexicon, max_toxic_sources: usize) -> Self {
        self.lexicon = Some(lexicon);
        self.review_max_toxic_sources = max_toxic_sources;
        self
    }

    /// The active weights.
    pub fn weights(&self) -> &VoteWeights {
        &self.weights
    }

    /// Votes on one row.
    pub fn vote(&self, row: &ConsensusRow) -> WeightedVote {
        let reference_part = if row.reference_label == Some(Label::Toxic) {
            self.weights.reference_weight()
        } else {
            0.0
        };
        let source_part: f64 = row
            .votes()
            .filter(|(_, label)| label.is_toxic())
            .map(|(source, _)| self.weights.weight_of(source))
            .sum();
        let weighted_sum = reference_part + source_part;

        let threshold = self
            .weights
            .threshold_for(row.per_source_labels.iter().map(|s| s.source.as_str()));
        let decision = if weighted_sum >= threshold {
            Label::Toxic
        } else {
            Label::Neutral
        };

        let needs_review = decision == Label::Neutral
            && row.toxic_sources() < self.review_max_toxic_sources
            && self
                .lexicon
                .as_ref()
                .is_some_and(|lexicon| lexicon.first_hit(&row.text).is_some());

        WeightedVote {
            text_id: row.text_id,
            weighted_sum,
            threshold,
            decision,
            tier: self.tiers.tier(weighted_sum),
            needs_review,
        }
    }
}
