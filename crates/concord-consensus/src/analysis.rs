//! # Consensus Analysis
//!
//! One pass over a row table: per-row consensus, the bucket partition, the
//! reference quadrants, weighted votes and the accuracy report.
//!
//! ```text
//!  RowTable ──▶ ConsensusRow* ──┬──▶ Partition
//!                               ├──▶ ReferenceQuadrants
//!                               ├──▶ WeightedVote*
//!                               └──▶ SourceAccuracy*
//! ```

use std::collections::BTreeMap;

use concord_adjudicator::Label;
use concord_store::RowTable;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::lexicon::Lexicon;
use crate::partition::{Bucket, BucketCounts, Partition, ReferenceQuadrants};
use crate::report::{accuracy_report, SourceAccuracy};
use crate::row::{ConsensusRow, VoteView};
use crate::vote::{ConfidenceTier, ConfidenceTiers, VoteWeights, WeightedVote, WeightedVoter};

/// Vote and view settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Weight of a toxic reference label.
    pub reference_weight: f64,
    /// Per-source weights; absent sources weigh 1.0.
    pub source_weights: BTreeMap<String, f64>,
    /// Fixed decision threshold; half the total weight when unset.
    pub threshold: Option<f64>,
    /// Vote view for agreement and majority.
    pub view: VoteView,
    /// Confidence tier bounds.
    pub confidence_tiers: ConfidenceTiers,
    /// Review flag limit on toxic sources.
    pub review_max_toxic_sources: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            reference_weight: 2.0,
            source_weights: BTreeMap::new(),
            threshold: None,
            view: VoteView::Decided,
            confidence_tiers: ConfidenceTiers::default(),
            review_max_toxic_sources: 3,
        }
    }
}

impl ConsensusConfig {
    /// Builds the vote weights, rejecting non-positive values.
    pub fn weights(&self) -> Result<VoteWeights> {
        let mut weights = VoteWeights::new().with_reference_weight(self.reference_weight)?;
        for (source, weight) in &self.source_weights {
            weights = weights.with_source_weight(source.clone(), *weight)?;
        }
        if let Some(threshold) = self.threshold {
            weights = weights.with_threshold(threshold)?;
        }
        Ok(weights)
    }

    /// Checks the weights and threshold.
    pub fn validate(&self) -> Result<()> {
        self.weights().map(|_| ())
    }
}

/// One row of `majority_vote_results.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MajorityVoteRecord {
    /// Row index.
    pub text_id: u64,
    /// Stored text.
    pub text: String,
    /// Reference annotation.
    pub reference_label: Option<Label>,
    /// Unweighted majority of the sources, `None` without votes.
    pub majority_label: Option<Label>,
    /// Share of participating votes behind the majority.
    pub vote_confidence: f64,
    /// Participating toxic votes.
    pub toxic_votes: usize,
    /// Participating neutral votes.
    pub neutral_votes: usize,
    /// Majority and reference are both known and differ.
    pub disagrees_with_reference: bool,
    /// Weighted toxic mass, reference included.
    pub weighted_sum: f64,
    /// Threshold the sum was compared against.
    pub threshold: f64,
    /// Weighted vote outcome.
    pub weighted_decision: Label,
    /// Confidence tier of a toxic decision.
    pub confidence_tier: Option<ConfidenceTier>,
    /// Flagged for manual review.
    pub needs_review: bool,
}

/// Headline numbers of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Rows analysed.
    pub total_rows: usize,
    /// View used.
    pub view: VoteView,
    /// Bucket sizes.
    pub buckets: BucketCounts,
    /// Buckets plus exclusions equal the row count.
    pub reconciled: bool,
    /// Reference quadrants.
    pub quadrants: ReferenceQuadrants,
    /// Rows where every participating source agreed.
    pub agreement_rows: usize,
    /// Rows whose weighted decision is toxic.
    pub weighted_toxic: usize,
    /// Rows flagged for manual review.
    pub needs_review: usize,
}

/// Everything derived from one row table.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Source column names.
    pub sources: Vec<String>,
    /// Per-row consensus, in table order.
    pub rows: Vec<ConsensusRow>,
    /// Six-bucket partition.
    pub partition: Partition,
    /// Reference quadrants.
    pub quadrants: ReferenceQuadrants,
    /// Weighted votes, aligned with `rows`.
    pub votes: Vec<WeightedVote>,
    /// Accuracy per source.
    pub accuracy: Vec<SourceAccuracy>,
    view: VoteView,
}

impl Analysis {
    /// Rows of `bucket` as a row table with the original columns.
    pub fn bucket_table(&self, bucket: Bucket) -> RowTable {
        RowTable::new(
            self.sources.clone(),
            self.partition
                .rows(bucket)
                .iter()
                .map(ConsensusRow::to_stored)
                .collect(),
        )
    }

    /// Per-row majority and weighted vote records.
    pub fn majority_records(&self) -> Vec<MajorityVoteRecord> {
        self.rows
            .iter()
            .zip(&self.votes)
            .map(|(row, vote)| MajorityVoteRecord {
                text_id: row.text_id,
                text: row.text.clone(),
                reference_label: row.reference_label,
                majority_label: row.majority_label,
                vote_confidence: row.vote_confidence,
                toxic_votes: row.breakdown.toxic,
                neutral_votes: row.breakdown.neutral,
                disagrees_with_reference: row.disagrees_with_reference(),
                weighted_sum: vote.weighted_sum,
                threshold: vote.threshold,
                weighted_decision: vote.decision,
                confidence_tier: vote.tier,
                needs_review: vote.needs_review,
            })
            .collect()
    }

    /// Headline numbers.
    pub fn summary(&self) -> AnalysisSummary {
        let buckets = self.partition.counts();
        AnalysisSummary {
            total_rows: self.rows.len(),
            view: self.view,
            reconciled: buckets.reconciles(),
            buckets,
            quadrants: self.quadrants,
            agreement_rows: self.rows.iter().filter(|r| r.agreement).count(),
            weighted_toxic: self.votes.iter().filter(|v| v.decision.is_toxic()).count(),
            needs_review: self.votes.iter().filter(|v| v.needs_review).count(),
        }
    }
}

/// Runs consensus analyses with one configuration.
#[derive(Debug, Clone)]
pub struct ConsensusEngine {
    view: VoteView,
    voter: WeightedVoter,
}

impl ConsensusEngine {
    /// Builds an engine; `lexicon` enables the review flag.
    pub fn new(config: &ConsensusConfig, lexicon: Option<Lexicon>) -> Result<Self> {
        let mut voter = WeightedVoter::new(config.weights()?).with_tiers(config.confidence_tiers);
        if let Some(lexicon) = lexicon {
            voter = voter.with_review(lexicon, config.review_max_toxic_sources);
        }
        Ok(Self {
            view: config.view,
            voter,
        })
    }

    /// The weighted voter.
    pub fn voter(&self) -> &WeightedVoter {
        &self.voter
    }

    /// Analyses `table`.
    ///
    /// # Panics
    ///
    /// Panics if the bucket partition or the reference quadrants fail to
    /// cover every row.
    pub fn analyze(&self, table: &RowTable) -> Analysis {
        let rows: Vec<ConsensusRow> = table
            .rows
            .iter()
            .map(|row| ConsensusRow::from_stored(row, &table.sources, self.view))
            .collect();

        let partition = Partition::build(&rows);
        let quadrants = ReferenceQuadrants::compute(&rows);
        let votes: Vec<WeightedVote> = rows.iter().map(|row| self.voter.vote(row)).collect();
        let accuracy = accuracy_report(&rows);

        info!(
            rows = rows.len(),
            view = ?self.view,
            agreement = rows.iter().filter(|r| r.agreement).count(),
            weighted_toxic = votes.iter().filter(|v| v.decision.is_toxic()).count(),
            "consensus analysis complete"
        );

        Analysis {
            sources: table.sources.clone(),
            rows,
            partition,
            quadrants,
            votes,
            accuracy,
            view: self.view,
        }
    }
}
