//! # Bucket Partition
//!
//! Every analysable row lands in exactly one of six buckets.
//!
//! ## Rules
//!
//! | Bucket | Agreement | Reference | Sources |
//! |--------|-----------|-----------|---------|
//! | `common_tp` | yes | toxic | all toxic |
//! | `common_tn` | yes | neutral | all neutral |
//! | `common_fp` | yes | neutral | all toxic |
//! | `common_fn` | yes | toxic | all neutral |
//! | `at_least_one_fp` | no | neutral | some toxic |
//! | `at_least_one_fn` | no | toxic | some neutral |
//!
//! In the disagreement case the FP test runs before the FN test. With a
//! binary label domain a disagreeing row always contains both labels, so
//! exactly one of the two tests applies for a given reference.
//!
//! Rows without a reference label, or without any participating vote,
//! cannot be bucketed and are set aside as exclusions with a reason.
//!
//! ## Invariant
//!
//! `Σ buckets + exclusions == total rows`, asserted when the partition is
//! built. A row matching no rule is not stored anywhere, so a gap in the
//! rules trips the assertion.

use std::fmt;

use concord_adjudicator::Label;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::row::ConsensusRow;

/// One of the six partition buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Unanimous toxic, reference toxic.
    CommonTp,
    /// Unanimous neutral, reference neutral.
    CommonTn,
    /// Unanimous toxic, reference neutral.
    CommonFp,
    /// Unanimous neutral, reference toxic.
    CommonFn,
    /// Split vote, reference neutral.
    AtLeastOneFp,
    /// Split vote, reference toxic.
    AtLeastOneFn,
}

impl Bucket {
    /// All buckets in output order.
    pub const ALL: [Bucket; 6] = [
        Bucket::CommonTp,
        Bucket::CommonTn,
        Bucket::CommonFp,
        Bucket::CommonFn,
        Bucket::AtLeastOneFp,
        Bucket::AtLeastOneFn,
    ];

    /// Snake-case name, also the output file stem.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CommonTp => "common_tp",
            Self::CommonTn => "common_tn",
            Self::CommonFp => "common_fp",
            Self::CommonFn => "common_fn",
            Self::AtLeastOneFp => "at_least_one_fp",
            Self::AtLeastOneFn => "at_least_one_fn",
        }
    }

    /// True for the two disagreement buckets.
    pub const fn is_disagreement(self) -> bool {
        matches!(self, Self::AtLeastOneFp | Self::AtLeastOneFn)
    }

    const fn slot(self) -> usize {
        match self {
            Self::CommonTp => 0,
            Self::CommonTn => 1,
            Self::CommonFp => 2,
            Self::CommonFn => 3,
            Self::AtLeastOneFp => 4,
            Self::AtLeastOneFn => 5,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a row could not be bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclusion {
    /// The row has no reference label.
    NoReference,
    /// No source cast a participating vote.
    NoVotes,
}

/// Assigns a bucket, or `None` when no rule applies.
pub fn bucket_for(row: &ConsensusRow) -> Option<Bucket> {
    let reference = row.reference_label?;
    if let Some(agreed) = row.agreed_label() {
        return match (reference, agreed) {
            (Label::Toxic, Label::Toxic) => Some(Bucket::CommonTp),
            (Label::Neutral, Label::Neutral) => Some(Bucket::CommonTn),
            (Label::Neutral, Label::Toxic) => Some(Bucket::CommonFp),
            (Label::Toxic, Label::Neutral) => Some(Bucket::CommonFn),
            _ => None,
        };
    }

    let any_toxic = row.breakdown.toxic > 0;
    let any_neutral = row.breakdown.neutral > 0;
    if reference == Label::Neutral && any_toxic {
        Some(Bucket::AtLeastOneFp)
    } else if reference == Label::Toxic && any_neutral {
        Some(Bucket::AtLeastOneFn)
    } else {
        None
    }
}

fn exclusion_for(row: &ConsensusRow) -> Option<Exclusion> {
    if !row.reference_label.is_some_and(Label::is_known) {
        Some(Exclusion::NoReference)
    } else if row.participating() == 0 {
        Some(Exclusion::NoVotes)
    } else {
        None
    }
}

/// Row counts per bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BucketCounts {
    /// `common_tp` rows.
    pub common_tp: usize,
    /// `common_tn` rows.
    pub common_tn: usize,
    /// `common_fp` rows.
    pub common_fp: usize,
    /// `common_fn` rows.
    pub common_fn: usize,
    /// `at_least_one_fp` rows.
    pub at_least_one_fp: usize,
    /// `at_least_one_fn` rows.
    pub at_least_one_fn: usize,
    /// Rows set aside.
    pub excluded: usize,
    /// Input rows.
    pub total: usize,
}

impl BucketCounts {
    /// Sum of the six buckets.
    pub fn bucketed(&self) -> usize {
        self.common_tp
            + self.common_tn
            + self.common_fp
            + self.common_fn
            + self.at_least_one_fp
            + self.at_least_one_fn
    }

    /// True when buckets and exclusions account for every row.
    pub fn reconciles(&self) -> bool {
        self.bucketed() + self.excluded == self.total
    }
}

/// The six buckets plus exclusions.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    buckets: [Vec<ConsensusRow>; 6],
    excluded: Vec<(ConsensusRow, Exclusion)>,
    total: usize,
}

impl Partition {
    /// Buckets `rows`.
    ///
    /// # Panics
    ///
    /// Panics if the bucket and exclusion counts do not add up to `rows.len()`.
    pub fn build(rows: &[ConsensusRow]) -> Self {
        let mut partition = Self {
            total: rows.len(),
            ..Self::default()
        };

        for row in rows {
            if let Some(reason) = exclusion_for(row) {
                partition.excluded.push((row.clone(), reason));
            } else if let Some(bucket) = bucket_for(row) {
                partition.buckets[bucket.slot()].push(row.clone());
            }
        }

        let counts = partition.counts();
        assert_eq!(
            counts.bucketed() + counts.excluded,
            counts.total,
            "bucket partition does not cover every row: {counts:?}"
        );
        info!(
            common_tp = counts.common_tp,
            common_tn = counts.common_tn,
            common_fp = counts.common_fp,
            common_fn = counts.common_fn,
            at_least_one_fp = counts.at_least_one_fp,
            at_least_one_fn = counts.at_least_one_fn,
            excluded = counts.excluded,
            total = counts.total,
            "rows partitioned"
        );
        partition
    }

    /// Rows in `bucket`, in input order.
    pub fn rows(&self, bucket: Bucket) -> &[ConsensusRow] {
        &self.buckets[bucket.slot()]
    }

    /// Rows that could not be bucketed.
    pub fn excluded(&self) -> &[(ConsensusRow, Exclusion)] {
        &self.excluded
    }

    /// Input size.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Row counts.
    pub fn counts(&self) -> BucketCounts {
        BucketCounts {
            common_tp: self.rows(Bucket::CommonTp).len(),
            common_tn: self.rows(Bucket::CommonTn).len(),
            common_fp: self.rows(Bucket::CommonFp).len(),
            common_fn: self.rows(Bucket::CommonFn).len(),
            at_least_one_fp: self.rows(Bucket::AtLeastOneFp).len(),
            at_least_one_fn: self.rows(Bucket::AtLeastOneFn).len(),
            excluded: self.excluded.len(),
            total: self.total,
        }
    }
}

/// Crossing of "every source equals the reference" with the reference value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReferenceQuadrants {
    /// All sources equal a toxic reference.
    pub perfect_agreement_toxic: usize,
    /// All sources equal a neutral reference.
    pub perfect_agreement_neutral: usize,
    /// At least one source differs from a toxic reference.
    pub disagreement_toxic: usize,
    /// At least one source differs from a neutral reference.
    pub disagreement_neutral: usize,
    /// Rows without reference or votes.
    pub excluded: usize,
}

impl ReferenceQuadrants {
    /// Counts the quadrants over `rows`.
    ///
    /// # Panics
    ///
    /// Panics if the quadrants and exclusions do not add up to `rows.len()`.
    pub fn compute(rows: &[ConsensusRow]) -> Self {
        let mut quadrants = Self::default();
        for row in rows {
            if exclusion_for(row).is_some() {
                quadrants.excluded += 1;
                continue;
            }
            let Some(reference) = row.reference_label else {
                quadrants.excluded += 1;
                continue;
            };
            let all_match = row.votes().all(|(_, label)| label == reference);
            match (all_match, reference) {
                (true, Label::Toxic) => quadrants.perfect_agreement_toxic += 1,
                (true, _) => quadrants.perfect_agreement_neutral += 1,
                (false, Label::Toxic) => quadrants.disagreement_toxic += 1,
                (false, _) => quadrants.disagreement_neutral += 1,
            }
        }

        assert_eq!(
            quadrants.total(),
            rows.len(),
            "reference quadrants do not cover every row: {quadrants:?}"
        );
        quadrants
    }

    /// Sum of quadrants and exclusions.
    pub fn total(&self) -> usize {
        self.perfect_agreement_toxic
            + self.perfect_agreement_neutral
            + self.disagreement_toxic
            + self.disagreement_neutral
            + self.excluded
    }
}
