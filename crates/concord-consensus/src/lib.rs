//! # Concord Consensus
//!
//! Turns a row store of per-source labels into an agreement partition, a
//! weighted majority vote, and corrected truth sets.
//!
//! ## Overview
//!
//! Each source in the ensemble is an independent, noisy binary classifier.
//! No single one is trusted. Where they all agree, the agreement is
//! compared with the reference annotation; where they split, the row is
//! handed to the correction stage, which looks for hard evidence (a
//! lexicon term, a term named by a screening model) before falling back
//! to a strict majority.
//!
//! ## Pipeline
//!
//! ```text
//!   RowTable
//!      │
//!      ▼
//!  ConsensusRow ── agreement, majority, breakdown
//!      │
//!      ├──▶ Partition (6 buckets) ─┬─ common_* ─────────────────┐
//!      │                           └─ at_least_one_fp/fn        │
//!      │                                   │                    │
//!      │                                   ▼                    │
//!      │                           CorrectionBuilder            │
//!      │                           lexicon ▸ screener ▸ majority│
//!      │                                   │                    │
//!      ├──▶ WeightedVoter ─────────────────┼────────────────────┤
//!      │                                   ▼                    ▼
//!      └──▶ accuracy report            TruthTable (dedup by text)
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Checked in |
//! |-----------|------------|
//! | six buckets + exclusions == rows | [`Partition::build`] |
//! | quadrants + exclusions == rows | [`ReferenceQuadrants::compute`] |
//! | toxic truth + clean truth == disagreement rows | [`CorrectionBuilder::correct`] |
//! | unique + duplicates == candidates | [`concord_store::dedup_by_text`] |
//!
//! All are assertions: a violation is a logic defect and aborts.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use concord_consensus::{Bucket, ConsensusConfig, ConsensusEngine, CorrectionBuilder, TruthTable};
//! use concord_store::RowTable;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let table = RowTable::read("llm_predictions_log.csv")?;
//! let engine = ConsensusEngine::new(&ConsensusConfig::default(), None)?;
//! let analysis = engine.analyze(&table);
//!
//! let builder = CorrectionBuilder::new();
//! let fp = builder.correct(Bucket::AtLeastOneFp, analysis.partition.rows(Bucket::AtLeastOneFp)).await;
//! let fn_ = builder.correct(Bucket::AtLeastOneFn, analysis.partition.rows(Bucket::AtLeastOneFn)).await;
//!
//! let truth = TruthTable::build(&analysis.partition, engine.voter(), &[fp, fn_]);
//! println!("{} labelled texts", truth.entries.len());
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod correction;
pub mod error;
pub mod lexicon;
pub mod partition;
pub mod report;
pub mod row;
pub mod truth;
pub mod vote;

pub use analysis::{Analysis, AnalysisSummary, ConsensusConfig, ConsensusEngine, MajorityVoteRecord};
pub use correction::{CorrectionBuilder, CorrectionRoute, CorrectionRow, CorrectionSet};
pub use error::{ConsensusError, Result};
pub use lexicon::Lexicon;
pub use partition::{bucket_for, Bucket, BucketCounts, Exclusion, Partition, ReferenceQuadrants};
pub use report::{accuracy_report, SourceAccuracy};
pub use row::{ConsensusRow, SourceLabel, VoteBreakdown, VoteView};
pub use truth::{TruthEntry, TruthOrigin, TruthTable};
pub use vote::{ConfidenceTier, ConfidenceTiers, VoteWeights, WeightedVote, WeightedVoter};
