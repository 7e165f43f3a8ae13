//! # Concord Core
//!
//! Configuration and pipeline facade for the ensemble consensus engine.
//! Ties the adjudicators, the batch runner, the row store and the
//! consensus crate together behind one TOML file.
//!
//! ## Stages
//!
//! | Stage | Method | Component |
//! |-------|--------|-----------|
//! | Classify | [`Pipeline::run`] | `concord-runner` over `concord-adjudicator` sources |
//! | Inspect | [`Pipeline::status`] | `concord-store` row store |
//! | Analyse | [`Pipeline::analyze`] | dedup + `concord-consensus` |
//! | Correct | [`Pipeline::correct`] | correction sets + truth table |
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────┐   ┌───────────┐
//! │   corpus   │──▶│ BatchRunner  │──▶│ row store │──▶│   dedup   │
//! └────────────┘   │ (N sources)  │   │ (append)  │   └─────┬─────┘
//!                  └──────────────┘   └───────────┘         ▼
//!                                                    ┌─────────────┐
//!                                                    │  consensus  │
//!                                                    └──────┬──────┘
//!                                                           ▼
//!                                                    ┌─────────────┐
//!                                                    │ corrections │
//!                                                    │ truth table │
//!                                                    └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use concord_core::{ConcordConfig, Pipeline};
//!
//! # async fn demo() -> concord_core::Result<()> {
//! let pipeline = Pipeline::new(ConcordConfig::load("concord.toml")?)?;
//!
//! let summary = pipeline.run().await?;
//! println!("{summary}");
//!
//! let report = pipeline.correct().await?;
//! println!("{} truth entries", report.truth.entries.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Policy
//!
//! - Source failures never abort a run: items get the fail-safe label.
//! - A rejected batch is skipped and listed with its row range.
//! - A failed commit stops the run and reports the resume offset.
//! - Partition, dedup and correction totals are asserted.

mod config;
mod error;
mod pipeline;

pub use config::{ConcordConfig, CorrectionConfig, RetryConfig, StoreConfig};
pub use error::ConcordError;
pub use pipeline::{
    AnalyzeReport, AnalyzeSummary, CorrectReport, CorrectionSetSummary, CorrectionSummary,
    Pipeline, StoreStatus,
};

// Re-export component types for convenience
pub use concord_adjudicator::{Adjudicator, Label, SourceCall, SourceConfig};
pub use concord_consensus::{Bucket, TruthTable};
pub use concord_runner::RunSummary;

/// Core result type for pipeline operations.
pub type Result<T> = std::result::Result<T, ConcordError>;
