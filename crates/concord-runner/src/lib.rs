//! # Concord Runner
//!
//! Resumable, lock-step batch processing of a corpus through every
//! configured adjudicator.
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`BatchRunner`] | batching, per-batch commit, resume, pacing |
//! | [`RunnerConfig`] | batch size, delays, concurrency, batch limit |
//! | [`RunSummary`] | counts, per-source failures, skipped ranges, resume offset |
//!
//! ## Scheduling
//!
//! Batches run strictly one after another. Within a batch, sources run
//! sequentially by default, or concurrently (one in-flight batch per
//! source) with [`RunnerConfig::with_concurrent_sources`]. Either way the
//! batch is committed only after every source has answered.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use concord_adjudicator::{Adjudicator, ChatCompletionSource, RetryPolicy, RetryingAdjudicator, SourceConfig};
//! use concord_runner::{BatchRunner, RunnerConfig};
//! use concord_store::{load_corpus, CorpusConfig, RowStore};
//!
//! # async fn demo(source: SourceConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let adjudicator = RetryingAdjudicator::new(
//!     ChatCompletionSource::from_config(&source)?,
//!     RetryPolicy::default(),
//! );
//! let runner = BatchRunner::new(vec![Box::new(adjudicator)], RunnerConfig::new())?;
//!
//! let corpus = load_corpus(&CorpusConfig::new("corpus.csv"))?;
//! let mut store = RowStore::open("llm_predictions_log.csv", &runner.source_names())?;
//! let summary = runner.run(&corpus, &mut store).await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod progress;
mod runner;

pub use config::{RunnerConfig, MAX_BATCH_SIZE};
pub use error::{Result, RunnerError};
pub use progress::{RunSummary, SkippedBatch};
pub use runner::BatchRunner;
