//! # Batch Runner
//!
//! Drives the corpus through every adjudicator in lock-step batches and
//! commits each batch to the row store before starting the next.
//!
//! ## Per-batch lifecycle
//!
//! ```text
//! chunk ──▶ classify (all sources) ──▶ all ok? ──yes──▶ append_batch ──▶ pace
//!                                        │                  │
//!                                        no                 err ──▶ CommitFailed (stop)
//!                                        ▼
//!                               log + SkippedBatch ──▶ pace
//! ```
//!
//! ## Guarantees
//!
//! - Row `i` of every source's output belongs to the same text unit.
//! - Rows are committed in corpus order; nothing is written for a batch
//!   until every source has answered for it.
//! - Units already in the store are never sent again.
//! - A batch rejected by one source (whole-batch error or wrong length)
//!   is skipped and logged; the run continues with the next batch. Its
//!   units stay absent from the store, so the next run picks them up.

use std::collections::{BTreeMap, HashSet};

use concord_adjudicator::{Adjudicator, AdjudicatorError, AdjudicatorResult, Judgement};
use concord_store::{Corpus, RowStore, StoredRow, TextUnit};
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::RunnerConfig;
use crate::error::{Result, RunnerError};
use crate::progress::{RunSummary, SkippedBatch};

/// Characters of each text kept when logging a skipped batch.
const LOGGED_TEXT_CHARS: usize = 100;

/// Lock-step batch driver owning the adjudicators for the run.
pub struct BatchRunner {
    adjudicators: Vec<Box<dyn Adjudicator>>,
    config: RunnerConfig,
}

impl BatchRunner {
    /// Creates a runner.
    ///
    /// # Errors
    ///
    /// [`RunnerError::NoAdjudicators`] for an empty list and
    /// [`RunnerError::DuplicateSource`] when two adjudicators share a name.
    pub fn new(adjudicators: Vec<Box<dyn Adjudicator>>, config: RunnerConfig) -> Result<Self> {
        if adjudicators.is_empty() {
            return Err(RunnerError::NoAdjudicators);
        }
        let mut seen = HashSet::new();
        for adjudicator in &adjudicators {
            if !seen.insert(adjudicator.name().to_string()) {
                return Err(RunnerError::DuplicateSource(adjudicator.name().to_string()));
            }
        }
        Ok(Self {
            adjudicators,
            config,
        })
    }

    /// Adjudicator names in column order.
    pub fn source_names(&self) -> Vec<String> {
        self.adjudicators.iter().map(|a| a.name().to_string()).collect()
    }

    /// The active configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Processes every unit of `corpus` not yet in `store`.
    pub async fn run(&self, corpus: &Corpus, store: &mut RowStore) -> Result<RunSummary> {
        let names = self.source_names();
        if store.sources() != names.as_slice() {
            return Err(RunnerError::SourceMismatch {
                store: store.sources().to_vec(),
                adjudicators: names,
            });
        }

        let offset = store.resume_offset();
        let pending: Vec<&TextUnit> = corpus.units.iter().filter(|u| !store.contains(u.id)).collect();
        let mut summary = RunSummary::start(corpus.len(), corpus.len() - pending.len(), offset);
        let baseline: Vec<u64> = self.adjudicators.iter().map(|a| a.failure_count()).collect();
        let started = Instant::now();

        info!(
            run_id = %summary.run_id,
            resume_offset = offset,
            pending = pending.len(),
            batch_size = self.config.batch_size,
            sources = ?names,
            "starting batch run"
        );

        let chunks: Vec<&[&TextUnit]> = pending.chunks(self.config.batch_size.max(1)).collect();
        let mut attempted = 0usize;
        for (batch_no, chunk) in chunks.iter().enumerate() {
            if self.config.max_batches.is_some_and(|max| batch_no >= max) {
                summary.stopped_early = true;
                info!(batches = batch_no, "batch limit reached, stopping");
                break;
            }

            let first_row = chunk[0].id;
            let last_row = chunk[chunk.len() - 1].id;
            let texts: Vec<String> = chunk.iter().map(|u| u.raw_text.clone()).collect();

            match self.classify_batch(&texts).await {
                Ok(judgements) => {
                    let rows = assemble_rows(chunk, &names, judgements);
                    store
                        .append_batch(&rows)
                        .map_err(|source| RunnerError::CommitFailed {
                            first_row,
                            last_row,
                            resume_offset: store.resume_offset(),
                            source,
                        })?;
                    summary.processed_rows += rows.len();
                    summary.batches_committed += 1;

                    let failures: BTreeMap<&str, u64> = self
                        .adjudicators
                        .iter()
                        .zip(&baseline)
                        .map(|(a, base)| (a.name(), a.failure_count() - base))
                        .collect();
                    info!(
                        batch = batch_no + 1,
                        rows = %format!("{first_row}..{last_row}"),
                        committed = summary.already_processed + summary.processed_rows,
                        total = summary.total_units,
                        failures = ?failures,
                        "batch committed"
                    );
                }
                Err(err) => {
                    let source_name = match &err {
                        AdjudicatorError::LengthMismatch { source_name, .. } => source_name.clone(),
                        AdjudicatorError::BatchFailure(name, _) | AdjudicatorError::Config(name, _) => {
                            name.clone()
                        }
                    };
                    let offending: Vec<String> = texts
                        .iter()
                        .map(|t| t.chars().take(LOGGED_TEXT_CHARS).collect())
                        .collect();
                    warn!(
                        rows = %format!("{first_row}..{last_row}"),
                        source = %source_name,
                        error = %err,
                        texts = ?offending,
                        "skipping batch"
                    );
                    summary.skipped_batches.push(SkippedBatch {
                        first_row,
                        last_row,
                        rows: chunk.len(),
                        source_name,
                        reason: err.to_string(),
                    });
                }
            }

            let before = attempted;
            attempted += chunk.len();
            if batch_no + 1 < chunks.len() {
                let delay = self.config.delay_after(before, attempted);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        summary.failures = self
            .adjudicators
            .iter()
            .zip(&baseline)
            .map(|(a, base)| (a.name().to_string(), a.failure_count() - base))
            .collect();
        summary.resume_offset = store.resume_offset();
        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            run_id = %summary.run_id,
            processed = summary.processed_rows,
            skipped_batches = summary.skipped_batches.len(),
            failures = summary.total_failures(),
            resume_offset = summary.resume_offset,
            elapsed_ms = summary.elapsed_ms,
            "run finished"
        );
        Ok(summary)
    }

    /// Asks every source about one batch; all must answer with the right length.
    async fn classify_batch(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<Judgement>>, AdjudicatorError> {
        let outcomes = if self.config.concurrent_sources {
            join_all(self.adjudicators.iter().map(|a| a.classify(texts))).await
        } else {
            let mut outcomes = Vec::with_capacity(self.adjudicators.len());
            for adjudicator in &self.adjudicators {
                outcomes.push(adjudicator.classify(texts).await);
            }
            outcomes
        };

        let mut per_source = Vec::with_capacity(outcomes.len());
        for (adjudicator, outcome) in self.adjudicators.iter().zip(outcomes) {
            let judgements = outcome?;
            if judgements.len() != texts.len() {
                return Err(AdjudicatorError::LengthMismatch {
                    source_name: adjudicator.name().to_string(),
                    expected: texts.len(),
                    got: judgements.len(),
                });
            }
            per_source.push(judgements);
        }
        Ok(per_source)
    }
}

/// Transposes per-source judgements into one stored row per unit.
fn assemble_rows(
    chunk: &[&TextUnit],
    names: &[String],
    per_source: Vec<Vec<Judgement>>,
) -> Vec<StoredRow> {
    let mut results: Vec<Vec<AdjudicatorResult>> = vec![Vec::with_capacity(names.len()); chunk.len()];
    for (name, judgements) in names.iter().zip(per_source) {
        for (i, (unit, judgement)) in chunk.iter().zip(judgements).enumerate() {
            results[i].push(AdjudicatorResult::new(name.as_str(), unit.id, judgement));
        }
    }

    chunk
        .iter()
        .zip(results)
        .map(|(unit, row_results)| {
            let labels = row_results.iter().map(|r| r.label).collect();
            let failed = row_results
                .iter()
                .filter(|r| r.error.is_some())
                .map(|r| r.source_name.clone())
                .collect();
            StoredRow::new(unit.id, unit.reference_label, &unit.raw_text, labels)
                .with_failed_sources(failed)
        })
        .collect()
}
