//! The pipeline facade.
//!
//! [`Pipeline`] wires configuration to the component crates and owns the
//! output file layout:
//!
//! ```text
//! <output_dir>/
//!   common_tp.csv … at_least_one_fn.csv      buckets of the full store
//!   majority_vote_results.csv                per-row majority and weighted vote
//!   review_candidates.csv                    rows flagged for manual review
//!   adjudicator_accuracy.csv                 per-source report
//!   unique_rows.csv                          store deduplicated by text
//!   unique_*.csv                             the same outputs for unique_rows
//!   analysis_summary.json
//!   toxic_truth.csv, clean_truth.csv         corrected sets, deduplicated
//!   correction_rows.csv                      every correction with its route
//!   truth_table.csv
//!   correction_summary.json
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use concord_adjudicator::{
    Adjudicator, ChatCompletionSource, RetryingAdjudicator, SourceCall, DEFAULT_SCREEN_PROMPT,
};
use concord_consensus::{
    Analysis, AnalysisSummary, Bucket, ConsensusEngine, CorrectionBuilder, CorrectionRoute,
    CorrectionRow, CorrectionSet, Lexicon, TruthTable,
};
use concord_runner::{BatchRunner, RunSummary};
use concord_store::{
    dedup_by_text, ensure_dir, load_corpus, write_csv, write_json, RowStore, RowTable,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ConcordConfig;
use crate::error::ConcordError;
use crate::Result;

/// Row-store state reported by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    /// Row store path.
    pub path: PathBuf,
    /// Whether the file exists.
    pub exists: bool,
    /// Durable rows.
    pub rows: usize,
    /// Last durable row index; the next run starts after it.
    pub resume_offset: u64,
    /// Source columns of the store.
    pub sources: Vec<String>,
}

impl fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.exists {
            return write!(f, "{}: not created yet (resume offset 0)", self.path.display());
        }
        write!(
            f,
            "{}: {} rows, resume offset {}, sources [{}]",
            self.path.display(),
            self.rows,
            self.resume_offset,
            self.sources.join(", ")
        )
    }
}

/// Summary written to `analysis_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzeSummary {
    /// Rows in the row store.
    pub total_rows: usize,
    /// Rows left after deduplication.
    pub unique_rows: usize,
    /// `total_rows - unique_rows`.
    pub duplicates_removed: usize,
    /// Analysis of the full store.
    pub full: AnalysisSummary,
    /// Analysis of the deduplicated store.
    pub unique: AnalysisSummary,
}

/// Result of [`Pipeline::analyze`].
#[derive(Debug, Clone)]
pub struct AnalyzeReport {
    /// Analysis of every stored row.
    pub full: Analysis,
    /// Analysis of the first occurrence of every text.
    pub unique: Analysis,
    /// Headline numbers.
    pub summary: AnalyzeSummary,
}

/// Per-bucket numbers in `correction_summary.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionSetSummary {
    /// Disagreement bucket.
    pub bucket: Bucket,
    /// Rows in the bucket.
    pub input_rows: usize,
    /// Rows resolved to toxic.
    pub toxic_truth: usize,
    /// Rows resolved to neutral.
    pub clean_truth: usize,
    /// Rows sent to the screener.
    pub rescreened: usize,
    /// Screener calls that failed after retries.
    pub rescreen_failures: usize,
    /// Rows routed by a lexicon hit.
    pub lexicon: usize,
    /// Screened term, several toxic sources.
    pub screened_multi: usize,
    /// Screened term, at most one toxic source.
    pub screened_single: usize,
    /// No term, toxic source majority.
    pub majority_toxic: usize,
    /// No term, no toxic majority.
    pub majority_clean: usize,
}

impl From<&CorrectionSet> for CorrectionSetSummary {
    fn from(set: &CorrectionSet) -> Self {
        Self {
            bucket: set.bucket,
            input_rows: set.input_rows,
            toxic_truth: set.toxic_truth.len(),
            clean_truth: set.clean_truth.len(),
            rescreened: set.rescreened,
            rescreen_failures: set.rescreen_failures,
            lexicon: set.count_route(CorrectionRoute::Lexicon),
            screened_multi: set.count_route(CorrectionRoute::ScreenedMulti),
            screened_single: set.count_route(CorrectionRoute::ScreenedSingle),
            majority_toxic: set.count_route(CorrectionRoute::MajorityToxic),
            majority_clean: set.count_route(CorrectionRoute::MajorityClean),
        }
    }
}

/// Summary written to `correction_summary.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionSummary {
    /// One entry per disagreement bucket.
    pub sets: Vec<CorrectionSetSummary>,
    /// Rows in `toxic_truth.csv`.
    pub toxic_truth_rows: usize,
    /// Rows in `clean_truth.csv`.
    pub clean_truth_rows: usize,
    /// Rows in `truth_table.csv`.
    pub truth_entries: usize,
    /// Truth candidates dropped as duplicates.
    pub truth_duplicates_removed: usize,
    /// Texts labelled both ways before deduplication.
    pub conflicts: Vec<String>,
}

/// Result of [`Pipeline::correct`].
#[derive(Debug, Clone)]
pub struct CorrectReport {
    /// Corrected disagreement buckets.
    pub sets: Vec<CorrectionSet>,
    /// Aggregate truth table.
    pub truth: TruthTable,
    /// Headline numbers.
    pub summary: CorrectionSummary,
}

/// Orchestrates run → analyze → correct.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: ConcordConfig,
}

impl Pipeline {
    /// Validates `config` and builds a pipeline.
    pub fn new(config: ConcordConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    pub fn config(&self) -> &ConcordConfig {
        &self.config
    }

    /// One retrying HTTP adjudicator per configured source.
    pub fn build_adjudicators(&self) -> Result<Vec<Box<dyn Adjudicator>>> {
        let policy = self.config.retry.policy();
        self.config
            .sources
            .iter()
            .map(|source| {
                let call = ChatCompletionSource::from_config(source)?;
                let adjudicator: Box<dyn Adjudicator> =
                    Box::new(RetryingAdjudicator::new(call, policy.clone()));
                Ok(adjudicator)
            })
            .collect()
    }

    /// Runs the configured sources over the corpus.
    pub async fn run(&self) -> Result<RunSummary> {
        self.config.validate_for_run()?;
        let adjudicators = self.build_adjudicators()?;
        self.run_with(adjudicators).await
    }

    /// Runs the given adjudicators over the corpus, resuming the row store.
    pub async fn run_with(&self, adjudicators: Vec<Box<dyn Adjudicator>>) -> Result<RunSummary> {
        let corpus = load_corpus(&self.config.corpus)?;
        let runner = BatchRunner::new(adjudicators, self.config.runner.clone())?;
        let mut store = RowStore::open(&self.config.store.path, &runner.source_names())?;
        let summary = runner.run(&corpus, &mut store).await?;
        if !summary.is_complete() {
            warn!(
                resume_offset = summary.resume_offset,
                skipped_batches = summary.skipped_batches.len(),
                "run incomplete"
            );
        }
        Ok(summary)
    }

    /// Reports the row store's length and resume offset.
    pub fn status(&self) -> Result<StoreStatus> {
        let path = self.config.store.path.clone();
        if !path.exists() {
            return Ok(StoreStatus {
                path,
                exists: false,
                rows: 0,
                resume_offset: 0,
                sources: self.config.source_names(),
            });
        }
        let table = RowTable::read(&path)?;
        Ok(StoreStatus {
            exists: true,
            rows: table.len(),
            resume_offset: table.rows.last().map_or(0, |r| r.row_index),
            sources: table.sources,
            path,
        })
    }

    /// Analyses the full and the deduplicated row store and writes outputs.
    pub fn analyze(&self) -> Result<AnalyzeReport> {
        let lexicon = self.lexicon()?;
        self.analyze_with(lexicon)
    }

    /// Analyses, then corrects the disagreement buckets of the deduplicated
    /// store, re-screening through the configured screener.
    pub async fn correct(&self) -> Result<CorrectReport> {
        let screener = match self.config.correction.active_screener() {
            Some(name) => {
                let source = self.config.source(name).ok_or_else(|| {
                    ConcordError::Config(format!("screener '{name}' is not a configured source"))
                })?;
                let call = ChatCompletionSource::from_config(source)?
                    .with_system_prompt(DEFAULT_SCREEN_PROMPT);
                Some(Box::new(call) as Box<dyn SourceCall>)
            }
            None => None,
        };
        self.correct_with(screener).await
    }

    /// [`Self::correct`] with an explicit screener.
    pub async fn correct_with(&self, screener: Option<Box<dyn SourceCall>>) -> Result<CorrectReport> {
        let lexicon = self.lexicon()?;
        let report = self.analyze_with(lexicon.clone())?;
        let analysis = &report.unique;

        let mut builder = CorrectionBuilder::new();
        if let Some(lexicon) = lexicon.clone() {
            builder = builder.with_lexicon(lexicon);
        }
        if let Some(screener) = screener {
            builder = builder.with_screener(screener, self.config.retry.policy());
        }

        let mut sets = Vec::with_capacity(2);
        for bucket in [Bucket::AtLeastOneFp, Bucket::AtLeastOneFn] {
            sets.push(builder.correct(bucket, analysis.partition.rows(bucket)).await);
        }

        let engine = ConsensusEngine::new(&self.config.consensus, lexicon)?;
        let truth = TruthTable::build(&analysis.partition, engine.voter(), &sets);

        let dir = &self.config.output_dir;
        ensure_dir(dir)?;
        let toxic = dedup_by_text(
            sets.iter().flat_map(|s| s.toxic_truth.iter().cloned()).collect::<Vec<CorrectionRow>>(),
            |r| r.text.as_str(),
        );
        let clean = dedup_by_text(
            sets.iter().flat_map(|s| s.clean_truth.iter().cloned()).collect::<Vec<CorrectionRow>>(),
            |r| r.text.as_str(),
        );
        write_csv(dir.join("toxic_truth.csv"), &toxic.items)?;
        write_csv(dir.join("clean_truth.csv"), &clean.items)?;
        let all_rows: Vec<CorrectionRow> =
            sets.iter().flat_map(CorrectionSet::rows).cloned().collect();
        write_csv(dir.join("correction_rows.csv"), &all_rows)?;
        write_csv(dir.join("truth_table.csv"), &truth.entries)?;

        let summary = CorrectionSummary {
            sets: sets.iter().map(CorrectionSetSummary::from).collect(),
            toxic_truth_rows: toxic.unique_rows(),
            clean_truth_rows: clean.unique_rows(),
            truth_entries: truth.entries.len(),
            truth_duplicates_removed: truth.duplicates_removed,
            conflicts: truth.conflicts.clone(),
        };
        write_json(dir.join("correction_summary.json"), &summary)?;
        info!(
            output_dir = %dir.display(),
            toxic_truth = summary.toxic_truth_rows,
            clean_truth = summary.clean_truth_rows,
            truth_entries = summary.truth_entries,
            "correction outputs written"
        );

        Ok(CorrectReport {
            sets,
            truth,
            summary,
        })
    }

    fn lexicon(&self) -> Result<Option<Lexicon>> {
        match &self.config.correction.lexicon_path {
            Some(path) => Ok(Some(Lexicon::load(path)?)),
            None => Ok(None),
        }
    }

    fn analyze_with(&self, lexicon: Option<Lexicon>) -> Result<AnalyzeReport> {
        let engine = ConsensusEngine::new(&self.config.consensus, lexicon)?;
        let table = RowTable::read(&self.config.store.path)?;
        let dir = &self.config.output_dir;
        ensure_dir(dir)?;

        let full = engine.analyze(&table);
        write_analysis(dir, "", &full)?;

        let sources = table.sources.clone();
        let deduped = dedup_by_text(table.rows, |r| r.text.as_str());
        let unique_table = RowTable::new(sources, deduped.items);
        unique_table.write(dir.join("unique_rows.csv"))?;

        let unique = engine.analyze(&unique_table);
        write_analysis(dir, "unique_", &unique)?;

        let summary = AnalyzeSummary {
            total_rows: deduped.total_rows,
            unique_rows: unique_table.len(),
            duplicates_removed: deduped.duplicates_removed,
            full: full.summary(),
            unique: unique.summary(),
        };
        write_json(dir.join("analysis_summary.json"), &summary)?;
        info!(
            output_dir = %dir.display(),
            total_rows = summary.total_rows,
            unique_rows = summary.unique_rows,
            duplicates_removed = summary.duplicates_removed,
            "analysis outputs written"
        );

        Ok(AnalyzeReport {
            full,
            unique,
            summary,
        })
    }
}

fn write_analysis(dir: &Path, prefix: &str, analysis: &Analysis) -> Result<()> {
    for bucket in Bucket::ALL {
        analysis
            .bucket_table(bucket)
            .write(dir.join(format!("{prefix}{bucket}.csv")))?;
    }
    let records = analysis.majority_records();
    write_csv(dir.join(format!("{prefix}majority_vote_results.csv")), &records)?;
    let review: Vec<_> = records.iter().filter(|r| r.needs_review).cloned().collect();
    write_csv(dir.join(format!("{prefix}review_candidates.csv")), &review)?;
    write_csv(dir.join(format!("{prefix}adjudicator_accuracy.csv")), &analysis.accuracy)?;
    Ok(())
}
