//! # Integration Tests
//!
//! Full runs against a temporary row store with scripted adjudicators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use concord_adjudicator::{
    Adjudicator, AdjudicatorError, Judgement, Label, RetryPolicy, RetryingAdjudicator, SourceCall,
    SourceError,
};
use concord_runner::{BatchRunner, RunnerConfig};
use concord_store::{Corpus, RowStore, RowTable, TextUnit};

// ============================================================================
// Scripted adjudicators
// ============================================================================

/// Toxic when the text contains the keyword.
struct KeywordAdjudicator {
    name: &'static str,
    keyword: &'static str,
}

#[async_trait]
impl Adjudicator for KeywordAdjudicator {
    fn name(&self) -> &str {
        self.name
    }

    async fn classify(&self, texts: &[String]) -> concord_adjudicator::Result<Vec<Judgement>> {
        Ok(texts
            .iter()
            .map(|t| {
                let label = if t.contains(self.keyword) {
                    Label::Toxic
                } else {
                    Label::Neutral
                };
                Judgement::new(label, label.as_str())
            })
            .collect())
    }
}

/// Breaks the length contract on the batch containing `poison`.
struct ShortOnPoison {
    poison: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl Adjudicator for ShortOnPoison {
    fn name(&self) -> &str {
        "short"
    }

    async fn classify(&self, texts: &[String]) -> concord_adjudicator::Result<Vec<Judgement>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut out: Vec<Judgement> = texts
            .iter()
            .map(|_| Judgement::new(Label::Neutral, "neutral"))
            .collect();
        if texts.iter().any(|t| t == self.poison) {
            out.pop();
        }
        Ok(out)
    }
}

/// Fails whole batches containing `poison`.
struct BatchErrorOnPoison {
    poison: &'static str,
}

#[async_trait]
impl Adjudicator for BatchErrorOnPoison {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn classify(&self, texts: &[String]) -> concord_adjudicator::Result<Vec<Judgement>> {
        if texts.iter().any(|t| t == self.poison) {
            return Err(AdjudicatorError::BatchFailure(
                "flaky".to_string(),
                "connection reset".to_string(),
            ));
        }
        Ok(texts
            .iter()
            .map(|_| Judgement::new(Label::Toxic, "toxic"))
            .collect())
    }
}

/// Raw source that always raises.
struct AlwaysRaises;

#[async_trait]
impl SourceCall for AlwaysRaises {
    fn name(&self) -> &str {
        "broken"
    }

    async fn call(&self, _text: &str) -> Result<String, SourceError> {
        Err(SourceError::RateLimited("429 Too Many Requests".into()))
    }
}

fn corpus(n: u64) -> Corpus {
    Corpus::from_units(
        (1..=n)
            .map(|id| {
                let text = if id % 3 == 0 {
                    format!("I hate message {id}")
                } else {
                    format!("message {id}")
                };
                let reference = if id % 2 == 0 { Label::Neutral } else { Label::Toxic };
                TextUnit::new(id, text, Some(reference))
            })
            .collect(),
    )
}

fn keyword_runner(config: RunnerConfig) -> BatchRunner {
    BatchRunner::new(
        vec![
            Box::new(KeywordAdjudicator { name: "model", keyword: "hate" }),
            Box::new(KeywordAdjudicator { name: "gemini", keyword: "message 1" }),
        ],
        config,
    )
    .unwrap()
}

fn fast() -> RunnerConfig {
    RunnerConfig::new().with_batch_size(4).with_inter_batch_delay_ms(0)
}

// ============================================================================
// Resume idempotence
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_resume_after_crash_yields_identical_row_store() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = corpus(10);

    // Single uninterrupted run.
    let full_path = dir.path().join("full.csv");
    let runner = keyword_runner(fast());
    let mut store = RowStore::open(&full_path, &runner.source_names()).unwrap();
    let summary = runner.run(&corpus, &mut store).await.unwrap();
    assert!(summary.is_complete());
    assert_eq!(summary.processed_rows, 10);
    assert_eq!(summary.batches_committed, 3);

    // Same corpus, "crash" after the first batch, then resume.
    let split_path = dir.path().join("split.csv");
    let crashing = keyword_runner(fast().with_max_batches(1));
    let mut store = RowStore::open(&split_path, &crashing.source_names()).unwrap();
    let first = crashing.run(&corpus, &mut store).await.unwrap();
    assert!(first.stopped_early);
    assert_eq!(first.resume_offset, 4);
    drop(store);

    let resumed = keyword_runner(fast());
    let mut store = RowStore::open(&split_path, &resumed.source_names()).unwrap();
    assert_eq!(store.resume_offset(), 4);
    let second = resumed.run(&corpus, &mut store).await.unwrap();
    assert_eq!(second.already_processed, 4);
    assert_eq!(second.processed_rows, 6);

    let full = std::fs::read_to_string(&full_path).unwrap();
    let split = std::fs::read_to_string(&split_path).unwrap();
    assert_eq!(full, split);
}

#[tokio::test(start_paused = true)]
async fn test_completed_store_processes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.csv");
    let corpus = corpus(5);
    let runner = keyword_runner(fast());

    let mut store = RowStore::open(&path, &runner.source_names()).unwrap();
    runner.run(&corpus, &mut store).await.unwrap();
    let again = runner.run(&corpus, &mut store).await.unwrap();

    assert_eq!(again.processed_rows, 0);
    assert_eq!(again.already_processed, 5);
    assert_eq!(store.len(), 5);
}

// ============================================================================
// Fail-safe default
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_always_raising_source_fills_column_with_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.csv");
    let runner = BatchRunner::new(
        vec![
            Box::new(KeywordAdjudicator { name: "model", keyword: "hate" }),
            Box::new(RetryingAdjudicator::new(AlwaysRaises, RetryPolicy::new(2))),
        ],
        fast(),
    )
    .unwrap();

    let mut store = RowStore::open(&path, &runner.source_names()).unwrap();
    let summary = runner.run(&corpus(7), &mut store).await.unwrap();

    assert!(summary.is_complete());
    assert_eq!(summary.failures["broken"], 7);
    assert_eq!(summary.failures["model"], 0);

    let table = RowTable::read(&path).unwrap();
    let broken = table.source_index("broken").unwrap();
    assert_eq!(table.len(), 7);
    assert!(table.rows.iter().all(|r| r.labels[broken] == Label::Toxic));
    assert!(table.rows.iter().all(|r| r.is_failed("broken")));
}

// ============================================================================
// Batch-level failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_length_mismatch_skips_only_that_batch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.csv");
    let runner = BatchRunner::new(
        vec![
            Box::new(KeywordAdjudicator { name: "model", keyword: "hate" }),
            Box::new(ShortOnPoison { poison: "message 5", calls: AtomicUsize::new(0) }),
        ],
        fast(),
    )
    .unwrap();

    let mut store = RowStore::open(&path, &runner.source_names()).unwrap();
    let summary = runner.run(&corpus(10), &mut store).await.unwrap();

    assert_eq!(summary.skipped_batches.len(), 1);
    let skipped = &summary.skipped_batches[0];
    assert_eq!((skipped.first_row, skipped.last_row), (5, 8));
    assert_eq!(skipped.source_name, "short");
    assert_eq!(summary.processed_rows, 6);
    assert_eq!(summary.resume_offset, 10);
    assert!(!summary.is_complete());

    let ids: Vec<u64> = RowTable::read(&path).unwrap().rows.iter().map(|r| r.row_index).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 9, 10]);
    drop(store);

    // Next run with a healthy source fills the skipped range and nothing else.
    let healthy = ShortOnPoison { poison: "no such text", calls: AtomicUsize::new(0) };
    let rerun = BatchRunner::new(
        vec![Box::new(KeywordAdjudicator { name: "model", keyword: "hate" }), Box::new(healthy)],
        fast(),
    )
    .unwrap();
    let mut store = RowStore::open(&path, &rerun.source_names()).unwrap();
    let second = rerun.run(&corpus(10), &mut store).await.unwrap();

    assert_eq!(second.already_processed, 6);
    assert_eq!(second.processed_rows, 4);
    assert_eq!(second.batches_committed, 1);
    assert!(second.is_complete());

    let table = RowTable::read(&path).unwrap();
    let ids: Vec<u64> = table.rows.iter().map(|r| r.row_index).collect();
    assert_eq!(ids, (1..=10).collect::<Vec<u64>>());
    assert_eq!(table.rows[5].text, "I hate message 6");
}

#[tokio::test(start_paused = true)]
async fn test_whole_batch_error_is_skipped_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.csv");
    let runner = BatchRunner::new(
        vec![
            Box::new(BatchErrorOnPoison { poison: "message 1" }),
            Box::new(KeywordAdjudicator { name: "model", keyword: "hate" }),
        ],
        fast().with_concurrent_sources(true),
    )
    .unwrap();

    let mut store = RowStore::open(&path, &runner.source_names()).unwrap();
    let summary = runner.run(&corpus(8), &mut store).await.unwrap();

    assert_eq!(summary.skipped_batches.len(), 1);
    assert_eq!(summary.skipped_batches[0].first_row, 1);
    assert!(summary.skipped_batches[0].reason.contains("connection reset"));
    assert_eq!(store.len(), 4);
    assert_eq!(store.resume_offset(), 8);
    assert!(!store.contains(1));
    assert_eq!(summary.skipped_rows(), 4);
}

// ============================================================================
// Pacing
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_inter_batch_delay_and_long_pause() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.csv");
    let config = RunnerConfig::new()
        .with_batch_size(5)
        .with_inter_batch_delay_ms(1500)
        .with_pause(10, 65);
    let runner = keyword_runner(config);

    let mut store = RowStore::open(&path, &runner.source_names()).unwrap();
    let started = tokio::time::Instant::now();
    runner.run(&corpus(15), &mut store).await.unwrap();

    // 1.5 s after batch 1, 65 s after batch 2 (crosses row 10), none after the last.
    assert!(started.elapsed() >= Duration::from_millis(66_500));
    assert!(started.elapsed() < Duration::from_secs(70));
}
