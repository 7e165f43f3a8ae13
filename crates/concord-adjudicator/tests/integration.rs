//! # Integration Tests
//!
//! Scripted sources driven through the full retry + parse + fail-safe stack.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use concord_adjudicator::{
    Adjudicator, AdjudicatorResult, Label, RetryPolicy, RetryingAdjudicator, SourceCall,
    SourceError,
};

/// Source that answers from a script, one entry per call.
struct ScriptedSource {
    name: String,
    script: Mutex<VecDeque<Result<String, SourceError>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(name: &str, script: Vec<Result<String, SourceError>>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SourceCall for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, _text: &str) -> Result<String, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::Permanent("script exhausted".into())))
    }
}

/// Source that always fails with the same error.
struct BrokenSource(SourceError);

#[async_trait]
impl SourceCall for BrokenSource {
    fn name(&self) -> &str {
        "broken"
    }

    async fn call(&self, _text: &str) -> Result<String, SourceError> {
        Err(self.0.clone())
    }
}

fn texts(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("text number {i}")).collect()
}

// ============================================================================
// Fail-safe behaviour
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_always_failing_source_yields_fail_safe_labels() {
    let adjudicator = RetryingAdjudicator::new(
        BrokenSource(SourceError::Permanent("HTTP 401: bad key".into())),
        RetryPolicy::default(),
    );

    let batch = texts(5);
    let judgements = adjudicator.classify(&batch).await.unwrap();

    assert_eq!(judgements.len(), 5);
    assert!(judgements.iter().all(|j| j.label == Label::Toxic));
    assert!(judgements.iter().all(|j| j.is_fail_safe()));
    assert_eq!(adjudicator.failure_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_configured_fail_safe_label_is_used() {
    let policy = RetryPolicy::new(2).with_fail_safe_label(Label::Neutral);
    let adjudicator = RetryingAdjudicator::new(
        BrokenSource(SourceError::RateLimited("429".into())),
        policy,
    );

    let judgements = adjudicator.classify(&texts(2)).await.unwrap();
    assert!(judgements.iter().all(|j| j.label == Label::Neutral));
    assert_eq!(adjudicator.failure_count(), 2);
}

// ============================================================================
// Retry behaviour
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_rate_limited_item_recovers_without_touching_neighbours() {
    let source = ScriptedSource::new(
        "gemini",
        vec![
            Ok("Neutral".into()),
            Err(SourceError::RateLimited("429".into())),
            Err(SourceError::Timeout("deadline".into())),
            Ok("This is hate speech".into()),
            Ok("positive".into()),
        ],
    );
    let adjudicator = RetryingAdjudicator::new(source, RetryPolicy::new(3));

    let judgements = adjudicator.classify(&texts(3)).await.unwrap();
    let labels: Vec<Label> = judgements.iter().map(|j| j.label).collect();

    assert_eq!(labels, vec![Label::Neutral, Label::Toxic, Label::Neutral]);
    assert!(judgements.iter().all(|j| !j.is_fail_safe()));
    assert_eq!(adjudicator.failure_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_error_is_not_retried() {
    let source = ScriptedSource::new(
        "openai",
        vec![
            Err(SourceError::Malformed("empty body".into())),
            Ok("neutral".into()),
        ],
    );
    let adjudicator = RetryingAdjudicator::new(source, RetryPolicy::new(5));

    let judgements = adjudicator.classify(&texts(2)).await.unwrap();

    assert_eq!(judgements[0].label, Label::Toxic);
    assert!(judgements[0].is_fail_safe());
    assert_eq!(judgements[1].label, Label::Neutral);
    assert_eq!(adjudicator.failure_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_throttle_spaces_requests() {
    let source = ScriptedSource::new(
        "grok",
        vec![Ok("neutral".into()), Ok("neutral".into()), Ok("neutral".into())],
    );
    let adjudicator =
        RetryingAdjudicator::new(source, RetryPolicy::default()).with_throttle(Duration::from_millis(500));

    let started = tokio::time::Instant::now();
    adjudicator.classify(&texts(3)).await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(1));
}

// ============================================================================
// Result binding
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_results_bind_to_text_ids() {
    let source = ScriptedSource::new("claude", vec![Ok("toxic".into()), Ok("neutral".into())]);
    let adjudicator = RetryingAdjudicator::new(source, RetryPolicy::default());

    let ids = [11_u64, 12];
    let judgements = adjudicator.classify(&texts(2)).await.unwrap();
    let results: Vec<AdjudicatorResult> = ids
        .iter()
        .zip(judgements)
        .map(|(id, j)| AdjudicatorResult::new(adjudicator.name(), *id, j))
        .collect();

    assert_eq!(results[0].text_id, 11);
    assert_eq!(results[0].label, Label::Toxic);
    assert_eq!(results[1].source_name, "claude");
    assert_eq!(results[1].label, Label::Neutral);
}
