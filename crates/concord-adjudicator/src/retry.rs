//! # Retry/Backoff Wrapper
//!
//! One parameterised retry loop shared by every source.
//!
//! ## State machine (per request)
//!
//! ```text
//! ATTEMPT ──ok──────────────────────────────▶ SUCCESS
//!    │
//!    ├─transient (rate limit, timeout)──▶ WAIT min(2^n s, max_delay) ──▶ ATTEMPT
//!    │                                     (until max_attempts)
//!    └─permanent (auth, bad request)───────────────────────────────────▶ FAIL
//! ```
//!
//! On `FAIL` or exhaustion the [`RetryingAdjudicator`] substitutes the
//! fail-safe label and bumps its failure counter. Nothing propagates past
//! this layer during batch processing.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adjudicator::{Adjudicator, Judgement, SourceCall};
use crate::error::{Result, SourceError};
use crate::label::Label;
use crate::parse::ResponseParser;

/// Upper bound accepted for `max_attempts`.
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// Retry parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Cap on a single backoff wait.
    pub max_delay: Duration,
    /// Label substituted when a request ultimately fails.
    pub fail_safe_label: Label,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_delay: Duration::from_secs(10),
            fail_safe_label: Label::Toxic,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with `max_attempts` tries and default delays.
    ///
    /// # Panics
    /// Panics if `max_attempts` is zero or above [`MAX_ATTEMPTS_LIMIT`].
    pub fn new(max_attempts: u32) -> Self {
        assert!(
            (1..=MAX_ATTEMPTS_LIMIT).contains(&max_attempts),
            "max_attempts must be between 1 and {MAX_ATTEMPTS_LIMIT}"
        );
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Sets the backoff cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Sets the fail-safe label.
    pub fn with_fail_safe_label(mut self, label: Label) -> Self {
        self.fail_safe_label = label;
        self
    }

    /// Wait before retry number `attempt + 1`: `min(2^attempt s, max_delay)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let secs = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_secs(secs).min(self.max_delay)
    }

    /// Runs `op` under this policy.
    ///
    /// Transient errors are retried with backoff until `max_attempts` is
    /// reached; any other error is returned immediately.
    pub async fn execute<T, F, Fut>(&self, source: &str, mut op: F) -> std::result::Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, SourceError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    debug!(
                        source,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient source error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Adapts a [`SourceCall`] into a fail-safe batch [`Adjudicator`].
pub struct RetryingAdjudicator<S> {
    source: S,
    policy: RetryPolicy,
    parser: ResponseParser,
    throttle: Duration,
    failures: AtomicU64,
}

impl<S: SourceCall> RetryingAdjudicator<S> {
    /// Wraps `source` with `policy` and the default response parser.
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self {
            source,
            policy,
            parser: ResponseParser::new(),
            throttle: Duration::ZERO,
            failures: AtomicU64::new(0),
        }
    }

    /// Replaces the response parser.
    pub fn with_parser(mut self, parser: ResponseParser) -> Self {
        self.parser = parser;
        self
    }

    /// Pause between consecutive requests of one batch.
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// The active policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn judge(&self, index: usize, text: &str) -> Judgement {
        let name = self.source.name();
        match self.policy.execute(name, || self.source.call(text)).await {
            Ok(raw) => {
                let parsed = self.parser.parse(&raw);
                if parsed.ambiguous {
                    debug!(source = name, index, answer = %raw, "unclear answer, using fallback label");
                }
                Judgement::new(parsed.label, raw)
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    source = name,
                    index,
                    error = %err,
                    fallback = %self.policy.fail_safe_label,
                    "source call failed, substituting fail-safe label"
                );
                Judgement::fail_safe(self.policy.fail_safe_label, err.to_string())
            }
        }
    }
}

#[async_trait]
impl<S: SourceCall> Adjudicator for RetryingAdjudicator<S> {
    fn name(&self) -> &str {
        self.source.name()
    }

    async fn classify(&self, texts: &[String]) -> Result<Vec<Judgement>> {
        let mut judgements = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            if index > 0 && !self.throttle.is_zero() {
                tokio::time::sleep(self.throttle).await;
            }
            judgements.push(self.judge(index, text).await);
        }
        Ok(judgements)
    }

    fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
