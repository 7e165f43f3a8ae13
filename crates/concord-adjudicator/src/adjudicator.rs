//! The adjudicator boundary.
//!
//! Two traits sit at this seam:
//!
//! - [`SourceCall`] is one raw request to an external classifier. It may fail.
//! - [`Adjudicator`] is the batch contract the runner relies on: an ordered
//!   list of texts in, a same-length ordered list of [`Judgement`]s out.
//!   Per-item failures are substituted, never raised.
//!
//! [`crate::RetryingAdjudicator`] turns any `SourceCall` into an `Adjudicator`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SourceError};
use crate::label::Label;

/// One adjudicator's opinion on one text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judgement {
    /// The label, already resolved under the fail-closed policy.
    pub label: Label,
    /// Raw answer from the source (empty on failure).
    pub raw_response: String,
    /// Set when the label is a fail-safe substitution.
    pub error: Option<String>,
}

impl Judgement {
    /// A successful judgement.
    pub fn new(label: Label, raw_response: impl Into<String>) -> Self {
        Self {
            label,
            raw_response: raw_response.into(),
            error: None,
        }
    }

    /// A fail-safe substitution after the call failed.
    pub fn fail_safe(label: Label, error: impl Into<String>) -> Self {
        Self {
            label,
            raw_response: String::new(),
            error: Some(error.into()),
        }
    }

    /// True when the label was substituted.
    pub fn is_fail_safe(&self) -> bool {
        self.error.is_some()
    }
}

/// A judgement bound to its source and text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjudicatorResult {
    /// Adjudicator that produced the judgement.
    pub source_name: String,
    /// Id of the judged text unit.
    pub text_id: u64,
    /// Resolved label.
    pub label: Label,
    /// Raw answer from the source.
    pub raw_response: String,
    /// Failure description when the label is a fail-safe substitution.
    pub error: Option<String>,
}

impl AdjudicatorResult {
    /// Binds a judgement to a source and text id.
    pub fn new(source_name: impl Into<String>, text_id: u64, judgement: Judgement) -> Self {
        Self {
            source_name: source_name.into(),
            text_id,
            label: judgement.label,
            raw_response: judgement.raw_response,
            error: judgement.error,
        }
    }
}

/// A single request to an external classifier.
///
/// Implementors own their credentials and client. They return the raw
/// answer text; label inference happens above this layer.
#[async_trait]
pub trait SourceCall: Send + Sync {
    /// Stable source name, used as the row-store column suffix.
    fn name(&self) -> &str;

    /// Sends one text and returns the raw answer.
    async fn call(&self, text: &str) -> std::result::Result<String, SourceError>;
}

#[async_trait]
impl<T: SourceCall + ?Sized> SourceCall for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn call(&self, text: &str) -> std::result::Result<String, SourceError> {
        (**self).call(text).await
    }
}

/// Batch classification contract used by the runner.
#[async_trait]
pub trait Adjudicator: Send + Sync {
    /// Stable source name.
    fn name(&self) -> &str;

    /// Classifies `texts` in order.
    ///
    /// # Contract
    ///
    /// - The returned vector has exactly `texts.len()` entries.
    /// - An individual item failure yields a fail-safe [`Judgement`], not an error.
    /// - `Err` is reserved for failures of the whole batch.
    async fn classify(&self, texts: &[String]) -> Result<Vec<Judgement>>;

    /// Number of fail-safe substitutions made so far.
    fn failure_count(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_judgement_constructors() {
        let ok = Judgement::new(Label::Neutral, "neutral");
        assert!(!ok.is_fail_safe());

        let failed = Judgement::fail_safe(Label::Toxic, "rate limited");
        assert!(failed.is_fail_safe());
        assert_eq!(failed.label, Label::Toxic);
        assert!(failed.raw_response.is_empty());
    }

    #[test]
    fn test_result_binds_source_and_text() {
        let result = AdjudicatorResult::new("gemini", 42, Judgement::fail_safe(Label::Toxic, "boom"));
        assert_eq!(result.source_name, "gemini");
        assert_eq!(result.text_id, 42);
        assert_eq!(result.error.as_deref(), Some("boom"));
    }
}
