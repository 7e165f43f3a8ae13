//! Error types for adjudicator calls.
//!
//! [`SourceError`] describes a single failed request to an external
//! classifier. [`AdjudicatorError`] describes a batch that could not be
//! produced at all.

use thiserror::Error;

/// Failure of one request to an external classifier.
///
/// The variant decides the retry behaviour: only [`SourceError::is_transient`]
/// errors are retried with backoff, everything else fails fast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The provider is shedding load (HTTP 429 and friends).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The request did not complete in time or the connection dropped.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The request itself is wrong (auth, bad model name, malformed body).
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// The provider answered but the payload could not be read.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Returns true for capacity errors that are worth waiting out.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Timeout(_))
    }
}

/// Errors raised for a whole batch.
#[derive(Debug, Error)]
pub enum AdjudicatorError {
    /// An adjudicator broke the length-preserving contract.
    #[error("adjudicator '{source_name}' returned {got} labels for a batch of {expected}")]
    LengthMismatch {
        /// Name of the offending adjudicator.
        source_name: String,
        /// Batch size handed in.
        expected: usize,
        /// Number of labels returned.
        got: usize,
    },

    /// The adjudicator could not process the batch at all.
    #[error("adjudicator '{0}' failed for the whole batch: {1}")]
    BatchFailure(String, String),

    /// The adjudicator could not be constructed from its configuration.
    #[error("invalid configuration for source '{0}': {1}")]
    Config(String, String),
}

/// Result type for adjudicator operations.
pub type Result<T> = std::result::Result<T, AdjudicatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SourceError::RateLimited("429".into()).is_transient());
        assert!(SourceError::Timeout("30s".into()).is_transient());
        assert!(!SourceError::Permanent("401".into()).is_transient());
        assert!(!SourceError::Malformed("no choices".into()).is_transient());
    }

    #[test]
    fn test_length_mismatch_display() {
        let err = AdjudicatorError::LengthMismatch {
            source_name: "openai".to_string(),
            expected: 10,
            got: 9,
        };
        let msg = err.to_string();
        assert!(msg.contains("openai"));
        assert!(msg.contains("10"));
        assert!(msg.contains('9'));
    }

    #[test]
    fn test_config_error_display() {
        let err = AdjudicatorError::Config("grok".to_string(), "missing key".to_string());
        assert!(err.to_string().contains("grok"));
        assert!(err.to_string().contains("missing key"));
    }
}
