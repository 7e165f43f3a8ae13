//! Error types for concord-core.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for pipeline operations.
#[derive(Debug, Error)]
pub enum ConcordError {
    /// The configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        /// Config path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::ConcordConfig`].
    #[error("Failed to parse config {path}: {source}")]
    ConfigParse {
        /// Config path.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// The configuration parsed but is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Adjudicator construction failed.
    #[error("Adjudicator error: {0}")]
    Adjudicator(#[from] concord_adjudicator::AdjudicatorError),

    /// Corpus or row-store access failed.
    #[error("Store error: {0}")]
    Store(#[from] concord_store::StoreError),

    /// The batch run stopped.
    #[error("Runner error: {0}")]
    Runner(#[from] concord_runner::RunnerError),

    /// Analysis inputs were invalid.
    #[error("Consensus error: {0}")]
    Consensus(#[from] concord_consensus::ConsensusError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConcordError::Config("duplicate source 'grok'".to_string());
        assert_eq!(err.to_string(), "Configuration error: duplicate source 'grok'");
    }

    #[test]
    fn test_component_error_conversion() {
        let err: ConcordError = concord_consensus::ConsensusError::InvalidThreshold(-1.0).into();
        assert!(matches!(err, ConcordError::Consensus(_)));
    }
}
