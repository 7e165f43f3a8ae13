//! Error types for consensus analysis and correction.
//!
//! Invariant violations (bucket totals, dedup totals, correction
//! reconciliation) are assertions, not variants of this enum.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while configuring or loading analysis inputs.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// The lexicon file could not be read.
    #[error("Failed to read lexicon {path}: {source}")]
    Lexicon {
        /// Lexicon path.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// A source weight is zero, negative or not a number.
    #[error("Invalid weight {weight} for '{name}'")]
    InvalidWeight {
        /// Source (or `reference`) the weight belongs to.
        name: String,
        /// Rejected value.
        weight: f64,
    },

    /// The decision threshold is not a positive number.
    #[error("Invalid decision threshold: {0}")]
    InvalidThreshold(f64),

    /// Row-store access failed.
    #[error(transparent)]
    Store(#[from] concord_store::StoreError),
}

/// Result type for consensus operations.
pub type Result<T> = std::result::Result<T, ConsensusError>;
