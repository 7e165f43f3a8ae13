//! Error types for corpus and row-store I/O.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or writing tabular files.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding failure (summaries).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required column is absent from a header.
    #[error("{path}: missing column '{column}'")]
    MissingColumn {
        /// File being read.
        path: PathBuf,
        /// Column that was expected.
        column: String,
    },

    /// An existing row store was written for a different source set.
    #[error("{path}: header {found:?} does not match expected {expected:?}")]
    HeaderMismatch {
        /// Row-store path.
        path: PathBuf,
        /// Header derived from the configured sources.
        expected: Vec<String>,
        /// Header found on disk.
        found: Vec<String>,
    },

    /// A row could not be read or would break the store's ordering.
    #[error("{path}: invalid row {row}: {reason}")]
    InvalidRow {
        /// File being read or written.
        path: PathBuf,
        /// Row index (or line) concerned.
        row: u64,
        /// What is wrong with it.
        reason: String,
    },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
