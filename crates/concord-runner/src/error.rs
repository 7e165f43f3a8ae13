//! Error types for the batch runner.
//!
//! Only conditions that make further progress meaningless surface here.
//! A batch rejected by one adjudicator is skipped and reported in the
//! [`crate::RunSummary`], not raised.

use concord_store::StoreError;
use thiserror::Error;

/// Result type alias for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Errors that stop a run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The runner was built without adjudicators.
    #[error("no adjudicators configured")]
    NoAdjudicators,

    /// Two adjudicators share a name, so their columns would collide.
    #[error("duplicate adjudicator name '{0}'")]
    DuplicateSource(String),

    /// The row store was opened for a different source list.
    #[error("row store columns {store:?} do not match adjudicators {adjudicators:?}")]
    SourceMismatch {
        /// Sources of the row store.
        store: Vec<String>,
        /// Names of the configured adjudicators.
        adjudicators: Vec<String>,
    },

    /// A finished batch could not be made durable.
    ///
    /// Rows up to `resume_offset` are on disk; restart from there.
    #[error("failed to commit rows {first_row}..={last_row}, resume from offset {resume_offset}: {source}")]
    CommitFailed {
        /// First corpus row of the batch.
        first_row: u64,
        /// Last corpus row of the batch.
        last_row: u64,
        /// Last durable row index.
        resume_offset: u64,
        /// Underlying store error.
        source: StoreError,
    },

    /// Any other store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}
