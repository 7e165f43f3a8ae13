//! # Concord Adjudicator - Classifier Boundary
//!
//! Every external classifier in the ensemble (a production ML model, a
//! handful of hosted LLMs) is reached through this crate. It turns an
//! unreliable, rate-limited network call into a length-preserving batch
//! classification that never fails per item.
//!
//! ## Layers
//!
//! | Layer | Type | Failure behaviour |
//! |-------|------|-------------------|
//! | Raw request | [`SourceCall`] | returns [`SourceError`] |
//! | Retry/backoff | [`RetryPolicy`] | retries transient errors only |
//! | Label inference | [`ResponseParser`] | ambiguous answers fall back to toxic |
//! | Batch contract | [`Adjudicator`] / [`RetryingAdjudicator`] | fail-safe label per item |
//!
//! ## Architecture
//!
//! ```text
//!   texts ──▶ RetryingAdjudicator ──▶ [Judgement; n]
//!                │          ▲
//!                │  retry   │ ResponseParser
//!                ▼          │
//!             SourceCall ───┘
//!        (ChatCompletionSource,
//!         scripted test sources)
//! ```
//!
//! ## Fail-closed policy
//!
//! A request that cannot be completed yields [`Label::Toxic`] (configurable
//! through [`RetryPolicy::fail_safe_label`]) plus an error note. Unmoderated
//! content is never silently passed as neutral.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use concord_adjudicator::{
//!     Adjudicator, ChatCompletionSource, RetryPolicy, RetryingAdjudicator, SourceConfig,
//! };
//!
//! # async fn demo(config: SourceConfig) -> concord_adjudicator::Result<()> {
//! let source = ChatCompletionSource::from_config(&config)?;
//! let adjudicator = RetryingAdjudicator::new(source, RetryPolicy::default());
//!
//! let texts = vec!["have a nice day".to_string()];
//! let judgements = adjudicator.classify(&texts).await?;
//! assert_eq!(judgements.len(), texts.len());
//! # Ok(())
//! # }
//! ```

pub mod adjudicator;
pub mod error;
pub mod http;
pub mod label;
pub mod parse;
pub mod retry;
pub mod term;

pub use adjudicator::{Adjudicator, AdjudicatorResult, Judgement, SourceCall};
pub use error::{AdjudicatorError, Result, SourceError};
pub use http::{
    ChatCompletionSource, SourceConfig, DEFAULT_CLASSIFY_PROMPT, DEFAULT_SCREEN_PROMPT,
};
pub use label::{Label, LabelPolarity};
pub use parse::{LabelRule, ParsedResponse, ResponseParser};
pub use retry::{RetryPolicy, RetryingAdjudicator, MAX_ATTEMPTS_LIMIT};
pub use term::TermExtractor;
