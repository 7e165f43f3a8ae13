//! # Concord Store - Durable Tabular State
//!
//! Everything concord reads from or writes to disk goes through this crate.
//!
//! | Module | Role |
//! |--------|------|
//! | [`corpus`] | load the input corpus, decode reference polarity |
//! | [`row_store`] | append-only row store, resume offset |
//! | [`dedup`] | first-wins deduplication with provenance |
//! | [`text`] | dedup key normalisation |
//! | [`output`] | CSV/JSON result files |
//!
//! ## Data Flow
//!
//! ```text
//! corpus.csv ──load_corpus──▶ [TextUnit] ──(runner)──▶ RowStore::append_batch
//!                                                          │
//!                         RowTable::read ◀─────────────────┘
//!                              │
//!                              ▼
//!                        dedup_by_text ──▶ unique_rows.csv
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use concord_store::{load_corpus, CorpusConfig, RowStore};
//!
//! let corpus = load_corpus(&CorpusConfig::new("corpus.csv")).unwrap();
//! let sources = vec!["gemini".to_string(), "openai".to_string()];
//! let store = RowStore::open("llm_predictions_log.csv", &sources).unwrap();
//! let pending = corpus
//!     .units
//!     .iter()
//!     .filter(|u| !store.contains(u.id))
//!     .count();
//! println!("{pending} rows left");
//! ```

pub mod corpus;
pub mod dedup;
pub mod error;
pub mod output;
pub mod row_store;
pub mod text;

pub use corpus::{load_corpus, load_corpus_from, reference_counts, Corpus, CorpusConfig};
pub use dedup::{dedup_by_text, DedupEntry, Deduplicated, Deduplicator, Provenance};
pub use error::{Result, StoreError};
pub use output::{ensure_dir, write_csv, write_json};
pub use row_store::{header, RowStore, RowTable, StoredRow};
pub use text::{flatten_text, normalize_text, TextUnit};
