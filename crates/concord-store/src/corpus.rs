//! Corpus loading.
//!
//! A corpus is a CSV file with at least a text column and an integer
//! reference-label column. Labels are decoded through the configured
//! [`LabelPolarity`] so everything downstream sees canonical [`Label`]s.
//! Rows with a missing or non-binary label are skipped and counted.

use std::path::{Path, PathBuf};

use concord_adjudicator::{Label, LabelPolarity};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, StoreError};
use crate::text::TextUnit;

fn default_text_column() -> String {
    "text".to_string()
}

fn default_label_column() -> String {
    "label".to_string()
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("corpus.csv")
}

/// `[corpus]` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// CSV file to read.
    #[serde(default = "default_corpus_path")]
    pub path: PathBuf,
    /// Header of the text column.
    #[serde(default = "default_text_column")]
    pub text_column: String,
    /// Header of the reference-label column.
    #[serde(default = "default_label_column")]
    pub label_column: String,
    /// Integer encoding of the reference label.
    #[serde(default)]
    pub polarity: LabelPolarity,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: default_corpus_path(),
            text_column: default_text_column(),
            label_column: default_label_column(),
            polarity: LabelPolarity::default(),
        }
    }
}

impl CorpusConfig {
    /// Config for `path` with default columns and polarity.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Sets the integer polarity.
    pub fn with_polarity(mut self, polarity: LabelPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Sets the column names.
    pub fn with_columns(mut self, text: impl Into<String>, label: impl Into<String>) -> Self {
        self.text_column = text.into();
        self.label_column = label.into();
        self
    }
}

/// A loaded corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    /// Units in corpus order.
    pub units: Vec<TextUnit>,
    /// Rows dropped for an unusable label.
    pub skipped_rows: usize,
}

impl Corpus {
    /// Wraps already-built units.
    pub fn from_units(units: Vec<TextUnit>) -> Self {
        Self {
            units,
            skipped_rows: 0,
        }
    }

    /// Number of usable units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// True when no unit was loaded.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Parses a reference cell as an integer, tolerating `1.0`-style floats.
fn parse_code(cell: &str) -> Option<i64> {
    let cell = cell.trim();
    if let Ok(code) = cell.parse::<i64>() {
        return Some(code);
    }
    match cell.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 => Some(value as i64),
        _ => None,
    }
}

fn column_index(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| StoreError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        })
}

/// Loads the corpus described by `config`.
pub fn load_corpus(config: &CorpusConfig) -> Result<Corpus> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(&config.path)?;

    let headers = reader.headers()?.clone();
    let text_idx = column_index(&headers, &config.text_column, &config.path)?;
    let label_idx = column_index(&headers, &config.label_column, &config.path)?;

    let mut corpus = Corpus::default();
    for (position, record) in reader.records().enumerate() {
        let record = record?;
        let id = position as u64 + 1;
        let text = record.get(text_idx).unwrap_or_default();
        let label_cell = record.get(label_idx).unwrap_or_default();

        match parse_code(label_cell).and_then(|code| config.polarity.decode(code)) {
            Some(label) => corpus.units.push(TextUnit::new(id, text, Some(label))),
            None => {
                warn!(row = id, label = label_cell, "skipping corpus row with unusable label");
                corpus.skipped_rows += 1;
            }
        }
    }

    info!(
        path = %config.path.display(),
        units = corpus.units.len(),
        skipped = corpus.skipped_rows,
        "corpus loaded"
    );
    Ok(corpus)
}

/// Convenience for the common case of a polarity-only override.
pub fn load_corpus_from(path: impl AsRef<Path>, polarity: LabelPolarity) -> Result<Corpus> {
    load_corpus(&CorpusConfig::new(path.as_ref()).with_polarity(polarity))
}

/// Counts units per reference label.
pub fn reference_counts(corpus: &Corpus) -> (usize, usize) {
    corpus.units.iter().fold((0, 0), |(toxic, neutral), unit| {
        match unit.reference_label {
            Some(Label::Toxic) => (toxic + 1, neutral),
            Some(Label::Neutral) => (toxic, neutral + 1),
            _ => (toxic, neutral),
        }
    })
}
