//! Configuration types for concord.
//!
//! One TOML file configures the whole pipeline. Every section has
//! defaults, so an empty file is a valid configuration:
//!
//! ```toml
//! output_dir = "consensus_analysis"
//!
//! [corpus]
//! path = "corpus.csv"
//! polarity = "zero_is_toxic"
//!
//! [store]
//! path = "llm_predictions_log.csv"
//!
//! [runner]
//! batch_size = 10
//! pause_every_rows = 100
//!
//! [retry]
//! max_attempts = 3
//!
//! [consensus]
//! reference_weight = 2.0
//! source_weights = { gpt4 = 1.5 }
//!
//! [correction]
//! lexicon_path = "hatebase.csv"
//! screener = "gpt4"
//!
//! [[sources]]
//! name = "gpt4"
//! endpoint = "https://api.openai.com/v1/chat/completions"
//! model = "gpt-4o"
//! api_key_env = "OPENAI_API_KEY"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use concord_adjudicator::{Label, RetryPolicy, SourceConfig, MAX_ATTEMPTS_LIMIT};
use concord_consensus::ConsensusConfig;
use concord_runner::{RunnerConfig, MAX_BATCH_SIZE};
use concord_store::CorpusConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConcordError;
use crate::Result;

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcordConfig {
    /// Input corpus.
    pub corpus: CorpusConfig,

    /// Row store location.
    pub store: StoreConfig,

    /// Batch runner parameters.
    pub runner: RunnerConfig,

    /// Retry policy shared by all sources.
    pub retry: RetryConfig,

    /// Vote weights and view.
    pub consensus: ConsensusConfig,

    /// Correction stage.
    pub correction: CorrectionConfig,

    /// Classifier endpoints, in row-store column order.
    pub sources: Vec<SourceConfig>,

    /// Directory for analysis and correction outputs.
    pub output_dir: PathBuf,
}

impl Default for ConcordConfig {
    fn default() -> Self {
        Self {
            corpus: CorpusConfig::default(),
            store: StoreConfig::default(),
            runner: RunnerConfig::new(),
            retry: RetryConfig::default(),
            consensus: ConsensusConfig::default(),
            correction: CorrectionConfig::default(),
            sources: Vec::new(),
            output_dir: PathBuf::from("consensus_analysis"),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Append-only row store file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("llm_predictions_log.csv"),
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per request, including the first.
    pub max_attempts: u32,
    /// Cap on a single backoff wait.
    pub max_delay_secs: u64,
    /// Label substituted for failed requests.
    pub fail_safe_label: Label,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_delay_secs: 10,
            fail_safe_label: Label::Toxic,
        }
    }
}

impl RetryConfig {
    /// Builds the policy. Call [`ConcordConfig::validate`] first.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
            .with_max_delay(Duration::from_secs(self.max_delay_secs))
            .with_fail_safe_label(self.fail_safe_label)
    }
}

/// `[correction]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Header-less CSV of toxic terms.
    pub lexicon_path: Option<PathBuf>,
    /// Re-screen lexicon misses; defaults to on when a screener is named.
    pub rescreen: Option<bool>,
    /// Name of the `[[sources]]` entry used for re-screening.
    pub screener: Option<String>,
}

impl CorrectionConfig {
    /// Screener name when re-screening is enabled.
    pub fn active_screener(&self) -> Option<&str> {
        match (self.rescreen, self.screener.as_deref()) {
            (Some(false), _) => None,
            (_, screener) => screener,
        }
    }
}

impl ConcordConfig {
    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConcordError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConcordError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Source names in column order.
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name.clone()).collect()
    }

    /// Looks up a source by name.
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Checks value ranges and cross-references.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_BATCH_SIZE).contains(&self.runner.batch_size) {
            return Err(ConcordError::Config(format!(
                "runner.batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.runner.batch_size
            )));
        }
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&self.retry.max_attempts) {
            return Err(ConcordError::Config(format!(
                "retry.max_attempts must be between 1 and {MAX_ATTEMPTS_LIMIT}, got {}",
                self.retry.max_attempts
            )));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.name.as_str()) {
                return Err(ConcordError::Config(format!(
                    "duplicate source '{}'",
                    source.name
                )));
            }
        }

        self.consensus.validate()?;

        if let Some(screener) = &self.correction.screener {
            if self.source(screener).is_none() {
                return Err(ConcordError::Config(format!(
                    "correction.screener '{screener}' is not a configured source"
                )));
            }
        }
        Ok(())
    }

    /// [`Self::validate`] plus the checks needed to run the batch runner.
    pub fn validate_for_run(&self) -> Result<()> {
        self.validate()?;
        if self.sources.is_empty() {
            return Err(ConcordError::Config("no sources configured".to_string()));
        }
        Ok(())
    }
}
