//! Run bookkeeping: skipped batches and the final summary.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A batch that was not committed because an adjudicator rejected it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedBatch {
    /// First corpus row of the batch.
    pub first_row: u64,
    /// Last corpus row of the batch.
    pub last_row: u64,
    /// Units in the batch.
    pub rows: usize,
    /// Adjudicator that failed the batch.
    pub source_name: String,
    /// Error description.
    pub reason: String,
}

/// Outcome of one [`crate::BatchRunner::run`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique id of this run, for correlating logs.
    pub run_id: Uuid,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Usable corpus units.
    pub total_units: usize,
    /// Units already in the row store when the run started.
    pub already_processed: usize,
    /// Rows committed by this run.
    pub processed_rows: usize,
    /// Batches committed by this run.
    pub batches_committed: usize,
    /// Batches skipped, with their row ranges for a re-run.
    pub skipped_batches: Vec<SkippedBatch>,
    /// Fail-safe substitutions per source.
    pub failures: BTreeMap<String, u64>,
    /// Highest durable row index.
    pub resume_offset: u64,
    /// Run duration.
    pub elapsed_ms: u64,
    /// True when the run stopped on its batch limit with work left.
    pub stopped_early: bool,
}

impl RunSummary {
    /// Empty summary stamped with a fresh id and the current time.
    pub fn start(total_units: usize, already_processed: usize, resume_offset: u64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            total_units,
            already_processed,
            processed_rows: 0,
            batches_committed: 0,
            skipped_batches: Vec::new(),
            failures: BTreeMap::new(),
            resume_offset,
            elapsed_ms: 0,
            stopped_early: false,
        }
    }

    /// Rows that belong to skipped batches.
    pub fn skipped_rows(&self) -> usize {
        self.skipped_batches.iter().map(|b| b.rows).sum()
    }

    /// Total fail-safe substitutions across sources.
    pub fn total_failures(&self) -> u64 {
        self.failures.values().sum()
    }

    /// True when every unit is durable and nothing was skipped.
    pub fn is_complete(&self) -> bool {
        !self.stopped_early
            && self.skipped_batches.is_empty()
            && self.already_processed + self.processed_rows == self.total_units
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {}", self.run_id)?;
        writeln!(
            f,
            "  processed {} rows in {} batches ({} already done, {} total)",
            self.processed_rows, self.batches_committed, self.already_processed, self.total_units
        )?;
        writeln!(f, "  elapsed {:.1}s", self.elapsed_ms as f64 / 1000.0)?;
        for (source, count) in &self.failures {
            writeln!(f, "  {source}: {count} fail-safe labels")?;
        }
        for batch in &self.skipped_batches {
            writeln!(
                f,
                "  skipped rows {}..={} ({}): {}",
                batch.first_row, batch.last_row, batch.source_name, batch.reason
            )?;
        }
        write!(f, "  resume offset {}", self.resume_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completeness() {
        let mut summary = RunSummary::start(20, 10, 10);
        summary.processed_rows = 10;
        assert!(summary.is_complete());

        summary.skipped_batches.push(SkippedBatch {
            first_row: 11,
            last_row: 16,
            rows: 5,
            source_name: "grok".into(),
            reason: "boom".into(),
        });
        assert!(!summary.is_complete());
        // Row 13 was dropped by the corpus loader.
        assert_eq!(summary.skipped_rows(), 5);
    }

    #[test]
    fn test_display_lists_each_skipped_batch_once() {
        let mut summary = RunSummary::start(8, 0, 0);
        summary.skipped_batches.push(SkippedBatch {
            first_row: 5,
            last_row: 8,
            rows: 4,
            source_name: "short".into(),
            reason: "3 labels for 4 texts".into(),
        });
        let text = summary.to_string();
        assert_eq!(text.matches("skipped rows 5..=8 (short)").count(), 1);
    }

    #[test]
    fn test_display_mentions_offset_and_failures() {
        let mut summary = RunSummary::start(5, 0, 0);
        summary.failures.insert("gemini".into(), 3);
        summary.resume_offset = 5;
        let text = summary.to_string();
        assert!(text.contains("gemini: 3 fail-safe labels"));
        assert!(text.contains("resume offset 5"));
        assert_eq!(summary.total_failures(), 3);
    }
}
