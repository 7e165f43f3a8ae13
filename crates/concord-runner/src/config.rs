//! Runner configuration (`[runner]` section).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest accepted batch size.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Batch runner parameters.
///
/// # Example
///
/// ```rust
/// use concord_runner::RunnerConfig;
///
/// let config = RunnerConfig::new()
///     .with_batch_size(50)
///     .with_inter_batch_delay_ms(0)
///     .with_pause(100, 65);
/// assert_eq!(config.batch_size, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Texts per batch.
    pub batch_size: usize,
    /// Sleep between consecutive batches.
    pub inter_batch_delay_ms: u64,
    /// Take a long pause every this many rows (`0` disables).
    pub pause_every_rows: usize,
    /// Length of the long pause.
    pub pause_secs: u64,
    /// Query sources of one batch concurrently.
    pub concurrent_sources: bool,
    /// Stop after this many batches (the rest is left for a resumed run).
    pub max_batches: Option<usize>,
}

impl RunnerConfig {
    /// Creates a config with default values.
    ///
    /// Defaults:
    /// - Batch size: 10
    /// - Inter-batch delay: 1500 ms
    /// - Long pause: disabled (65 s when enabled)
    /// - Sources: sequential
    #[must_use]
    pub const fn new() -> Self {
        Self {
            batch_size: 10,
            inter_batch_delay_ms: 1500,
            pause_every_rows: 0,
            pause_secs: 65,
            concurrent_sources: false,
            max_batches: None,
        }
    }

    /// Sets the batch size.
    ///
    /// # Panics
    /// Panics if `size` is zero or above [`MAX_BATCH_SIZE`].
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        assert!(
            (1..=MAX_BATCH_SIZE).contains(&size),
            "batch_size must be between 1 and {MAX_BATCH_SIZE}"
        );
        self.batch_size = size;
        self
    }

    /// Sets the inter-batch delay.
    #[must_use]
    pub const fn with_inter_batch_delay_ms(mut self, millis: u64) -> Self {
        self.inter_batch_delay_ms = millis;
        self
    }

    /// Enables a `secs`-long pause every `rows` rows.
    #[must_use]
    pub const fn with_pause(mut self, rows: usize, secs: u64) -> Self {
        self.pause_every_rows = rows;
        self.pause_secs = secs;
        self
    }

    /// Runs the sources of one batch concurrently.
    #[must_use]
    pub const fn with_concurrent_sources(mut self, enabled: bool) -> Self {
        self.concurrent_sources = enabled;
        self
    }

    /// Stops after `batches` batches.
    #[must_use]
    pub const fn with_max_batches(mut self, batches: usize) -> Self {
        self.max_batches = Some(batches);
        self
    }

    /// Inter-batch delay as a [`Duration`].
    #[must_use]
    pub const fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    /// Long pause as a [`Duration`].
    #[must_use]
    pub const fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_secs)
    }

    /// Delay owed after a batch moved the row count from `before` to `after`.
    ///
    /// Crossing a multiple of `pause_every_rows` earns the long pause,
    /// anything else the inter-batch delay.
    #[must_use]
    pub fn delay_after(&self, before: usize, after: usize) -> Duration {
        if self.pause_every_rows > 0 && before / self.pause_every_rows != after / self.pause_every_rows {
            self.pause()
        } else {
            self.inter_batch_delay()
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.inter_batch_delay(), Duration::from_millis(1500));
        assert_eq!(config.pause_every_rows, 0);
        assert!(!config.concurrent_sources);
        assert!(config.max_batches.is_none());
    }

    #[test]
    #[should_panic(expected = "batch_size must be between 1 and 1000")]
    fn test_zero_batch_size_rejected() {
        let _ = RunnerConfig::new().with_batch_size(0);
    }

    #[test]
    fn test_delay_after_crossing_pause_boundary() {
        let config = RunnerConfig::new().with_pause(100, 65);
        assert_eq!(config.delay_after(80, 90), Duration::from_millis(1500));
        assert_eq!(config.delay_after(90, 100), Duration::from_secs(65));
        assert_eq!(config.delay_after(100, 110), Duration::from_millis(1500));
    }

    #[test]
    fn test_pause_disabled() {
        let config = RunnerConfig::new().with_inter_batch_delay_ms(0);
        assert_eq!(config.delay_after(0, 1000), Duration::ZERO);
    }
}
