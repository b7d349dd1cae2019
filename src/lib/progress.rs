//! Progress logging for record passes.
//!
//! Each pass over the alignment stream owns one [`ProgressLogger`], counting records
//! and logging whenever the count reaches a multiple of the interval.

use crate::logging::format_count;
use log::info;

/// Default number of records between progress messages.
pub const DEFAULT_INTERVAL: u64 = 1_000_000;

/// Logs record counts at regular intervals during a single pass.
///
/// # Example
/// ```
/// use bamverify_lib::progress::ProgressLogger;
///
/// let mut progress = ProgressLogger::new("Classified").with_interval(100);
/// for _ in 0..250 {
///     progress.record();  // Logs at 100, 200
/// }
/// progress.finish();  // Logs "Classified 250 records (complete)"
/// assert_eq!(progress.count(), 250);
/// ```
#[derive(Debug)]
pub struct ProgressLogger {
    /// Progress is logged when the count reaches a multiple of this.
    interval: u64,
    /// Message prefix for log output.
    message: String,
    count: u64,
}

impl ProgressLogger {
    /// Create a logger with the default interval.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: DEFAULT_INTERVAL, message: message.into(), count: 0 }
    }

    /// Set the logging interval; zero is treated as one.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Count one record, logging if an interval boundary was reached.
    ///
    /// Returns `true` when a message was logged.
    pub fn record(&mut self) -> bool {
        self.count += 1;
        if self.count.is_multiple_of(self.interval) {
            info!("{} {} records", self.message, format_count(self.count));
            true
        } else {
            false
        }
    }

    /// Log the final count unless the last [`record`](Self::record) already did.
    pub fn finish(&self) {
        if self.count > 0 && !self.count.is_multiple_of(self.interval) {
            info!("{} {} records (complete)", self.message, format_count(self.count));
        }
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }
}
