//! Read counts accumulated by the classification and grouping passes.
//!
//! - [`ReadCounts`] - The counts reported at the end of a run
//! - [`writer`] - Metrics file I/O utilities
//!
//! # Traits
//!
//! - [`Metric`] - Core trait for serializable metrics

pub mod writer;

use serde::{Deserialize, Serialize};

pub use writer::{write_metrics, write_metrics_auto};

/// A metric type that can be serialized to TSV files.
pub trait Metric: Serialize + for<'de> Deserialize<'de> + Clone + Default {
    /// Human-readable name for this metric type.
    ///
    /// Used in error messages and logging when writing metrics files.
    fn metric_name() -> &'static str;
}

/// Counts of reads seen across a run.
///
/// Each pass owns its own instance: the classification pass fills `total_reads`,
/// `mapped_reads` and `invalid_reference_reads`; the grouping pass fills the
/// `unique_*` fields. [`ReadCounts::from_passes`] combines them for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadCounts {
    /// Every record in the input.
    pub total_reads: u64,
    /// Input records without the unmapped flag.
    pub mapped_reads: u64,
    /// Distinct (name, mate slot) observations among mapped records.
    pub unique_mapped_reads: u64,
    /// Distinct (name, mate slot) observations.
    pub unique_total_reads: u64,
    /// (name, mate slot) observations seen more than once, counted once each.
    pub unique_multi_mapped_reads: u64,
    /// Mapped input records dropped for referencing no known reference sequence.
    pub invalid_reference_reads: u64,
}

impl ReadCounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Combines the classification pass counts with the grouping pass counts.
    #[must_use]
    pub fn from_passes(classified: &ReadCounts, grouped: &ReadCounts) -> Self {
        Self {
            total_reads: classified.total_reads,
            mapped_reads: classified.mapped_reads,
            invalid_reference_reads: classified.invalid_reference_reads,
            unique_mapped_reads: grouped.unique_mapped_reads,
            unique_total_reads: grouped.unique_total_reads,
            unique_multi_mapped_reads: grouped.unique_multi_mapped_reads,
        }
    }

    /// Fraction of input reads that are mapped, or 0 for an empty input.
    #[must_use]
    pub fn mapped_fraction(&self) -> f64 {
        if self.total_reads == 0 { 0.0 } else { self.mapped_reads as f64 / self.total_reads as f64 }
    }

    /// Fraction of unique reads that are mapped, or 0 when there are none.
    #[must_use]
    pub fn unique_mapped_fraction(&self) -> f64 {
        if self.unique_total_reads == 0 {
            0.0
        } else {
            self.unique_mapped_reads as f64 / self.unique_total_reads as f64
        }
    }
}

impl Metric for ReadCounts {
    fn metric_name() -> &'static str {
        "read count"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_passes() {
        let classified = ReadCounts {
            total_reads: 10,
            mapped_reads: 8,
            invalid_reference_reads: 1,
            unique_total_reads: 99,
            ..ReadCounts::default()
        };
        let grouped = ReadCounts {
            total_reads: 99,
            unique_mapped_reads: 5,
            unique_total_reads: 6,
            unique_multi_mapped_reads: 1,
            ..ReadCounts::default()
        };

        let combined = ReadCounts::from_passes(&classified, &grouped);
        assert_eq!(combined, ReadCounts {
            total_reads: 10,
            mapped_reads: 8,
            unique_mapped_reads: 5,
            unique_total_reads: 6,
            unique_multi_mapped_reads: 1,
            invalid_reference_reads: 1,
        });
    }

    #[test]
    fn test_fractions() {
        assert!(ReadCounts::new().mapped_fraction().abs() < f64::EPSILON);
        assert!(ReadCounts::new().unique_mapped_fraction().abs() < f64::EPSILON);

        let counts = ReadCounts {
            total_reads: 4,
            mapped_reads: 3,
            unique_total_reads: 2,
            unique_mapped_reads: 1,
            ..ReadCounts::default()
        };
        assert!((counts.mapped_fraction() - 0.75).abs() < f64::EPSILON);
        assert!((counts.unique_mapped_fraction() - 0.5).abs() < f64::EPSILON);
    }
}
