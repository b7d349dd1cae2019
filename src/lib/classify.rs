//! First-pass record classification.
//!
//! Every input record is counted. Only records that are mapped to a known reference
//! sequence survive into the output; unmapped records and mapped records whose
//! reference ID is missing or out of range are dropped.

use crate::bam_io::record_name;
use crate::metrics::ReadCounts;
use log::warn;
use noodles::sam::alignment::record_buf::RecordBuf;

/// Outcome of classifying one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Mapped to a known reference; written to the output.
    Keep,
    /// Carries the unmapped flag; dropped.
    Unmapped,
    /// Mapped, but its reference ID names no known reference; dropped.
    InvalidReference,
}

impl Classification {
    #[must_use]
    pub fn is_kept(self) -> bool {
        self == Classification::Keep
    }
}

/// Classifies records and accumulates the first-pass counts.
///
/// The invalid-reference warning is emitted at most once per classifier.
#[derive(Debug)]
pub struct StreamClassifier {
    reference_count: usize,
    counts: ReadCounts,
    warned_invalid_reference: bool,
}

impl StreamClassifier {
    /// Creates a classifier for a header declaring `reference_count` references.
    #[must_use]
    pub fn new(reference_count: usize) -> Self {
        Self { reference_count, counts: ReadCounts::default(), warned_invalid_reference: false }
    }

    /// Counts `record` and decides whether it is kept.
    pub fn classify(&mut self, record: &RecordBuf) -> Classification {
        self.counts.total_reads += 1;

        if record.flags().is_unmapped() {
            return Classification::Unmapped;
        }
        self.counts.mapped_reads += 1;

        match record.reference_sequence_id() {
            Some(id) if id < self.reference_count => Classification::Keep,
            _ => {
                self.counts.invalid_reference_reads += 1;
                if !self.warned_invalid_reference {
                    self.warned_invalid_reference = true;
                    warn!(
                        "Mapped read '{}' has no valid reference sequence; dropping it. \
                         Further reads like it are dropped silently.",
                        String::from_utf8_lossy(record_name(record))
                    );
                }
                Classification::InvalidReference
            }
        }
    }

    #[must_use]
    pub fn counts(&self) -> &ReadCounts {
        &self.counts
    }

    #[must_use]
    pub fn into_counts(self) -> ReadCounts {
        self.counts
    }

    /// True once the invalid-reference warning has been emitted.
    #[must_use]
    pub fn has_warned(&self) -> bool {
        self.warned_invalid_reference
    }
}
