//! Second-pass duplicate counting over a name-sorted stream.
//!
//! Records sharing a read name form a group. Within a group each mate slot (R1 or
//! unpaired, and R2) contributes at most one unique read; further records in the same
//! slot are secondary alignments of the same physical read and are counted once,
//! as a multiply-mapped read.
//!
//! The stream must be grouped by name. Each new name is checked to sort strictly
//! after the previous one, so a stream that revisits a name fails instead of
//! silently double-counting.

use crate::bam_io::record_name;
use crate::errors::{Result, VerifyError};
use crate::metrics::ReadCounts;
use crate::sort::keys::compare_identifiers;
use log::info;
use noodles::sam::alignment::record_buf::RecordBuf;
use std::cmp::Ordering;

/// Which end of a read pair a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MateSlot {
    /// First mate, or an unpaired read.
    First = 0,
    /// Second mate.
    Second = 1,
}

impl MateSlot {
    #[must_use]
    pub fn of(record: &RecordBuf) -> Self {
        if record.flags().is_last_segment() { MateSlot::Second } else { MateSlot::First }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// What a single record contributed to the counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First record of a new name.
    NewGroup,
    /// First record in the other mate slot of the current name.
    NewSlot,
    /// Second record in an already-seen slot; counted as multiply-mapped.
    FirstDuplicate,
    /// Any later record in a slot already counted as multiply-mapped.
    RepeatDuplicate,
}

/// Per-name scratch state.
#[derive(Debug, Default)]
struct MateGroupState {
    identifier: Option<Vec<u8>>,
    seen_slot: [bool; 2],
    seen_multi_mapped: [bool; 2],
}

impl MateGroupState {
    fn start(&mut self, identifier: &[u8]) {
        let current = self.identifier.get_or_insert_with(Vec::new);
        current.clear();
        current.extend_from_slice(identifier);
        self.seen_slot = [false; 2];
        self.seen_multi_mapped = [false; 2];
    }
}

/// Counts unique and multiply-mapped reads over a name-grouped record stream.
#[derive(Debug, Default)]
pub struct DuplicateGrouper {
    state: MateGroupState,
    counts: ReadCounts,
    trace_duplicates: bool,
}

impl DuplicateGrouper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log every duplicate slot observation at `info` level.
    #[must_use]
    pub fn trace_duplicates(mut self, enabled: bool) -> Self {
        self.trace_duplicates = enabled;
        self
    }

    /// Folds one record into the counts.
    ///
    /// # Errors
    /// Returns [`VerifyError::UngroupedIdentifier`] if the record starts a new group
    /// whose name does not sort after the previous group's.
    pub fn observe(&mut self, record: &RecordBuf) -> Result<Observation> {
        let identifier = record_name(record);
        let slot = MateSlot::of(record).index();
        let mapped = !record.flags().is_unmapped();

        let observation = if self.state.identifier.as_deref() == Some(identifier) {
            if !self.state.seen_slot[slot] {
                self.count_unique(slot, mapped);
                Observation::NewSlot
            } else if self.state.seen_multi_mapped[slot] {
                Observation::RepeatDuplicate
            } else {
                if mapped {
                    self.counts.unique_multi_mapped_reads += 1;
                }
                self.state.seen_multi_mapped[slot] = true;
                Observation::FirstDuplicate
            }
        } else {
            if let Some(previous) = self.state.identifier.as_deref() {
                if compare_identifiers(identifier, previous) != Ordering::Greater {
                    return Err(VerifyError::UngroupedIdentifier {
                        identifier: String::from_utf8_lossy(identifier).into_owned(),
                        previous: String::from_utf8_lossy(previous).into_owned(),
                    });
                }
            }
            self.state.start(identifier);
            self.count_unique(slot, mapped);
            Observation::NewGroup
        };

        if self.trace_duplicates
            && matches!(observation, Observation::FirstDuplicate | Observation::RepeatDuplicate)
        {
            info!(
                "Duplicate observation of '{}' mate slot {}",
                String::from_utf8_lossy(identifier),
                slot
            );
        }

        Ok(observation)
    }

    fn count_unique(&mut self, slot: usize, mapped: bool) {
        if mapped {
            self.counts.unique_mapped_reads += 1;
        }
        self.counts.unique_total_reads += 1;
        self.state.seen_slot[slot] = true;
    }

    #[must_use]
    pub fn counts(&self) -> &ReadCounts {
        &self.counts
    }

    #[must_use]
    pub fn into_counts(self) -> ReadCounts {
        self.counts
    }
}
