//! Builders for creating test SAM/BAM records and files.
//!
//! - [`RecordBuilder`]: Creates individual records without header management
//! - [`AlignmentFileBuilder`]: Accumulates records under a header and writes them as
//!   BAM or text SAM
//!
//! ## Examples
//!
//! ```rust
//! use bamverify_lib::sam::builder::RecordBuilder;
//!
//! // A mapped R1 on the first reference
//! let record = RecordBuilder::new()
//!     .name("read1")
//!     .sequence("ACGTACGT")
//!     .first_segment(true)
//!     .reference_sequence_id(0)
//!     .alignment_start(100)
//!     .build();
//! assert!(record.flags().is_first_segment());
//! ```

use anyhow::Result;
use bstr::BString;
use noodles::core::Position;
use noodles::sam::Header;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::MappingQuality;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record_buf::{QualityScores, RecordBuf, Sequence};
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::ReferenceSequence;
use std::fs::File;
use std::num::NonZeroUsize;
use std::path::Path;

pub const DEFAULT_BASE_QUALITY: u8 = 30;
pub const DEFAULT_MAPQ: u8 = 60;

/// Builder for a single [`RecordBuf`].
#[derive(Debug)]
pub struct RecordBuilder {
    name: Option<Vec<u8>>,
    flags: Flags,
    reference_sequence_id: Option<usize>,
    alignment_start: Option<usize>,
    cigar: Option<String>,
    sequence: Vec<u8>,
    qualities: Vec<u8>,
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            flags: Flags::empty(),
            reference_sequence_id: None,
            alignment_start: None,
            cigar: None,
            sequence: Vec::new(),
            qualities: Vec::new(),
        }
    }

    /// Creates a builder for a mapped read on reference 0 at position 1.
    #[must_use]
    pub fn mapped_read() -> Self {
        Self { reference_sequence_id: Some(0), alignment_start: Some(1), ..Self::new() }
    }

    /// Sets the read name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.as_bytes().to_vec());
        self
    }

    /// Sets the sequence, with every quality at [`DEFAULT_BASE_QUALITY`].
    #[must_use]
    pub fn sequence(mut self, seq: &str) -> Self {
        self.sequence = seq.as_bytes().to_vec();
        self.qualities = vec![DEFAULT_BASE_QUALITY; seq.len()];
        self
    }

    /// Sets the first segment (R1) flag. Implies paired; `false` marks the record as R2.
    #[must_use]
    pub fn first_segment(mut self, is_first: bool) -> Self {
        self.flags.set(Flags::SEGMENTED, true);
        self.flags.set(Flags::FIRST_SEGMENT, is_first);
        self.flags.set(Flags::LAST_SEGMENT, !is_first);
        self
    }

    /// Sets the unmapped flag.
    #[must_use]
    pub fn unmapped(mut self, unmapped: bool) -> Self {
        self.flags.set(Flags::UNMAPPED, unmapped);
        self
    }

    /// Sets the secondary alignment flag.
    #[must_use]
    pub fn secondary(mut self, secondary: bool) -> Self {
        self.flags.set(Flags::SECONDARY, secondary);
        self
    }

    /// Sets the reference sequence ID (0-based).
    #[must_use]
    pub fn reference_sequence_id(mut self, id: usize) -> Self {
        self.reference_sequence_id = Some(id);
        self
    }

    /// Sets the alignment start position (1-based).
    #[must_use]
    pub fn alignment_start(mut self, pos: usize) -> Self {
        self.alignment_start = Some(pos);
        self
    }

    /// Sets the CIGAR string.
    #[must_use]
    pub fn cigar(mut self, cigar: &str) -> Self {
        self.cigar = Some(cigar.to_string());
        self
    }

    /// Builds the `RecordBuf`.
    ///
    /// # Panics
    ///
    /// Panics on an invalid CIGAR string or a zero alignment start.
    #[must_use]
    pub fn build(self) -> RecordBuf {
        let mut record = RecordBuf::default();

        if let Some(name) = self.name {
            *record.name_mut() = Some(name.into());
        }
        *record.flags_mut() = self.flags;
        *record.reference_sequence_id_mut() = self.reference_sequence_id;
        if let Some(pos) = self.alignment_start {
            *record.alignment_start_mut() =
                Some(Position::try_from(pos).expect("alignment_start must be >= 1"));
        }
        *record.mapping_quality_mut() = MappingQuality::new(DEFAULT_MAPQ);

        // Unmapped reads carry no CIGAR; mapped reads without one get `{len}M`
        let cigar = match self.cigar {
            Some(cigar) => cigar,
            None if !self.sequence.is_empty() && !self.flags.is_unmapped() => {
                format!("{}M", self.sequence.len())
            }
            None => String::new(),
        };
        if !cigar.is_empty() {
            *record.cigar_mut() = parse_cigar(&cigar).into_iter().collect();
        }

        *record.sequence_mut() = Sequence::from(self.sequence);
        *record.quality_scores_mut() = QualityScores::from(self.qualities);

        record
    }
}

/// Parses a CIGAR string into a vector of operations.
///
/// # Panics
///
/// Panics if the CIGAR string contains invalid characters or formatting.
#[must_use]
pub fn parse_cigar(cigar_str: &str) -> Vec<Op> {
    let mut ops = Vec::new();
    let mut num_str = String::new();

    for c in cigar_str.chars() {
        if c.is_ascii_digit() {
            num_str.push(c);
        } else {
            let len: usize = num_str.parse().expect("Invalid CIGAR: expected number");
            let kind = match c {
                'M' => Kind::Match,
                'I' => Kind::Insertion,
                'D' => Kind::Deletion,
                'N' => Kind::Skip,
                'S' => Kind::SoftClip,
                'H' => Kind::HardClip,
                'P' => Kind::Pad,
                '=' => Kind::SequenceMatch,
                'X' => Kind::SequenceMismatch,
                _ => panic!("Unknown CIGAR operation: {c}"),
            };
            ops.push(Op::new(kind, len));
            num_str.clear();
        }
    }

    ops
}

/// Accumulates records under a header for writing to a test file.
#[derive(Debug, Default)]
pub struct AlignmentFileBuilder {
    header: Header,
    records: Vec<RecordBuf>,
}

impl AlignmentFileBuilder {
    /// Creates a builder whose header declares the given references, in order.
    ///
    /// # Panics
    ///
    /// Panics if any reference length is zero.
    #[must_use]
    pub fn with_references(references: &[(&str, usize)]) -> Self {
        let mut builder = Header::builder();
        for (name, length) in references {
            let length = NonZeroUsize::new(*length).expect("reference length must be > 0");
            builder = builder
                .add_reference_sequence(BString::from(*name), Map::<ReferenceSequence>::new(length));
        }
        Self { header: builder.build(), records: Vec::new() }
    }

    /// Creates a builder with the given header.
    #[must_use]
    pub fn with_header(header: Header) -> Self {
        Self { header, records: Vec::new() }
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[must_use]
    pub fn records(&self) -> &[RecordBuf] {
        &self.records
    }

    pub fn push_record(&mut self, record: RecordBuf) {
        self.records.push(record);
    }

    /// Adds a mapped pair sharing `name`, R1 then R2, both on `reference_id`.
    pub fn add_pair(&mut self, name: &str, reference_id: usize) {
        for is_first in [true, false] {
            self.push_record(
                RecordBuilder::new()
                    .name(name)
                    .sequence("ACGTACGT")
                    .first_segment(is_first)
                    .reference_sequence_id(reference_id)
                    .alignment_start(1)
                    .build(),
            );
        }
    }

    /// Adds an unpaired mapped read on `reference_id`.
    pub fn add_frag(&mut self, name: &str, reference_id: usize) {
        self.push_record(
            RecordBuilder::new()
                .name(name)
                .sequence("ACGTACGT")
                .reference_sequence_id(reference_id)
                .alignment_start(1)
                .build(),
        );
    }

    /// Adds an unmapped read.
    pub fn add_unmapped(&mut self, name: &str) {
        self.push_record(RecordBuilder::new().name(name).sequence("ACGTACGT").unmapped(true).build());
    }

    /// Writes the header and records as BAM.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_bam(&self, path: &Path) -> Result<()> {
        let mut writer = noodles::bam::io::Writer::new(File::create(path)?);
        writer.write_header(&self.header)?;
        for record in &self.records {
            writer.write_alignment_record(&self.header, record)?;
        }
        writer.finish(&self.header)?;
        Ok(())
    }

    /// Writes the header and records as text SAM.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_sam(&self, path: &Path) -> Result<()> {
        let mut writer = noodles::sam::io::Writer::new(File::create(path)?);
        writer.write_header(&self.header)?;
        for record in &self.records {
            writer.write_alignment_record(&self.header, record)?;
        }
        Ok(())
    }
}
