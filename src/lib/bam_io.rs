//! SAM/BAM file I/O utilities.
//!
//! Readers accept either BAM or text SAM, chosen by file extension. Writers always
//! produce BAM.
//!
//! # Threading Model
//!
//! BAM files use BGZF compression, which can be parallelized for both reading and writing:
//!
//! - **Single-threaded**: Use `threads=1` (lower overhead, good for small files)
//! - **Multi-threaded**: Use `threads>1` (higher throughput for large files)
//!
//! Text SAM input is always read on the calling thread.

use crate::reference::load_references;
use anyhow::{Context, Result};
use bstr::BString;
use log::{debug, info};
use noodles::bgzf::io::{
    MultithreadedReader, MultithreadedWriter, Reader as BgzfReader, Writer as BgzfWriter,
};
use noodles::sam::Header;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::ReferenceSequence;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::num::NonZeroUsize;
use std::path::Path;

/// Enum wrapping single-threaded and multi-threaded BGZF readers.
pub enum BgzfReaderEnum {
    /// Single-threaded BGZF reader (lower overhead for small files)
    SingleThreaded(BgzfReader<File>),
    /// Multi-threaded BGZF reader
    MultiThreaded(MultithreadedReader<File>),
}

impl Read for BgzfReaderEnum {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.read(buf),
            BgzfReaderEnum::MultiThreaded(r) => r.read(buf),
        }
    }
}

impl BufRead for BgzfReaderEnum {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.fill_buf(),
            BgzfReaderEnum::MultiThreaded(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.consume(amt),
            BgzfReaderEnum::MultiThreaded(r) => r.consume(amt),
        }
    }
}

/// Type alias for a BAM reader that supports both single and multi-threaded BGZF.
pub type BamReaderAuto = noodles::bam::io::Reader<BgzfReaderEnum>;

/// Enum wrapping single-threaded and multi-threaded BGZF writers
pub enum BgzfWriterEnum {
    /// Single-threaded BGZF writer
    SingleThreaded(BgzfWriter<File>),
    /// Multi-threaded BGZF writer
    MultiThreaded(MultithreadedWriter<File>),
}

impl Write for BgzfWriterEnum {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            BgzfWriterEnum::SingleThreaded(w) => w.write(buf),
            BgzfWriterEnum::MultiThreaded(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            BgzfWriterEnum::SingleThreaded(w) => w.flush(),
            BgzfWriterEnum::MultiThreaded(w) => w.flush(),
        }
    }
}

impl BgzfWriterEnum {
    /// Flush all pending blocks and write the BGZF EOF marker.
    ///
    /// # Errors
    /// Returns an error if flushing or finalizing the writer fails.
    pub fn finish(self) -> io::Result<()> {
        match self {
            BgzfWriterEnum::SingleThreaded(mut w) => w.try_finish(),
            BgzfWriterEnum::MultiThreaded(mut w) => {
                w.finish()?;
                Ok(())
            }
        }
    }
}

/// Type alias for a BAM writer that supports both single and multi-threaded BGZF
pub type BamWriter = noodles::bam::io::Writer<BgzfWriterEnum>;

/// Container format of an alignment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentFormat {
    Bam,
    Sam,
}

impl AlignmentFormat {
    /// Detects the format from the file extension: `.bam` (any case) is BAM, anything
    /// else is text SAM.
    ///
    /// # Example
    /// ```
    /// use bamverify_lib::bam_io::AlignmentFormat;
    ///
    /// assert_eq!(AlignmentFormat::from_path("reads.BAM"), AlignmentFormat::Bam);
    /// assert_eq!(AlignmentFormat::from_path("reads.sam"), AlignmentFormat::Sam);
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bam") => Self::Bam,
            _ => Self::Sam,
        }
    }
}

/// A record reader over either container format.
pub enum AlignmentReader {
    Bam(BamReaderAuto),
    Sam(SamReader),
}

/// A text SAM reader that tolerates reference names missing from the header.
///
/// BAM records carry reference IDs, so an unknown reference surfaces as an out-of-range
/// ID. SAM records carry names, which noodles refuses to resolve when the header lacks
/// them. Such names are resolved against a widened copy of the header and the resulting
/// IDs are cleared, so the record reaches the classifier as mapped with no reference.
pub struct SamReader {
    inner: noodles::sam::io::Reader<BufReader<File>>,
    record: noodles::sam::Record,
    widened: Option<Header>,
}

impl SamReader {
    fn new(inner: noodles::sam::io::Reader<BufReader<File>>) -> Self {
        Self { inner, record: noodles::sam::Record::default(), widened: None }
    }

    fn read_record_buf(&mut self, header: &Header, record: &mut RecordBuf) -> io::Result<usize> {
        let n = self.inner.read_record(&mut self.record)?;
        if n == 0 {
            return Ok(0);
        }

        let names =
            [self.record.reference_sequence_name(), self.record.mate_reference_sequence_name()];
        for name in names.into_iter().flatten() {
            if name == &b"="[..] || header.reference_sequences().contains_key(name) {
                continue;
            }
            let widened = self.widened.get_or_insert_with(|| header.clone());
            if !widened.reference_sequences().contains_key(name) {
                debug!("Record names reference '{name}' absent from the header");
                widened
                    .reference_sequences_mut()
                    .insert(BString::from(name), Map::<ReferenceSequence>::new(NonZeroUsize::MIN));
            }
        }

        let resolver = self.widened.as_ref().unwrap_or(header);
        *record = RecordBuf::try_from_alignment_record(resolver, &self.record)?;

        let known = header.reference_sequences().len();
        if record.reference_sequence_id().is_some_and(|id| id >= known) {
            *record.reference_sequence_id_mut() = None;
        }
        if record.mate_reference_sequence_id().is_some_and(|id| id >= known) {
            *record.mate_reference_sequence_id_mut() = None;
        }

        Ok(n)
    }
}

impl AlignmentReader {
    /// Open an alignment file of either format and read its header.
    ///
    /// When `reference` is given and the header declares no reference sequences, the
    /// reference dictionary is taken from the FASTA (or its `.fai` index) so that record
    /// reference names can be resolved. A header that already has `@SQ` lines is left
    /// unchanged.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, the header cannot be parsed, or the
    /// reference cannot be loaded.
    pub fn open<P: AsRef<Path>>(
        path: P,
        reference: Option<&Path>,
        threads: usize,
    ) -> Result<(Self, Header)> {
        let path_ref = path.as_ref();

        let (reader, mut header) = match AlignmentFormat::from_path(path_ref) {
            AlignmentFormat::Bam => {
                let (reader, header) = create_bam_reader(path_ref, threads)?;
                (AlignmentReader::Bam(reader), header)
            }
            AlignmentFormat::Sam => {
                let file = File::open(path_ref)
                    .with_context(|| format!("Failed to open input SAM: {}", path_ref.display()))?;
                let mut reader = noodles::sam::io::Reader::new(BufReader::new(file));
                let header = reader
                    .read_header()
                    .with_context(|| format!("Failed to read header from: {}", path_ref.display()))?;
                (AlignmentReader::Sam(SamReader::new(reader)), header)
            }
        };

        if let Some(reference) = reference {
            if header.reference_sequences().is_empty() {
                info!("Loading reference dictionary from {}", reference.display());
                add_reference_sequences(&mut header, reference)?;
            } else {
                debug!(
                    "Header already declares reference sequences; ignoring {}",
                    reference.display()
                );
            }
        }

        Ok((reader, header))
    }

    /// Reads the next record into `record`.
    ///
    /// Returns the number of bytes read; 0 means end of stream.
    ///
    /// # Errors
    /// Returns an error if the record is malformed or the underlying read fails.
    pub fn read_record(&mut self, header: &Header, record: &mut RecordBuf) -> io::Result<usize> {
        match self {
            AlignmentReader::Bam(reader) => reader.read_record_buf(header, record),
            AlignmentReader::Sam(reader) => reader.read_record_buf(header, record),
        }
    }

    /// The detected container format.
    #[must_use]
    pub fn format(&self) -> AlignmentFormat {
        match self {
            AlignmentReader::Bam(_) => AlignmentFormat::Bam,
            AlignmentReader::Sam(_) => AlignmentFormat::Sam,
        }
    }
}

/// Open a BAM reader and read its header.
///
/// # Errors
/// Returns an error if the file cannot be opened or the header cannot be read
pub fn create_bam_reader<P: AsRef<Path>>(
    path: P,
    threads: usize,
) -> Result<(BamReaderAuto, Header)> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open input BAM: {}", path_ref.display()))?;

    let bgzf_reader = match NonZeroUsize::new(threads).filter(|n| n.get() > 1) {
        Some(worker_count) => {
            BgzfReaderEnum::MultiThreaded(MultithreadedReader::with_worker_count(worker_count, file))
        }
        None => BgzfReaderEnum::SingleThreaded(BgzfReader::new(file)),
    };

    let mut reader = noodles::bam::io::Reader::from(bgzf_reader);
    let header = reader
        .read_header()
        .with_context(|| format!("Failed to read header from: {}", path_ref.display()))?;

    Ok((reader, header))
}

/// Appends an `@SQ` entry for every sequence in the reference FASTA.
fn add_reference_sequences(header: &mut Header, reference: &Path) -> Result<()> {
    for entry in load_references(reference)? {
        let length = NonZeroUsize::new(entry.length)
            .with_context(|| format!("Reference '{}' has zero length", entry.name))?;
        header
            .reference_sequences_mut()
            .insert(BString::from(entry.name), Map::<ReferenceSequence>::new(length));
    }
    Ok(())
}

/// Create a BAM writer and write the header in one operation
///
/// # Arguments
/// * `path` - Path for the output BAM file
/// * `header` - SAM header to write
/// * `threads` - Number of threads for BGZF compression (1 = single-threaded)
///
/// # Errors
/// Returns an error if the file cannot be created or the header cannot be written
///
/// # Example
/// ```no_run
/// use bamverify_lib::bam_io::create_bam_writer;
/// use noodles::sam::Header;
/// use std::path::Path;
///
/// let header = Header::default();
/// let mut writer = create_bam_writer(Path::new("output.bam"), &header, 1).unwrap();
/// ```
pub fn create_bam_writer<P: AsRef<Path>>(
    path: P,
    header: &Header,
    threads: usize,
) -> Result<BamWriter> {
    let path_ref = path.as_ref();
    let output_file = File::create(path_ref)
        .with_context(|| format!("Failed to create output BAM: {}", path_ref.display()))?;

    let bgzf_writer = match NonZeroUsize::new(threads).filter(|n| n.get() > 1) {
        Some(worker_count) => BgzfWriterEnum::MultiThreaded(MultithreadedWriter::with_worker_count(
            worker_count,
            output_file,
        )),
        None => BgzfWriterEnum::SingleThreaded(BgzfWriter::new(output_file)),
    };

    let mut writer = noodles::bam::io::Writer::from(bgzf_writer);
    writer
        .write_header(header)
        .with_context(|| format!("Failed to write header to: {}", path_ref.display()))?;
    Ok(writer)
}

/// Finish a BAM writer, flushing buffered blocks and writing the EOF marker.
///
/// # Errors
/// Returns an error if the final blocks cannot be written
pub fn finish_bam_writer(writer: BamWriter) -> Result<()> {
    writer.into_inner().finish().context("Failed to finish BAM output")
}

/// Read name of a record, or the empty slice when the record has none.
#[must_use]
pub fn record_name(record: &RecordBuf) -> &[u8] {
    record.name().map_or(&[][..], |n| <_ as AsRef<[u8]>>::as_ref(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sam::builder::RecordBuilder;
    use noodles::sam::alignment::io::Write as AlignmentWrite;
    use std::fs;
    use tempfile::TempDir;

    fn header_with_refs() -> Header {
        "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:1000\n".parse().unwrap()
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(AlignmentFormat::from_path("a.bam"), AlignmentFormat::Bam);
        assert_eq!(AlignmentFormat::from_path("a.Bam"), AlignmentFormat::Bam);
        assert_eq!(AlignmentFormat::from_path("a.sam"), AlignmentFormat::Sam);
        assert_eq!(AlignmentFormat::from_path("a"), AlignmentFormat::Sam);
        assert_eq!(AlignmentFormat::from_path("bam"), AlignmentFormat::Sam);
    }

    #[test]
    fn test_bam_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.bam");
        let header = header_with_refs();

        let mut writer = create_bam_writer(&path, &header, 1).unwrap();
        let record = RecordBuilder::new()
            .name("read1")
            .sequence("ACGT")
            .reference_sequence_id(0)
            .alignment_start(10)
            .cigar("4M")
            .build();
        writer.write_alignment_record(&header, &record).unwrap();
        finish_bam_writer(writer).unwrap();

        let (mut reader, read_header) = AlignmentReader::open(&path, None, 1).unwrap();
        assert_eq!(reader.format(), AlignmentFormat::Bam);
        assert_eq!(read_header.reference_sequences().len(), 1);

        let mut buf = RecordBuf::default();
        assert!(reader.read_record(&read_header, &mut buf).unwrap() > 0);
        assert_eq!(record_name(&buf), b"read1");
        assert_eq!(reader.read_record(&read_header, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_multithreaded_writer_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mt.bam");
        let header = header_with_refs();

        let mut writer = create_bam_writer(&path, &header, 2).unwrap();
        for i in 0..10 {
            let record = RecordBuilder::new().name(&format!("r{i}")).unmapped(true).build();
            writer.write_alignment_record(&header, &record).unwrap();
        }
        finish_bam_writer(writer).unwrap();

        let (mut reader, read_header) = AlignmentReader::open(&path, None, 2).unwrap();
        let mut buf = RecordBuf::default();
        let mut count = 0;
        while reader.read_record(&read_header, &mut buf).unwrap() > 0 {
            count += 1;
        }
        assert_eq!(count, 10);
    }

    #[test]
    fn test_sam_with_reference_fasta() {
        let dir = TempDir::new().unwrap();
        let sam = dir.path().join("in.sam");
        fs::write(&sam, "read1\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII\n").unwrap();
        let fasta = dir.path().join("ref.fa");
        fs::write(&fasta, ">chr1\nACGTACGTAC\n").unwrap();

        let (mut reader, header) = AlignmentReader::open(&sam, Some(fasta.as_path()), 1).unwrap();
        assert_eq!(reader.format(), AlignmentFormat::Sam);
        let (name, map) = header.reference_sequences().first().unwrap();
        assert_eq!(name.as_slice(), b"chr1");
        assert_eq!(map.length().get(), 10);

        let mut buf = RecordBuf::default();
        assert!(reader.read_record(&header, &mut buf).unwrap() > 0);
        assert_eq!(buf.reference_sequence_id(), Some(0));
    }

    #[test]
    fn test_sam_unknown_reference_reads_as_unplaced() {
        let dir = TempDir::new().unwrap();
        let sam = dir.path().join("in.sam");
        fs::write(
            &sam,
            "@SQ\tSN:chr1\tLN:100\n\
             r1\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII\n\
             r2\t1\tchrZ\t1\t60\t4M\tchr1\t5\t0\tACGT\tIIII\n\
             r3\t1\tchr1\t1\t60\t4M\tchrY\t5\t0\tACGT\tIIII\n\
             r4\t1\tchrZ\t3\t60\t4M\t=\t5\t0\tACGT\tIIII\n",
        )
        .unwrap();

        let (mut reader, header) = AlignmentReader::open(&sam, None, 1).unwrap();
        let mut buf = RecordBuf::default();
        let mut ids = Vec::new();
        while reader.read_record(&header, &mut buf).unwrap() > 0 {
            assert!(!buf.flags().is_unmapped());
            ids.push((buf.reference_sequence_id(), buf.mate_reference_sequence_id()));
        }
        assert_eq!(ids, vec![(Some(0), None), (None, Some(0)), (Some(0), None), (None, None)]);
        assert_eq!(header.reference_sequences().len(), 1);
    }

    #[test]
    fn test_reference_ignored_when_header_has_sequences() {
        let dir = TempDir::new().unwrap();
        let sam = dir.path().join("in.sam");
        fs::write(&sam, "@SQ\tSN:chr9\tLN:50\n").unwrap();
        let fasta = dir.path().join("ref.fa");
        fs::write(&fasta, ">chr1\nACGT\n").unwrap();

        let (_, header) = AlignmentReader::open(&sam, Some(fasta.as_path()), 1).unwrap();
        assert_eq!(header.reference_sequences().len(), 1);
        assert!(header.reference_sequences().contains_key(b"chr9".as_slice()));
    }

    #[test]
    fn test_open_missing_file() {
        let result = AlignmentReader::open("/nonexistent/in.bam", None, 1);
        assert!(result.is_err());
    }
}
