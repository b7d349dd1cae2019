//! External merge-sort of BAM files by read name.
//!
//! Handles BAM files larger than available RAM by spilling sorted chunks to
//! temporary files.
//!
//! # Algorithm
//!
//! 1. **Accumulate phase**: Read records into memory until the memory budget is reached
//! 2. **Sort phase**: Sort the chunk, in parallel with rayon when more than one thread
//! 3. **Spill phase**: Write the sorted chunk to a temporary BAM
//! 4. **Merge phase**: K-way merge of the chunks using a binary heap
//!
//! Inputs that fit within the budget skip the spill and merge phases.

use crate::bam_io::{BamWriter, create_bam_reader, create_bam_writer, finish_bam_writer};
use crate::sort::keys::{IdentifierKey, SortKey};
use anyhow::{Context, Result};
use bstr::BString;
use log::{debug, info};
use noodles::bam;
use noodles::sam::Header;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::header::tag as header_tag;
use rayon::prelude::*;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Default memory budget (512 MB).
pub const DEFAULT_MEMORY_LIMIT: usize = 512 * 1024 * 1024;

/// Buffer size for reading temp files during merge.
const MERGE_BUFFER_SIZE: usize = 64 * 1024;

/// Sort order written to the `@HD` record of sorted output.
const QUERYNAME: &str = "queryname";

/// External sorter for BAM files, ordering records by read name.
pub struct ExternalSorter {
    /// Maximum memory to use for in-memory sorting.
    memory_limit: usize,
    /// Parent directory for spill files.
    temp_dir: Option<PathBuf>,
    /// Number of threads for parallel operations.
    threads: usize,
}

impl Default for ExternalSorter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternalSorter {
    #[must_use]
    pub fn new() -> Self {
        Self { memory_limit: DEFAULT_MEMORY_LIMIT, temp_dir: None, threads: 1 }
    }

    /// Set the memory budget for in-memory sorting.
    #[must_use]
    pub fn memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = limit;
        self
    }

    /// Set the parent directory for spill files.
    #[must_use]
    pub fn temp_dir(mut self, path: PathBuf) -> Self {
        self.temp_dir = Some(path);
        self
    }

    /// Set the number of threads.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Sort a BAM file by read name.
    ///
    /// Every input record appears exactly once in the output, and records sharing a
    /// name are contiguous.
    ///
    /// # Errors
    /// Returns an error if the input cannot be read, a spill file cannot be written, or
    /// the output cannot be written.
    pub fn sort(&self, input: &Path, output: &Path) -> Result<SortStats> {
        debug!("Memory limit: {} MB", self.memory_limit / (1024 * 1024));
        debug!("Threads: {}", self.threads);

        let (mut reader, header) = create_bam_reader(input, self.threads)?;
        let temp_dir = self.create_temp_dir()?;
        let temp_path = temp_dir.path();

        let mut stats = SortStats::default();
        let mut chunk_files: Vec<PathBuf> = Vec::new();
        let mut records: Vec<(IdentifierKey, RecordBuf)> = Vec::new();
        let mut memory_used = 0usize;

        for result in reader.record_bufs(&header) {
            let record = result.context("Failed to read BAM record")?;
            stats.total_records += 1;

            memory_used += estimate_record_size(&record);
            records.push((IdentifierKey::from_record(&record), record));

            if memory_used >= self.memory_limit {
                let chunk_path = temp_path.join(format!("chunk_{:04}.bam", chunk_files.len()));
                self.sort_and_write(&mut records, &header, &chunk_path)?;
                stats.chunks_written += 1;
                chunk_files.push(chunk_path);
                records.clear();
                memory_used = 0;
            }
        }

        let output_header = create_output_header(&header);

        if chunk_files.is_empty() {
            debug!("All {} records fit in memory", stats.total_records);
            self.sort_and_write(&mut records, &output_header, output)?;
        } else {
            if !records.is_empty() {
                let chunk_path = temp_path.join(format!("chunk_{:04}.bam", chunk_files.len()));
                self.sort_and_write(&mut records, &header, &chunk_path)?;
                stats.chunks_written += 1;
                chunk_files.push(chunk_path);
            }

            info!("Merging {} sorted chunks", chunk_files.len());
            self.merge_chunks::<IdentifierKey>(&chunk_files, &output_header, output)?;
        }

        Ok(stats)
    }

    /// Sort records and write them, in order, to `path`.
    fn sort_and_write<K: SortKey>(
        &self,
        records: &mut [(K, RecordBuf)],
        header: &Header,
        path: &Path,
    ) -> Result<()> {
        if self.threads > 1 {
            records.par_sort_unstable_by(|(k1, _), (k2, _)| k1.cmp(k2));
        } else {
            records.sort_unstable_by(|(k1, _), (k2, _)| k1.cmp(k2));
        }

        let mut writer = create_bam_writer(path, header, 1)?;
        for (_, record) in records.iter() {
            writer.write_alignment_record(header, record)?;
        }
        finish_bam_writer(writer)
    }

    /// K-way merge of sorted chunk files.
    fn merge_chunks<K: SortKey>(
        &self,
        chunk_files: &[PathBuf],
        output_header: &Header,
        output: &Path,
    ) -> Result<()> {
        let mut chunk_readers: Vec<ChunkReader> = chunk_files
            .iter()
            .enumerate()
            .map(|(idx, path)| ChunkReader::new(path, idx))
            .collect::<Result<Vec<_>>>()?;

        let mut heap: BinaryHeap<Reverse<HeapEntry<K>>> =
            BinaryHeap::with_capacity(chunk_files.len());

        for reader in &mut chunk_readers {
            if let Some(entry) = reader.next()? {
                heap.push(Reverse(entry));
            }
        }

        let mut writer: BamWriter = create_bam_writer(output, output_header, 1)?;

        while let Some(Reverse(entry)) = heap.pop() {
            writer.write_alignment_record(output_header, &entry.record)?;

            let reader = &mut chunk_readers[entry.chunk_idx];
            if let Some(next) = reader.next()? {
                heap.push(Reverse(next));
            }
        }

        finish_bam_writer(writer)
    }

    /// Create temporary directory for spill files.
    fn create_temp_dir(&self) -> Result<TempDir> {
        match &self.temp_dir {
            Some(base) => {
                std::fs::create_dir_all(base).with_context(|| {
                    format!("Failed to create temp directory: {}", base.display())
                })?;
                TempDir::new_in(base).context("Failed to create temp directory")
            }
            None => TempDir::new().context("Failed to create temp directory"),
        }
    }
}

/// Copy of `header` whose `@HD` record declares `SO:queryname`.
///
/// An existing `@HD` record keeps its version and other fields.
#[must_use]
pub fn create_output_header(header: &Header) -> Header {
    let mut hd = header
        .header()
        .cloned()
        .unwrap_or_else(Map::<noodles::sam::header::record::value::map::Header>::default);
    hd.other_fields_mut().insert(header_tag::SORT_ORDER, BString::from(QUERYNAME));

    let mut output = header.clone();
    *output.header_mut() = Some(hd);
    output
}

/// Estimate memory usage of a BAM record plus its sort key.
fn estimate_record_size(record: &RecordBuf) -> usize {
    let name_len = record.name().map_or(0, |n| n.len());
    let record_size = std::mem::size_of::<RecordBuf>()
        + name_len
        + record.sequence().len()
        + record.quality_scores().as_ref().len()
        + record.cigar().as_ref().len() * 4
        + 256; // Estimated tag overhead

    record_size + std::mem::size_of::<IdentifierKey>() + name_len
}

/// Reader for a sorted chunk file.
struct ChunkReader {
    reader: bam::io::Reader<noodles::bgzf::io::Reader<BufReader<File>>>,
    header: Header,
    idx: usize,
}

impl ChunkReader {
    fn new(path: &Path, idx: usize) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open chunk file: {}", path.display()))?;
        let buf_reader = BufReader::with_capacity(MERGE_BUFFER_SIZE, file);
        let mut reader = bam::io::Reader::new(buf_reader);
        let header = reader.read_header()?;

        Ok(Self { reader, header, idx })
    }

    fn next<K: SortKey>(&mut self) -> Result<Option<HeapEntry<K>>> {
        let mut record = RecordBuf::default();
        match self.reader.read_record_buf(&self.header, &mut record) {
            Ok(0) => Ok(None),
            Ok(_) => {
                let key = K::from_record(&record);
                Ok(Some(HeapEntry { key, record, chunk_idx: self.idx }))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Entry in the merge heap.
struct HeapEntry<K> {
    key: K,
    record: RecordBuf,
    chunk_idx: usize,
}

impl<K: Ord> PartialEq for HeapEntry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.chunk_idx == other.chunk_idx
    }
}

impl<K: Ord> Eq for HeapEntry<K> {}

impl<K: Ord> PartialOrd for HeapEntry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord> Ord for HeapEntry<K> {
    // Ties go to the earlier chunk so the merge is deterministic
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key).then_with(|| self.chunk_idx.cmp(&other.chunk_idx))
    }
}

/// Statistics from a sort operation.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortStats {
    /// Total records read from input.
    pub total_records: u64,
    /// Number of temporary chunk files written.
    pub chunks_written: usize,
}
