//! The end-to-end normalize, filter and count run.
//!
//! A run moves through [`PipelineStage`]s strictly in order:
//!
//! 1. **Header rewrite**: `chr` prefixes are stripped from reference names
//! 2. **Classification**: mapped records on known references are written to the output
//! 3. **Sort**: the output is copied, sorted by read name, to a temp file beside it
//! 4. **Grouping**: the sorted copy is scanned for unique and multiply-mapped reads
//! 5. **Report**: counts are written once every earlier stage has succeeded
//!
//! Each stage consumes the complete output of the previous one.

use crate::bam_io::{AlignmentReader, create_bam_reader, create_bam_writer, finish_bam_writer};
use crate::classify::StreamClassifier;
use crate::grouper::DuplicateGrouper;
use crate::header::{AlignmentHeader, LengthPolicy, NormalizedHeader, add_pg_record, normalize};
use crate::logging::{OperationTimer, log_read_counts};
use crate::metrics::{ReadCounts, write_metrics_auto};
use crate::progress::ProgressLogger;
use crate::report::write_report;
use crate::sort::ExternalSorter;
use crate::sort::external::DEFAULT_MEMORY_LIMIT;
use crate::validation::{validate_distinct_paths, validate_file_exists, validate_memory_limit};
use crate::verbosity::Verbosity;
use anyhow::{Context, Result, bail};
use log::{info, warn};
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record_buf::RecordBuf;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Suffix of the temporary name-sorted copy of the output.
pub const SORTED_SUFFIX: &str = ".byname.bam";

/// Stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Init,
    HeaderRewritten,
    Classifying,
    Sorted,
    Grouping,
    Reported,
    Done,
}

impl PipelineStage {
    /// The stage that follows this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::HeaderRewritten),
            Self::HeaderRewritten => Some(Self::Classifying),
            Self::Classifying => Some(Self::Sorted),
            Self::Sorted => Some(Self::Grouping),
            Self::Grouping => Some(Self::Reported),
            Self::Reported => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Moves to `to`, which must be the immediately following stage.
    ///
    /// # Errors
    /// Returns an error for a backward, repeated or skipped transition.
    pub fn advance(&mut self, to: PipelineStage) -> Result<()> {
        if self.next() != Some(to) {
            bail!("Invalid pipeline transition from {:?} to {:?}", self, to);
        }
        *self = to;
        Ok(())
    }
}

/// Everything a run needs, passed explicitly.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Input SAM or BAM.
    pub input: PathBuf,
    /// Output BAM of mapped records.
    pub output: PathBuf,
    /// Reference FASTA supplying the dictionary for SAM input without `@SQ` lines.
    pub reference: Option<PathBuf>,
    pub verbosity: Verbosity,
    /// Memory budget for the name sort, in bytes.
    pub max_memory: usize,
    /// Parent directory for sort spill files; defaults to the output's directory.
    pub tmp_dir: Option<PathBuf>,
    pub threads: usize,
    pub length_policy: LengthPolicy,
    /// Optional TSV of the final counts.
    pub metrics: Option<PathBuf>,
    /// Version recorded in the output `@PG` record.
    pub program_version: String,
    /// Command line recorded in the output `@PG` record.
    pub command_line: String,
}

impl VerifyOptions {
    /// Options with defaults for everything but the input and output paths.
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            reference: None,
            verbosity: Verbosity::quiet(),
            max_memory: DEFAULT_MEMORY_LIMIT,
            tmp_dir: None,
            threads: 1,
            length_policy: LengthPolicy::default(),
            metrics: None,
            program_version: env!("CARGO_PKG_VERSION").to_string(),
            command_line: String::new(),
        }
    }

    /// Checks paths and parameters before any file is opened.
    ///
    /// # Errors
    /// Returns an error if input and output name the same file, the input or reference
    /// does not exist, or the memory budget is zero.
    pub fn validate(&self) -> Result<()> {
        validate_distinct_paths(&self.input, &self.output)?;
        validate_file_exists(&self.input, "Input")?;
        if let Some(reference) = &self.reference {
            validate_file_exists(reference, "Reference FASTA")?;
        }
        validate_memory_limit(self.max_memory, "max-memory")?;
        Ok(())
    }

    /// Directory the output file lives in.
    fn output_dir(&self) -> &Path {
        self.output.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."))
    }
}

/// Runs the stages for one set of options.
#[derive(Debug)]
pub struct VerifyPipeline<'a> {
    options: &'a VerifyOptions,
    stage: PipelineStage,
}

impl<'a> VerifyPipeline<'a> {
    #[must_use]
    pub fn new(options: &'a VerifyOptions) -> Self {
        Self { options, stage: PipelineStage::Init }
    }

    #[must_use]
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Runs every stage and writes the report to `out`.
    ///
    /// Nothing is written to `out` unless every stage succeeds. The sorted temporary
    /// copy of the output is removed whether or not the run succeeds.
    ///
    /// # Errors
    /// Returns an error if validation fails, any file cannot be opened, read or written,
    /// or the sorted stream is not grouped by read name.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<ReadCounts> {
        let options = self.options;
        options.validate()?;

        let (mut reader, input_header) = AlignmentReader::open(
            &options.input,
            options.reference.as_deref(),
            options.threads,
        )
        .with_context(|| format!("Failed to open input: {}", options.input.display()))?;

        let normalized = normalize(
            &AlignmentHeader::from_sam_header(&input_header)?,
            options.length_policy,
        )?;
        self.log_header_changes(&normalized);
        let output_header = add_pg_record(
            normalized.header.to_sam_header()?,
            &options.program_version,
            &options.command_line,
        )?;
        self.stage.advance(PipelineStage::HeaderRewritten)?;

        self.stage.advance(PipelineStage::Classifying)?;
        let timer = OperationTimer::new("Classifying records");
        let mut writer = create_bam_writer(&options.output, &output_header, options.threads)
            .with_context(|| format!("Failed to open output: {}", options.output.display()))?;
        let mut classifier = StreamClassifier::new(input_header.reference_sequences().len());
        let mut progress = ProgressLogger::new("Classified");
        let mut record = RecordBuf::default();
        let mut kept = 0u64;

        while reader.read_record(&input_header, &mut record).with_context(|| {
            format!("Failed to read record from: {}", options.input.display())
        })? != 0
        {
            progress.record();
            if classifier.classify(&record).is_kept() {
                writer.write_alignment_record(&output_header, &record)?;
                kept += 1;
            }
        }
        finish_bam_writer(writer)?;
        drop(reader);
        progress.finish();
        timer.log_completion(progress.count());
        info!("Wrote {} mapped records to {}", kept, options.output.display());
        let classified = classifier.into_counts();

        let sorted = self.sort_output()?;
        self.stage.advance(PipelineStage::Sorted)?;

        self.stage.advance(PipelineStage::Grouping)?;
        let grouped = self.group(sorted.path())?;
        sorted.close().context("Failed to remove sorted intermediate file")?;

        let counts = ReadCounts::from_passes(&classified, &grouped);
        if let Some(metrics) = &options.metrics {
            write_metrics_auto(metrics, &[counts])?;
        }
        write_report(out, &counts).context("Failed to write report")?;
        self.stage.advance(PipelineStage::Reported)?;

        log_read_counts(&counts);
        self.stage.advance(PipelineStage::Done)?;
        Ok(counts)
    }

    fn log_header_changes(&self, normalized: &NormalizedHeader) {
        for rename in &normalized.withheld {
            warn!(
                "Keeping reference '{}': '{}' already names another reference",
                rename.from, rename.to
            );
        }
        if !self.options.verbosity.header() {
            return;
        }
        for rename in &normalized.renames {
            info!("Removing 'chr' prefix: '{}' becomes '{}'", rename.from, rename.to);
        }
        match normalized.header.text() {
            Some(text) => info!("New header ({} bytes):\n{}", normalized.header.text_len(), text),
            None => info!("New header is empty"),
        }
    }

    /// Sorts the output by read name into a temporary file next to it.
    fn sort_output(&self) -> Result<NamedTempFile> {
        let options = self.options;
        let output_dir = options.output_dir();
        let file_name = options
            .output
            .file_name()
            .map_or_else(|| "output".to_string(), |n| n.to_string_lossy().into_owned());

        let sorted = tempfile::Builder::new()
            .prefix(&format!(".{file_name}."))
            .suffix(SORTED_SUFFIX)
            .tempfile_in(output_dir)
            .with_context(|| {
                format!("Failed to create sorted intermediate file in {}", output_dir.display())
            })?;

        let timer = OperationTimer::new("Sorting by read name");
        let spill_dir = options.tmp_dir.clone().unwrap_or_else(|| output_dir.to_path_buf());
        let stats = ExternalSorter::new()
            .memory_limit(options.max_memory)
            .threads(options.threads)
            .temp_dir(spill_dir)
            .sort(&options.output, sorted.path())?;
        timer.log_completion(stats.total_records);
        if stats.chunks_written > 0 {
            info!("Sort spilled {} chunks to disk", stats.chunks_written);
        }

        Ok(sorted)
    }

    fn group(&self, sorted: &Path) -> Result<ReadCounts> {
        let (mut reader, header) = create_bam_reader(sorted, self.options.threads)
            .context("Failed to re-open sorted intermediate file")?;

        let timer = OperationTimer::new("Counting duplicates");
        let mut grouper =
            DuplicateGrouper::new().trace_duplicates(self.options.verbosity.duplicates());
        let mut progress = ProgressLogger::new("Grouped");
        let mut record = RecordBuf::default();

        while reader
            .read_record_buf(&header, &mut record)
            .context("Failed to read sorted intermediate file")?
            != 0
        {
            progress.record();
            grouper.observe(&record)?;
        }
        progress.finish();
        timer.log_completion(progress.count());

        Ok(grouper.into_counts())
    }
}
