//! Normalize, filter and count the reads of a SAM/BAM file.
//!
//! Reference names lose their `chr` prefix, unmapped reads and reads on unknown
//! references are dropped, and the surviving reads are written to a BAM. A name-sorted
//! copy of that BAM is then scanned to count unique and multiply-mapped reads.

use anyhow::Result;
use bamverify_lib::header::LengthPolicy;
use bamverify_lib::pipeline::{VerifyOptions, VerifyPipeline};
use bamverify_lib::verbosity::Verbosity;
use clap::{ArgAction, Parser};
use log::info;
use std::path::PathBuf;

use crate::commands::command::Command;
use crate::version::VERSION;

/// Normalize a SAM/BAM file and count unique and multiply-mapped reads.
#[derive(Debug, Parser)]
#[command(
    name = "bamverify",
    version = VERSION.as_str(),
    about = "\x1b[36mNormalize reference names, drop unmapped reads, and count unique reads\x1b[0m",
    long_about = r#"
Normalize a SAM/BAM file and count its reads.

The header's reference names are rewritten without their "chr" prefix. Only reads
mapped to a known reference are written to OUTPUT (always BAM). The output is then
sorted by read name into a temporary file next to it, and each read name is scanned
for unique and multiply-mapped reads per mate. Counts are printed on stdout:

  Mapped reads: <n>
  Total reads: <n>
  Unique mapped reads: <n>
  Unique multiply-mapped reads: <n>
  Unique total reads: <n>

INPUT is read as BAM when its name ends in ".bam" (any case) and as text SAM otherwise.
A SAM file without @SQ lines needs REFERENCE to resolve its reference names.

By default a renamed reference's length is set to the length of its new name. Use
--preserve-reference-lengths to keep the declared lengths instead.

VERBOSITY:

  -v    log reference renames and the rewritten header
  -vv   also log every duplicate mate observation

EXAMPLES:

  bamverify aligned.bam filtered.bam
  bamverify aligned.sam filtered.bam ref.fa -v
  bamverify aligned.bam filtered.bam --max-memory 2G --threads 4 --metrics counts.tsv
"#
)]
pub struct Verify {
    /// Input SAM or BAM file.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output BAM file.
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Reference FASTA for SAM input lacking @SQ lines.
    #[arg(value_name = "REFERENCE")]
    pub reference: Option<PathBuf>,

    /// Increase diagnostic verbosity; may be repeated.
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Maximum memory for the in-memory part of the name sort.
    ///
    /// Accepts values like "512M" or "2G". Beyond this, sorted chunks spill to disk.
    #[arg(short = 'm', long = "max-memory", default_value = "512M", value_parser = parse_memory)]
    pub max_memory: usize,

    /// Directory for sort spill files. Defaults to the output's directory.
    #[arg(short = 'T', long = "tmp-dir")]
    pub tmp_dir: Option<PathBuf>,

    /// Threads for BGZF compression and chunk sorting.
    #[arg(short = '@', short_alias = 't', long = "threads", default_value = "1")]
    pub threads: usize,

    /// Keep declared reference lengths when stripping the "chr" prefix.
    #[arg(long = "preserve-reference-lengths")]
    pub preserve_reference_lengths: bool,

    /// Optional TSV file for the final counts.
    #[arg(long = "metrics")]
    pub metrics: Option<PathBuf>,
}

/// Parse memory size string (e.g., "512M", "2G") to bytes.
fn parse_memory(s: &str) -> Result<usize, String> {
    let s = s.trim().to_uppercase();
    if s.is_empty() {
        return Err("Empty memory specification".to_string());
    }

    let (digits, multiplier) = match s.as_bytes()[s.len() - 1] {
        b'G' => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        b'M' => (&s[..s.len() - 1], 1024 * 1024),
        b'K' => (&s[..s.len() - 1], 1024),
        _ => (s.as_str(), 1),
    };

    let value: f64 = digits.parse().map_err(|_| format!("Invalid number: {digits}"))?;
    if value <= 0.0 {
        return Err("Memory size must be positive".to_string());
    }

    Ok((value * multiplier as f64) as usize)
}

impl Verify {
    fn options(&self, command_line: &str) -> VerifyOptions {
        let mut options = VerifyOptions::new(&self.input, &self.output);
        options.reference.clone_from(&self.reference);
        options.verbosity = Verbosity::from_flag_count(self.verbose);
        options.max_memory = self.max_memory;
        options.tmp_dir.clone_from(&self.tmp_dir);
        options.threads = self.threads.max(1);
        options.length_policy = if self.preserve_reference_lengths {
            LengthPolicy::Preserve
        } else {
            LengthPolicy::NameLength
        };
        options.metrics.clone_from(&self.metrics);
        options.program_version = VERSION.clone();
        options.command_line = command_line.to_string();
        options
    }
}

impl Command for Verify {
    fn execute(&self, command_line: &str) -> Result<()> {
        info!("Input: {}", self.input.display());
        info!("Output: {}", self.output.display());
        if let Some(reference) = &self.reference {
            info!("Reference: {}", reference.display());
        }

        let options = self.options(command_line);
        let mut stdout = std::io::stdout().lock();
        VerifyPipeline::new(&options).run(&mut stdout)?;
        Ok(())
    }
}
