//! Utilities for writing test inputs and reading back outputs.

use bamverify_lib::sam::builder::{AlignmentFileBuilder, RecordBuilder};
use noodles::sam::Header;
use noodles::sam::alignment::record_buf::RecordBuf;
use std::path::Path;
use std::process::{Command, Output};

/// A mapped record on `reference_id` for mate slot `first` (R1/unpaired) or R2.
pub fn mapped_mate(name: &str, first: bool, reference_id: usize) -> RecordBuf {
    RecordBuilder::new()
        .name(name)
        .sequence("ACGTACGT")
        .first_segment(first)
        .reference_sequence_id(reference_id)
        .alignment_start(10)
        .build()
}

/// Writes a BAM with `chr1` (1000bp) and `chr2` (800bp) holding the given records.
pub fn write_two_reference_bam(path: &Path, records: Vec<RecordBuf>) {
    let mut builder = AlignmentFileBuilder::with_references(&[("chr1", 1000), ("chr2", 800)]);
    for record in records {
        builder.push_record(record);
    }
    builder.write_bam(path).expect("Failed to write test BAM");
}

/// Reads every record of a BAM.
pub fn read_bam(path: &Path) -> (Header, Vec<RecordBuf>) {
    let mut reader = noodles::bam::io::reader::Builder::default()
        .build_from_path(path)
        .expect("Failed to open output BAM");
    let header = reader.read_header().expect("Failed to read output header");
    let records = reader
        .record_bufs(&header)
        .collect::<std::io::Result<Vec<_>>>()
        .expect("Failed to read output records");
    (header, records)
}

/// Runs the binary with `args`.
pub fn run_bamverify(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bamverify"))
        .args(args)
        .output()
        .expect("Failed to run bamverify")
}

/// File names present in `dir`, sorted.
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to list directory")
        .map(|entry| entry.expect("Bad directory entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
