//! End-to-end runs of the bamverify binary.

use crate::helpers::{
    assert_report, list_dir, mapped_mate, read_bam, run_bamverify, write_two_reference_bam,
};
use bamverify_lib::sam::builder::RecordBuilder;
use fgoxide::io::DelimFile;
use noodles::sam::alignment::record_buf::RecordBuf;
use std::path::Path;
use tempfile::TempDir;

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Pairs, a duplicated R1, an unmapped read and a read on an unknown reference.
fn mixed_records() -> Vec<RecordBuf> {
    vec![
        mapped_mate("readB", true, 1),
        mapped_mate("readA", true, 0),
        mapped_mate("readB", true, 0),
        mapped_mate("readA", false, 0),
        RecordBuilder::new().name("readC").sequence("ACGT").unmapped(true).build(),
        mapped_mate("readB", false, 1),
        // Mapped, but with no reference ID
        RecordBuilder::new().name("readD").sequence("ACGT").build(),
    ]
}

#[test]
fn test_empty_input_reports_zeros() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    let output = dir.path().join("out.bam");
    write_two_reference_bam(&input, Vec::new());

    let result = run_bamverify(&[path_str(&input), path_str(&output)]);
    assert_report(&result, [0, 0, 0, 0, 0]);

    let (_, records) = read_bam(&output);
    assert!(records.is_empty());
}

#[test]
fn test_counts_and_filtered_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    let output = dir.path().join("out.bam");

    write_two_reference_bam(&input, mixed_records());

    let result = run_bamverify(&[path_str(&input), path_str(&output)]);
    assert_report(&result, [6, 7, 4, 1, 4]);

    let stderr = String::from_utf8_lossy(&result.stderr);
    assert_eq!(stderr.matches("has no valid reference sequence").count(), 1);

    let (header, records) = read_bam(&output);
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| !r.flags().is_unmapped()));
    assert!(records.iter().all(|r| r.reference_sequence_id().is_some()));

    // Renamed references carry the length of their new names
    let names: Vec<(String, usize)> = header
        .reference_sequences()
        .iter()
        .map(|(name, map)| (name.to_string(), map.length().get()))
        .collect();
    assert_eq!(names, vec![("1".to_string(), 1), ("2".to_string(), 1)]);
    assert!(header.programs().as_ref().keys().any(|id| *id == "bamverify"));
}

#[test]
fn test_preserve_reference_lengths() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    let output = dir.path().join("out.bam");
    write_two_reference_bam(&input, vec![mapped_mate("r1", true, 0)]);

    let result = run_bamverify(&[
        path_str(&input),
        path_str(&output),
        "--preserve-reference-lengths",
    ]);
    assert_report(&result, [1, 1, 1, 0, 1]);

    let (header, _) = read_bam(&output);
    let lengths: Vec<usize> =
        header.reference_sequences().values().map(|map| map.length().get()).collect();
    assert_eq!(lengths, vec![1000, 800]);
}

#[test]
fn test_sam_input_with_reference_fasta() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.sam");
    let output = dir.path().join("out.bam");
    let fasta = dir.path().join("ref.fa");

    std::fs::write(&fasta, ">chr1 first\nACGTACGTAC\nGT\n>chr2\nACGT\n").unwrap();
    std::fs::write(
        &input,
        "@HD\tVN:1.6\tSO:unsorted\n\
         r1\t67\tchr1\t1\t60\t4M\t=\t5\t8\tACGT\tIIII\n\
         r2\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\tIIII\n\
         r1\t131\tchr1\t5\t60\t4M\t=\t1\t-8\tACGT\tIIII\n\
         r3\t0\tchr2\t1\t60\t4M\t*\t0\t0\tACGT\tIIII\n\
         r3\t256\tchr1\t2\t60\t4M\t*\t0\t0\tACGT\tIIII\n",
    )
    .unwrap();

    let result = run_bamverify(&[path_str(&input), path_str(&output), path_str(&fasta)]);
    assert_report(&result, [4, 5, 3, 1, 3]);

    let (header, records) = read_bam(&output);
    assert_eq!(records.len(), 4);
    let names: Vec<String> = header.reference_sequences().keys().map(|n| n.to_string()).collect();
    assert_eq!(names, vec!["1", "2"]);
}

#[test]
fn test_sam_input_without_dictionary_drops_mapped_reads() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.sam");
    let output = dir.path().join("out.bam");
    std::fs::write(
        &input,
        "@HD\tVN:1.6\n\
         r1\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII\n\
         r2\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\tIIII\n\
         r3\t0\tchr2\t1\t60\t4M\t*\t0\t0\tACGT\tIIII\n",
    )
    .unwrap();

    // Without a REFERENCE, mapped reads name references the header never declares
    let result = run_bamverify(&[path_str(&input), path_str(&output)]);
    assert_report(&result, [2, 3, 0, 0, 0]);

    let stderr = String::from_utf8_lossy(&result.stderr);
    assert_eq!(stderr.matches("has no valid reference sequence").count(), 1);
    let (_, records) = read_bam(&output);
    assert!(records.is_empty());
}

#[test]
fn test_secondary_alignments_count_as_multiply_mapped() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    let output = dir.path().join("out.bam");
    write_two_reference_bam(&input, vec![
        mapped_mate("readS", true, 0),
        RecordBuilder::new()
            .name("readS")
            .sequence("ACGTACGT")
            .first_segment(true)
            .secondary(true)
            .reference_sequence_id(1)
            .alignment_start(20)
            .build(),
        mapped_mate("readS", false, 0),
    ]);

    let result = run_bamverify(&[path_str(&input), path_str(&output)]);
    assert_report(&result, [3, 3, 2, 1, 2]);
}

#[test]
fn test_verbose_logs_header_and_duplicates() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    let output = dir.path().join("out.bam");
    write_two_reference_bam(&input, mixed_records());

    let result = run_bamverify(&[path_str(&input), path_str(&output), "-v", "-v"]);
    assert_report(&result, [6, 7, 4, 1, 4]);

    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("'chr1' becomes '1'"));
    assert!(stderr.contains("New header"));
    assert!(stderr.contains("Duplicate observation of 'readB'"));
}

#[test]
fn test_single_verbose_flag_skips_duplicate_trace() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    let output = dir.path().join("out.bam");
    write_two_reference_bam(&input, mixed_records());

    let result = run_bamverify(&[path_str(&input), path_str(&output), "-v"]);
    assert_report(&result, [6, 7, 4, 1, 4]);

    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("'chr2' becomes '2'"));
    assert!(!stderr.contains("Duplicate observation"));
}

#[test]
fn test_intermediate_files_are_removed() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    let output = dir.path().join("out.bam");
    let records: Vec<RecordBuf> = (0..200)
        .flat_map(|i| {
            let name = format!("q{i}");
            [mapped_mate(&name, true, 0), mapped_mate(&name, false, 1)]
        })
        .collect();
    write_two_reference_bam(&input, records);

    // A tiny memory budget forces the sort to spill chunks to disk
    let result = run_bamverify(&[path_str(&input), path_str(&output), "--max-memory", "1K"]);
    assert_report(&result, [400, 400, 400, 0, 400]);
    assert_eq!(list_dir(dir.path()), vec!["in.bam", "out.bam"]);
}

#[test]
fn test_spill_files_go_to_tmp_dir() {
    let dir = TempDir::new().unwrap();
    let spill = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    let output = dir.path().join("out.bam");
    write_two_reference_bam(&input, mixed_records());

    let result = run_bamverify(&[
        path_str(&input),
        path_str(&output),
        "--tmp-dir",
        path_str(spill.path()),
        "--max-memory",
        "1K",
        "--threads",
        "2",
    ]);
    assert_report(&result, [6, 7, 4, 1, 4]);
    assert!(list_dir(spill.path()).is_empty());
    assert_eq!(list_dir(dir.path()), vec!["in.bam", "out.bam"]);
}

#[test]
fn test_metrics_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    let output = dir.path().join("out.bam");
    let metrics = dir.path().join("counts.tsv");
    write_two_reference_bam(&input, mixed_records());

    let result =
        run_bamverify(&[path_str(&input), path_str(&output), "--metrics", path_str(&metrics)]);
    assert_report(&result, [6, 7, 4, 1, 4]);

    let rows: Vec<bamverify_lib::ReadCounts> = DelimFile::default().read_tsv(&metrics).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].total_reads, 7);
    assert_eq!(rows[0].mapped_reads, 6);
    assert_eq!(rows[0].invalid_reference_reads, 1);
    assert_eq!(rows[0].unique_multi_mapped_reads, 1);
}
