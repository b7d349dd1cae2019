//! Error path integration tests.
//!
//! Every fatal condition exits with status 1, prints a diagnostic on stderr and
//! never prints the report.

use crate::helpers::{
    assert_failed, list_dir, mapped_mate, run_bamverify, write_two_reference_bam,
};
use tempfile::TempDir;

#[test]
fn test_no_arguments() {
    let output = run_bamverify(&[]);
    assert_failed(&output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn test_missing_output_argument() {
    assert_failed(&run_bamverify(&["in.bam"]));
}

#[test]
fn test_help_exits_zero() {
    let output = run_bamverify(&["--help"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Unique multiply-mapped reads"));
}

#[test]
fn test_same_input_and_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    write_two_reference_bam(&input, vec![mapped_mate("r1", true, 0)]);
    let before = std::fs::read(&input).unwrap();

    let path = input.to_str().unwrap();
    let output = run_bamverify(&[path, path]);
    assert_failed(&output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("Can't read and write the same file"));
    assert_eq!(std::fs::read(&input).unwrap(), before);
}

#[test]
fn test_missing_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("missing.bam");
    let out = dir.path().join("out.bam");

    let output = run_bamverify(&[input.to_str().unwrap(), out.to_str().unwrap()]);
    assert_failed(&output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.bam"));
    assert!(!out.exists());
}

#[test]
fn test_unwritable_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    write_two_reference_bam(&input, vec![mapped_mate("r1", true, 0)]);
    let out = dir.path().join("no_such_dir").join("out.bam");

    let output = run_bamverify(&[input.to_str().unwrap(), out.to_str().unwrap()]);
    assert_failed(&output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to open output"));
}

#[test]
fn test_malformed_sam_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.sam");
    std::fs::write(&input, "@SQ\tSN:chr1\tLN:100\nr1\tnot-a-flag\tchr1\n").unwrap();
    let out = dir.path().join("out.bam");

    assert_failed(&run_bamverify(&[input.to_str().unwrap(), out.to_str().unwrap()]));
}

#[test]
fn test_invalid_max_memory() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    write_two_reference_bam(&input, Vec::new());
    let out = dir.path().join("out.bam");

    let output =
        run_bamverify(&[input.to_str().unwrap(), out.to_str().unwrap(), "--max-memory", "lots"]);
    assert_failed(&output);
}

#[test]
fn test_failure_after_sort_removes_intermediate_files() {
    let dir = TempDir::new().unwrap();
    let spill = TempDir::new().unwrap();
    let input = dir.path().join("in.bam");
    let out = dir.path().join("out.bam");
    let records = (0..200)
        .flat_map(|i| {
            let name = format!("q{i}");
            [mapped_mate(&name, true, 0), mapped_mate(&name, false, 1)]
        })
        .collect();
    write_two_reference_bam(&input, records);
    let metrics = dir.path().join("no_such_dir").join("counts.tsv");

    // The metrics write fails only after the sort has spilled and been grouped
    let output = run_bamverify(&[
        input.to_str().unwrap(),
        out.to_str().unwrap(),
        "--metrics",
        metrics.to_str().unwrap(),
        "--tmp-dir",
        spill.path().to_str().unwrap(),
        "--max-memory",
        "1K",
    ]);
    assert_failed(&output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("counts.tsv"));
    assert_eq!(list_dir(dir.path()), vec!["in.bam", "out.bam"]);
    assert!(list_dir(spill.path()).is_empty());
}
