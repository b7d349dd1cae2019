//! Assertions over the stdout report.

use std::process::Output;

/// Counts in report order: mapped, total, unique mapped, unique multiply-mapped,
/// unique total.
pub type ReportCounts = [u64; 5];

const LABELS: [&str; 5] = [
    "Mapped reads",
    "Total reads",
    "Unique mapped reads",
    "Unique multiply-mapped reads",
    "Unique total reads",
];

/// Parses the stdout report, checking labels and order.
pub fn parse_report(stdout: &[u8]) -> ReportCounts {
    let text = String::from_utf8_lossy(stdout);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), LABELS.len(), "Unexpected report:\n{text}");

    let mut counts = [0u64; 5];
    for (i, (line, label)) in lines.iter().zip(LABELS).enumerate() {
        let (actual_label, value) = line.split_once(": ").expect("Report line without ': '");
        assert_eq!(actual_label, label, "Report line {i} out of order");
        counts[i] = value.parse().expect("Report value is not an integer");
    }
    counts
}

/// Asserts the run succeeded and printed exactly `expected`.
pub fn assert_report(output: &Output, expected: ReportCounts) {
    assert!(
        output.status.success(),
        "bamverify failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(parse_report(&output.stdout), expected);
}

/// Asserts the run failed with status 1 and printed no report.
pub fn assert_failed(output: &Output) {
    assert_eq!(output.status.code(), Some(1), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(output.stdout.is_empty(), "Report printed on failure");
}
