//! The final count report printed on stdout.

use crate::metrics::ReadCounts;
use std::io::{self, Write};

/// Formats the report lines, one `<label>: <count>` per line, in fixed order.
///
/// # Example
/// ```
/// use bamverify_lib::metrics::ReadCounts;
/// use bamverify_lib::report::format_report;
///
/// let lines = format_report(&ReadCounts::default());
/// assert_eq!(lines[0], "Mapped reads: 0");
/// assert_eq!(lines.len(), 5);
/// ```
#[must_use]
pub fn format_report(counts: &ReadCounts) -> Vec<String> {
    [
        ("Mapped reads", counts.mapped_reads),
        ("Total reads", counts.total_reads),
        ("Unique mapped reads", counts.unique_mapped_reads),
        ("Unique multiply-mapped reads", counts.unique_multi_mapped_reads),
        ("Unique total reads", counts.unique_total_reads),
    ]
    .into_iter()
    .map(|(label, count)| format!("{label}: {count}"))
    .collect()
}

/// Writes the report to `out`, newline-terminated.
///
/// # Errors
/// Returns an error if writing fails.
pub fn write_report<W: Write>(out: &mut W, counts: &ReadCounts) -> io::Result<()> {
    for line in format_report(counts) {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_report_order() {
        let counts = ReadCounts {
            total_reads: 10,
            mapped_reads: 8,
            unique_mapped_reads: 5,
            unique_total_reads: 6,
            unique_multi_mapped_reads: 2,
            invalid_reference_reads: 1,
        };
        assert_eq!(format_report(&counts), vec![
            "Mapped reads: 8",
            "Total reads: 10",
            "Unique mapped reads: 5",
            "Unique multiply-mapped reads: 2",
            "Unique total reads: 6",
        ]);
    }

    #[test]
    fn test_write_report() {
        let mut out = Vec::new();
        write_report(&mut out, &ReadCounts::default()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Mapped reads: 0\nTotal reads: 0\nUnique mapped reads: 0\n\
             Unique multiply-mapped reads: 0\nUnique total reads: 0\n"
        );
    }
}
