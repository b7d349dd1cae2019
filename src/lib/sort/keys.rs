//! Sort keys for read-name ordering.
//!
//! Names compare with natural ordering, where runs of digits compare numerically
//! ("read2" < "read10"). Names that compare equal under natural ordering but differ
//! in their bytes ("read01" and "read1") fall back to byte order, so every distinct
//! name occupies its own position and records sharing a name are always contiguous.

use noodles::sam::alignment::record_buf::RecordBuf;
use std::cmp::Ordering;

/// Trait for sort keys that can be extracted from alignment records.
pub trait SortKey: Ord + Send + Sync {
    /// Extract a sort key from a record.
    fn from_record(record: &RecordBuf) -> Self;
}

/// Sort key for read-name (queryname) ordering.
///
/// Orders by name, then by the raw flag value so R1 precedes R2 within a name.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct IdentifierKey {
    /// Read name bytes.
    pub name: Vec<u8>,
    /// Raw SAM flags.
    pub flags: u16,
}

impl Ord for IdentifierKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_identifiers(&self.name, &other.name).then_with(|| self.flags.cmp(&other.flags))
    }
}

impl PartialOrd for IdentifierKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl SortKey for IdentifierKey {
    fn from_record(record: &RecordBuf) -> Self {
        let name =
            record.name().map_or_else(Vec::new, |n| Vec::from(<_ as AsRef<[u8]>>::as_ref(n)));
        let flags = u16::from(record.flags());
        Self { name, flags }
    }
}

/// Total ordering over read names: natural ordering, then bytes.
#[must_use]
pub fn compare_identifiers(a: &[u8], b: &[u8]) -> Ordering {
    natural_compare(a, b).then_with(|| a.cmp(b))
}

/// Natural string comparison that handles numeric runs.
///
/// Compares strings such that "read1" < "read2" < "read10".
fn natural_compare(a: &[u8], b: &[u8]) -> Ordering {
    let mut i = 0;
    let mut j = 0;

    while i < a.len() && j < b.len() {
        let a_digit = a[i].is_ascii_digit();
        let b_digit = b[j].is_ascii_digit();

        match (a_digit, b_digit) {
            (true, true) => {
                let (a_num, a_end) = parse_number(&a[i..]);
                let (b_num, b_end) = parse_number(&b[j..]);

                match a_num.cmp(&b_num) {
                    Ordering::Equal => {
                        i += a_end;
                        j += b_end;
                    }
                    ord => return ord,
                }
            }
            (true, false) => return Ordering::Less, // Digits before non-digits
            (false, true) => return Ordering::Greater,
            (false, false) => match a[i].cmp(&b[j]) {
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                ord => return ord,
            },
        }
    }

    // Whichever side has input left sorts after
    (a.len() - i).cmp(&(b.len() - j))
}

/// Parse a numeric run from the start of a byte slice.
/// Returns (number, bytes consumed).
fn parse_number(bytes: &[u8]) -> (u64, usize) {
    let mut num: u64 = 0;
    let mut i = 0;

    while i < bytes.len() && bytes[i].is_ascii_digit() {
        num = num.saturating_mul(10).saturating_add(u64::from(bytes[i] - b'0'));
        i += 1;
    }

    (num, i)
}
