//! Sorting of BAM files by read name.
//!
//! Grouping duplicate observations of a read requires every record sharing a name to
//! be adjacent. [`ExternalSorter`] provides that ordering for inputs of any size:
//!
//! 1. **Read phase**: Stream BAM records and extract [`IdentifierKey`]s
//! 2. **Accumulate phase**: Buffer records until the memory budget is reached
//! 3. **Sort phase**: Sort in-memory records, in parallel with rayon
//! 4. **Spill phase**: Write each sorted chunk to a temp file
//! 5. **Merge phase**: K-way merge of the temp files using a min-heap

pub mod external;
pub mod keys;

pub use external::{ExternalSorter, SortStats};
pub use keys::{IdentifierKey, SortKey, compare_identifiers};
