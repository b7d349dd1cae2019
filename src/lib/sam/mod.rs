//! SAM/BAM record utilities.
//!
//! The [`builder`] submodule constructs records and small alignment files for tests.

pub mod builder;

pub use builder::{AlignmentFileBuilder, RecordBuilder};
