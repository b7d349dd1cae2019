//! CLI command implementations for bamverify.
//!
//! - [`verify`] - Normalize a SAM/BAM file and count unique reads

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::uninlined_format_args
)]

pub mod command;
pub mod verify;
