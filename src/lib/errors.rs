//! Custom error types for bamverify operations.

use thiserror::Error;

/// Result type alias for bamverify operations
pub type Result<T> = std::result::Result<T, VerifyError>;

/// Error type for bamverify operations
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Input and output resolve to the same file
    #[error("Can't read and write the same file: {path}")]
    SamePath {
        /// The path given for both input and output
        path: String,
    },

    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "BAM", "Reference FASTA")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Header text could not be synthesized from the reference sequences
    #[error("Failed to synthesize header text for reference '{reference}'")]
    HeaderSynthesis {
        /// The reference sequence being formatted when the failure occurred
        reference: String,
    },

    /// The name-sorted stream revisited an identifier after moving past it
    #[error(
        "Sorted stream is not grouped by read name: '{identifier}' appeared after '{previous}'"
    )]
    UngroupedIdentifier {
        /// The identifier that broke the ordering
        identifier: String,
        /// The identifier of the group that preceded it
        previous: String,
    },
}
