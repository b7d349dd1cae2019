//! Input validation utilities
//!
//! Common checks for command-line paths and parameters, reported through the
//! structured error types in [`crate::errors`].

use crate::errors::{Result, VerifyError};
use std::path::Path;

/// Validate that a file exists
///
/// # Arguments
/// * `path` - Path to validate
/// * `description` - Human-readable description of the file (e.g., "Input file", "Reference")
///
/// # Errors
/// Returns an error if the file does not exist
///
/// # Example
/// ```
/// use bamverify_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/file.bam", "Input file");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(VerifyError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validate that the input and output refer to different files.
///
/// Paths are compared literally first; when both exist they are also compared after
/// canonicalization so that `./in.bam` and `in.bam` are caught.
///
/// # Errors
/// Returns [`VerifyError::SamePath`] if both paths name the same file
///
/// # Example
/// ```
/// use bamverify_lib::validation::validate_distinct_paths;
///
/// assert!(validate_distinct_paths("in.bam", "out.bam").is_ok());
/// assert!(validate_distinct_paths("in.bam", "in.bam").is_err());
/// ```
pub fn validate_distinct_paths<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<()> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let same = input == output
        || matches!(
            (input.canonicalize(), output.canonicalize()),
            (Ok(a), Ok(b)) if a == b
        );
    if same {
        return Err(VerifyError::SamePath { path: input.display().to_string() });
    }
    Ok(())
}

/// Validate that a memory budget is usable
///
/// # Errors
/// Returns an error if the budget is zero
pub fn validate_memory_limit(bytes: usize, name: &str) -> Result<()> {
    if bytes == 0 {
        return Err(VerifyError::InvalidParameter {
            parameter: name.to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }
    Ok(())
}
