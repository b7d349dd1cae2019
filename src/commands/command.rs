//! Command trait definition for CLI commands.

use anyhow::Result;

/// Trait implemented by bamverify CLI commands.
///
/// The `command_line` parameter contains the full invocation for the output `@PG` record.
pub trait Command {
    #[allow(clippy::missing_errors_doc)]
    fn execute(&self, command_line: &str) -> Result<()>;
}
