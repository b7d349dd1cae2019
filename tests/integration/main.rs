//! Integration tests driving the bamverify binary end to end.

mod helpers;
mod test_error_paths;
mod test_verify_command;
