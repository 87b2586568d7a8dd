//! Stable exit codes for tuner CLI commands.

/// Planning succeeded, or every job was dispatched and finished.
pub const OK: i32 = 0;
/// Invalid document, config or arguments, or any other error.
pub const INVALID: i32 = 1;
/// `tuner run` was interrupted; running jobs were terminated.
pub const INTERRUPTED: i32 = 2;
