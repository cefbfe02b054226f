//! Stable exit codes for forge CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid input, configuration or layout, or any other error.
pub const INVALID: i32 = 1;
/// `inform`, `abort` or `watch` found no active execute session.
pub const NO_SESSION: i32 = 2;
/// `resume` preconditions failed: split incomplete or no wave checkpoint.
pub const NOT_RESUMABLE: i32 = 3;
/// The provider session ended without success.
pub const SESSION_FAILED: i32 = 4;
