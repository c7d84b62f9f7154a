//! Stable exit codes for facepipe CLI commands.

/// Command succeeded. After supervision, `run` instead exits with the
/// server's own status.
pub const OK: i32 = 0;
/// Bootstrap/install/launch errors, readiness timeout, or an aborted task.
pub const FAILURE: i32 = 1;
