//! Face-enhancement pipeline launcher.
//!
//! facepipe provisions a Python runtime, launches the enhancement WebUI as a
//! background process, polls it for readiness on a local port, then drives
//! the enhancement pipeline as an ordered list of external tasks before
//! supervising the server until it exits. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (task planning, the poll loop).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, child processes, the
//!   HTTP probe). Trait seams (`Probe`, `TaskExecutor`) enable scripted
//!   implementations in tests.
//!
//! [`run`] coordinates core logic with I/O to implement the `run` command.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
