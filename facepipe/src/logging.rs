//! Development-time tracing for debugging the launcher.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Dev diagnostics via `RUST_LOG`, output to
//!   stderr. Not persisted, not part of the pipeline's product output.
//!
//! - **Product logs**: server output, bootstrap/install logs, per-task logs,
//!   and the run report are files under the workspace `logs/` directory.
//!   Always written, unaffected by `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=facepipe=debug cargo run -- run
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
