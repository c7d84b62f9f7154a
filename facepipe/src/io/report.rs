//! Run report artifact written under the logs directory.
//!
//! Product output, unaffected by the tracing filter: a machine-readable
//! summary of what the run did, for operators and for the comparison
//! tooling downstream.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::io::tasks::TaskResult;

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// Tasks finished and the supervised server exited.
    Completed,
    /// The server never answered the readiness poll.
    ReadinessTimeout,
    /// A required task failed and aborted the run.
    TaskFailed,
}

/// Summary of one `facepipe run` invocation (`logs/run_report.json`).
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stop: StopReason,
    /// Probe attempts consumed before ready/timeout.
    pub readiness_attempts: u32,
    /// Exit code of the supervised server, when it ran to completion.
    pub server_exit: Option<i32>,
    /// Name of the aborting task, when `stop` is `task-failed`.
    pub aborted_task: Option<String>,
    pub tasks: Vec<TaskResult>,
}

/// File name of the report under the logs directory.
pub const REPORT_FILE: &str = "run_report.json";

/// Serialize the report to pretty-printed JSON with trailing newline.
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create report dir {}", parent.display()))?;
    }
    let mut payload = serde_json::to_string_pretty(report).context("serialize run report")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
