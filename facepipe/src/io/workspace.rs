//! Workspace directory layout and initialization.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Fixed directories the pipeline reads and writes under the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    /// Source images consumed by the enhancement passes.
    pub input_dir: PathBuf,
    /// Enhanced images and comparison artifacts.
    pub outputs_dir: PathBuf,
    /// Server, bootstrap, and per-task log files plus the run report.
    pub logs_dir: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            input_dir: root.join("input"),
            outputs_dir: root.join("outputs"),
            logs_dir: root.join("logs"),
            root,
        }
    }
}

/// Create the workspace directories, parents included.
///
/// Idempotent: succeeds whether or not the directories already exist.
pub fn init_workspace(paths: &WorkspacePaths) -> Result<()> {
    for dir in [&paths.input_dir, &paths.outputs_dir, &paths.logs_dir] {
        fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    }
    debug!(root = %paths.root.display(), "workspace directories ready");
    Ok(())
}
