//! Pipeline configuration stored in `facepipe.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Pipeline configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to the values the original deployment
/// used.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    pub server: ServerConfig,
    pub readiness: ReadinessConfig,
    pub bootstrap: BootstrapConfig,
    pub workspace: WorkspaceConfig,
    pub tasks: TasksConfig,
}

/// How to launch the WebUI server process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Working directory for the server process, relative to the project root.
    pub workdir: PathBuf,
    /// Server argv (e.g. `["bash", "webui.sh"]`).
    pub command: Vec<String>,
    /// Local port the readiness probe targets.
    pub port: u16,
    /// Server log file name under the logs directory.
    pub log_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("stable-diffusion-webui"),
            command: vec!["bash".to_string(), "webui.sh".to_string()],
            port: 7860,
            log_name: "webui.log".to_string(),
        }
    }
}

/// Bounds for the readiness poll loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReadinessConfig {
    pub max_attempts: u32,
    pub interval_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval_secs: 5,
        }
    }
}

/// Runtime provisioning and dependency installation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BootstrapConfig {
    pub enabled: bool,
    /// Interpreter required by the pipeline scripts.
    pub runtime: String,
    /// Package installer used for the dependency manifest.
    pub installer: String,
    /// System packages installed when the runtime or installer is missing.
    pub system_packages: Vec<String>,
    /// System package manager install argv, packages appended.
    pub package_manager: Vec<String>,
    /// Dependency manifest path, relative to the project root.
    pub manifest: PathBuf,
    /// Additional attempts after a failed manifest install.
    pub install_retries: u32,
    pub install_timeout_secs: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            runtime: "python3".to_string(),
            installer: "pip3".to_string(),
            system_packages: vec!["python3".to_string(), "python3-pip".to_string()],
            package_manager: vec![
                "apt-get".to_string(),
                "install".to_string(),
                "-y".to_string(),
            ],
            manifest: PathBuf::from("requirements.txt"),
            install_retries: 0,
            install_timeout_secs: 600,
        }
    }
}

/// Workspace layout root. `input/`, `outputs/` and `logs/` live under it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
        }
    }
}

/// The enhancement pipeline task list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TasksConfig {
    /// Models to run an enhancement pass for, in order.
    pub models: Vec<String>,
    /// Variations generated per input image.
    pub per_image: u32,
    /// Run the batch-test pass before comparison.
    pub batch_testing: bool,
    /// Directory containing the pipeline scripts.
    pub pipeline_dir: PathBuf,
    pub enhance_timeout_secs: u64,
    pub batch_timeout_secs: u64,
    pub compare_timeout_secs: u64,
    /// Additional attempts after a task's first failure.
    pub retries: u32,
    /// Record task failures and keep going instead of aborting.
    pub continue_on_failure: bool,
    /// Task names to plan as skipped.
    pub skip: Vec<String>,
    /// Truncate captured task stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            models: vec![
                "realistic_vision".to_string(),
                "cinematic_beauty".to_string(),
            ],
            per_image: 1,
            batch_testing: false,
            pipeline_dir: PathBuf::from("pipelines"),
            enhance_timeout_secs: 600,
            batch_timeout_secs: 1800,
            compare_timeout_secs: 300,
            retries: 0,
            continue_on_failure: false,
            skip: Vec::new(),
            output_limit_bytes: 100_000,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.server.command.is_empty() || self.server.command[0].trim().is_empty() {
            return Err(anyhow!("server.command must be a non-empty array"));
        }
        if self.server.port == 0 {
            return Err(anyhow!("server.port must be > 0"));
        }
        if self.readiness.max_attempts == 0 {
            return Err(anyhow!("readiness.max_attempts must be > 0"));
        }
        if self.readiness.interval_secs == 0 {
            return Err(anyhow!("readiness.interval_secs must be > 0"));
        }
        if self.bootstrap.enabled {
            if self.bootstrap.runtime.trim().is_empty() {
                return Err(anyhow!("bootstrap.runtime must not be empty"));
            }
            if self.bootstrap.installer.trim().is_empty() {
                return Err(anyhow!("bootstrap.installer must not be empty"));
            }
            if self.bootstrap.package_manager.is_empty() {
                return Err(anyhow!("bootstrap.package_manager must be a non-empty array"));
            }
            if self.bootstrap.install_timeout_secs == 0 {
                return Err(anyhow!("bootstrap.install_timeout_secs must be > 0"));
            }
        }
        if self.tasks.models.is_empty() {
            return Err(anyhow!("tasks.models must list at least one model"));
        }
        if self.tasks.per_image == 0 {
            return Err(anyhow!("tasks.per_image must be > 0"));
        }
        if self.tasks.enhance_timeout_secs == 0
            || self.tasks.batch_timeout_secs == 0
            || self.tasks.compare_timeout_secs == 0
        {
            return Err(anyhow!("task timeouts must be > 0"));
        }
        if self.tasks.output_limit_bytes == 0 {
            return Err(anyhow!("tasks.output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PipelineConfig::default()`.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        let cfg = PipelineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PipelineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PipelineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, PipelineConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("facepipe.toml");
        let mut cfg = PipelineConfig::default();
        cfg.tasks.models = vec!["realistic_vision".to_string()];
        cfg.readiness.max_attempts = 12;
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("facepipe.toml");
        fs::write(&path, "[server]\nport = 8188\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.server.port, 8188);
        assert_eq!(cfg.readiness.max_attempts, 60);
        assert_eq!(cfg.tasks.per_image, 1);
    }

    #[test]
    fn validate_rejects_empty_server_command() {
        let mut cfg = PipelineConfig::default();
        cfg.server.command = Vec::new();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("server.command"));
    }

    #[test]
    fn validate_rejects_zero_poll_bounds() {
        let mut cfg = PipelineConfig::default();
        cfg.readiness.max_attempts = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.readiness.interval_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_model_list() {
        let mut cfg = PipelineConfig::default();
        cfg.tasks.models = Vec::new();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("tasks.models"));
    }
}
