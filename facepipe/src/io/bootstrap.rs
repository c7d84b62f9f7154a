//! Runtime provisioning and dependency installation.
//!
//! Mirrors the original deployment script: check that the language runtime
//! and package installer resolve on PATH, install them via the system package
//! manager when absent, then install the dependency manifest. The manifest
//! contents are opaque here; constraint checking is the installer's job.

use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

use crate::io::config::BootstrapConfig;
use crate::io::process::{run_with_timeout, write_command_log};

/// Whether `program` resolves on PATH and can be executed.
pub fn binary_available(program: &str) -> bool {
    let result = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match result {
        Ok(_) => true,
        Err(err) if err.kind() == ErrorKind::NotFound => false,
        Err(err) => {
            warn!(program, err = %err, "binary check failed");
            false
        }
    }
}

/// Ensure the runtime and installer binaries exist, installing the configured
/// system packages when either is missing.
pub fn ensure_runtime(cfg: &BootstrapConfig, logs_dir: &Path, output_limit: usize) -> Result<()> {
    let runtime_ok = binary_available(&cfg.runtime);
    let installer_ok = binary_available(&cfg.installer);
    if runtime_ok && installer_ok {
        debug!(runtime = %cfg.runtime, installer = %cfg.installer, "runtime already present");
        return Ok(());
    }

    info!(
        runtime_ok,
        installer_ok,
        packages = ?cfg.system_packages,
        "installing system packages"
    );
    let (program, args) = cfg
        .package_manager
        .split_first()
        .ok_or_else(|| anyhow!("bootstrap.package_manager must not be empty"))?;
    let mut cmd = Command::new(program);
    cmd.args(args).args(&cfg.system_packages);

    let timeout = Duration::from_secs(cfg.install_timeout_secs);
    let output = run_with_timeout(cmd, timeout, output_limit).context("run system package manager")?;
    write_command_log(&logs_dir.join("bootstrap.log"), &output)?;

    if !output.success() {
        return Err(anyhow!(
            "system package install failed with status {:?}",
            output.status.code()
        ));
    }
    Ok(())
}

/// Install the dependency manifest with the configured installer.
///
/// Retries up to `cfg.install_retries` additional times; transient registry
/// failures are the common case this covers. The last attempt's output is
/// kept in `logs/install.log`.
pub fn install_requirements(
    cfg: &BootstrapConfig,
    root: &Path,
    logs_dir: &Path,
    output_limit: usize,
) -> Result<()> {
    let manifest = root.join(&cfg.manifest);
    if !manifest.is_file() {
        return Err(anyhow!("missing dependency manifest {}", manifest.display()));
    }

    let timeout = Duration::from_secs(cfg.install_timeout_secs);
    let attempts = cfg.install_retries + 1;
    for attempt in 1..=attempts {
        let mut cmd = Command::new(&cfg.installer);
        cmd.arg("install").arg("-r").arg(&manifest);

        let output = run_with_timeout(cmd, timeout, output_limit)
            .with_context(|| format!("run {} install", cfg.installer))?;
        write_command_log(&logs_dir.join("install.log"), &output)?;

        if output.success() {
            info!(attempt, manifest = %manifest.display(), "dependencies installed");
            return Ok(());
        }
        if attempt < attempts {
            warn!(attempt, "dependency install failed, retrying");
        }
    }

    Err(anyhow!(
        "dependency install failed after {attempts} attempt(s), see {}",
        logs_dir.join("install.log").display()
    ))
}
