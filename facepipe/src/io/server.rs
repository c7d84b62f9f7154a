//! Background server process lifecycle.
//!
//! The launched WebUI is held in a [`ServerProcess`] that kills the child on
//! drop. Only [`ServerProcess::wait`] disarms the kill, so every early-return
//! path (readiness timeout, aborted task, any error) terminates the server
//! instead of leaking it.

use std::fs::File;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

/// Handle to the launched server child process.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    kill_on_drop: bool,
}

impl ServerProcess {
    /// Spawn `command` in `workdir` with stdout/stderr redirected to
    /// `log_path`. The process is not validated beyond the spawn itself; a
    /// server that crashes immediately surfaces through the readiness poll.
    pub fn launch(workdir: &Path, command: &[String], log_path: &Path) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("server command must not be empty"))?;

        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create log dir {}", parent.display()))?;
        }
        let log = File::create(log_path)
            .with_context(|| format!("create server log {}", log_path.display()))?;
        let log_err = log
            .try_clone()
            .with_context(|| format!("clone server log {}", log_path.display()))?;

        let child = Command::new(program)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .with_context(|| format!("spawn server `{program}` in {}", workdir.display()))?;

        info!(pid = child.id(), program, "server launched");
        Ok(Self {
            child,
            kill_on_drop: true,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Supervise: block until the server exits on its own.
    ///
    /// Consumes the handle and disarms the kill-on-drop cleanup.
    pub fn wait(mut self) -> Result<ExitStatus> {
        self.kill_on_drop = false;
        debug!(pid = self.child.id(), "waiting for server to exit");
        let status = self.child.wait().context("wait for server process")?;
        info!(exit_code = ?status.code(), "server exited");
        Ok(status)
    }

    /// Terminate the server now instead of waiting for it.
    pub fn shutdown(mut self) -> Result<()> {
        self.kill_on_drop = false;
        self.child.kill().context("kill server process")?;
        self.child.wait().context("wait server process after kill")?;
        Ok(())
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if !self.kill_on_drop {
            return;
        }
        warn!(pid = self.child.id(), "terminating server on early exit");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn wait_returns_server_exit_status() {
        let temp = tempfile::tempdir().expect("tempdir");
        let server = ServerProcess::launch(
            temp.path(),
            &sh("exit 7"),
            &temp.path().join("logs").join("webui.log"),
        )
        .expect("launch");

        let status = server.wait().expect("wait");
        assert_eq!(status.code(), Some(7));
    }

    #[test]
    fn server_output_lands_in_log_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log_path = temp.path().join("logs").join("webui.log");
        let server = ServerProcess::launch(temp.path(), &sh("echo booting; echo oops >&2"), &log_path)
            .expect("launch");
        server.wait().expect("wait");

        let log = std::fs::read_to_string(&log_path).expect("read log");
        assert!(log.contains("booting"));
        assert!(log.contains("oops"));
    }

    #[test]
    fn drop_kills_a_running_server() {
        let temp = tempfile::tempdir().expect("tempdir");
        let server = ServerProcess::launch(
            temp.path(),
            &sh("sleep 30"),
            &temp.path().join("webui.log"),
        )
        .expect("launch");
        let pid = server.id();

        drop(server);

        // Killed and reaped: the pid no longer exists (or is no longer ours).
        assert!(!PathBuf::from(format!("/proc/{pid}")).exists());
    }

    #[test]
    fn shutdown_terminates_without_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let server = ServerProcess::launch(
            temp.path(),
            &sh("sleep 30"),
            &temp.path().join("webui.log"),
        )
        .expect("launch");
        server.shutdown().expect("shutdown");
    }

    #[test]
    fn empty_command_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = ServerProcess::launch(temp.path(), &[], &temp.path().join("webui.log"))
            .unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }
}
