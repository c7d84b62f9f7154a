//! Orchestration of one full pipeline run.
//!
//! Phases, in order: workspace init, runtime bootstrap, dependency install,
//! server launch, readiness poll, task run, supervision. Expected terminal
//! states (readiness timeout, aborted task) are data in [`RunStop`], not
//! errors; `Err` is reserved for runner-internal failures. The server handle
//! kills the child on drop, so every early return here terminates the WebUI
//! while the success path hands it to the supervisor.

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::core::plan::{PlanInputs, TaskSpec, plan_tasks};
use crate::core::poll::{PollOutcome, PollPolicy, Probe, poll_until_ready};
use crate::io::bootstrap::{ensure_runtime, install_requirements};
use crate::io::config::{PipelineConfig, ReadinessConfig};
use crate::io::report::{REPORT_FILE, RunReport, StopReason, write_report};
use crate::io::server::ServerProcess;
use crate::io::tasks::{TaskContext, TaskExecutor, TaskResult, run_tasks};
use crate::io::workspace::{WorkspacePaths, init_workspace};

/// Caller-supplied overrides for one run (CLI flags).
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Replace the configured model list.
    pub models: Option<Vec<String>>,
    pub per_image: Option<u32>,
    /// Enable the batch-test pass regardless of config.
    pub batch_testing: bool,
    /// Overall readiness budget in seconds, converted to attempts at the
    /// configured interval.
    pub wait_secs: Option<u64>,
    /// Additional task names to skip, merged with the configured list.
    pub skip: Vec<String>,
    pub skip_bootstrap: bool,
}

/// Why the run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStop {
    /// Tasks finished; the supervised server exited with this status code
    /// (`None` when it was killed by a signal).
    Completed { server_status: Option<i32> },
    /// The server never answered the readiness poll. The server process was
    /// terminated.
    ReadinessTimeout { attempts: u32 },
    /// A required task failed. Later tasks never ran and the server process
    /// was terminated.
    TaskFailed { name: String },
}

/// Summary of one run invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub stop: RunStop,
    pub tasks: Vec<TaskResult>,
}

/// Execute the full pipeline in `root`.
pub fn run_pipeline<P: Probe, E: TaskExecutor>(
    root: &Path,
    cfg: &PipelineConfig,
    probe: &P,
    executor: &E,
    opts: &RunOptions,
) -> Result<RunOutcome> {
    let paths = WorkspacePaths::new(root.join(&cfg.workspace.root));
    init_workspace(&paths)?;

    if cfg.bootstrap.enabled && !opts.skip_bootstrap {
        ensure_runtime(&cfg.bootstrap, &paths.logs_dir, cfg.tasks.output_limit_bytes)
            .context("bootstrap runtime")?;
        install_requirements(
            &cfg.bootstrap,
            root,
            &paths.logs_dir,
            cfg.tasks.output_limit_bytes,
        )
        .context("install dependencies")?;
    } else {
        debug!("bootstrap skipped");
    }

    let server = ServerProcess::launch(
        &root.join(&cfg.server.workdir),
        &cfg.server.command,
        &paths.logs_dir.join(&cfg.server.log_name),
    )?;

    let policy = poll_policy(&cfg.readiness, opts.wait_secs);
    info!(
        port = cfg.server.port,
        max_attempts = policy.max_attempts,
        "waiting for server readiness"
    );
    let readiness_attempts = match poll_until_ready(probe, &policy, thread::sleep) {
        PollOutcome::Ready { attempts } => {
            info!(attempts, "server ready");
            attempts
        }
        PollOutcome::TimedOut { attempts } => {
            error!(attempts, "server never became ready");
            write_report(
                &paths.logs_dir.join(REPORT_FILE),
                &RunReport {
                    stop: StopReason::ReadinessTimeout,
                    readiness_attempts: attempts,
                    server_exit: None,
                    aborted_task: None,
                    tasks: Vec::new(),
                },
            )?;
            // Dropping `server` here terminates the child.
            return Ok(RunOutcome {
                stop: RunStop::ReadinessTimeout { attempts },
                tasks: Vec::new(),
            });
        }
    };

    let tasks = planned_tasks(root, cfg, opts);

    let ctx = TaskContext {
        workdir: root.to_path_buf(),
        logs_dir: paths.logs_dir.clone(),
        output_limit_bytes: cfg.tasks.output_limit_bytes,
    };
    let tasks_outcome = run_tasks(&tasks, executor, &ctx)?;

    if let Some(name) = tasks_outcome.aborted {
        write_report(
            &paths.logs_dir.join(REPORT_FILE),
            &RunReport {
                stop: StopReason::TaskFailed,
                readiness_attempts,
                server_exit: None,
                aborted_task: Some(name.clone()),
                tasks: tasks_outcome.results.clone(),
            },
        )?;
        // Dropping `server` here terminates the child.
        return Ok(RunOutcome {
            stop: RunStop::TaskFailed { name },
            tasks: tasks_outcome.results,
        });
    }

    info!("tasks complete, supervising server");
    let status = server.wait()?;
    write_report(
        &paths.logs_dir.join(REPORT_FILE),
        &RunReport {
            stop: StopReason::Completed,
            readiness_attempts,
            server_exit: status.code(),
            aborted_task: None,
            tasks: tasks_outcome.results.clone(),
        },
    )?;

    Ok(RunOutcome {
        stop: RunStop::Completed {
            server_status: status.code(),
        },
        tasks: tasks_outcome.results,
    })
}

/// Build the task list `run` would execute for this config and options.
pub fn planned_tasks(root: &Path, cfg: &PipelineConfig, opts: &RunOptions) -> Vec<TaskSpec> {
    let paths = WorkspacePaths::new(root.join(&cfg.workspace.root));
    let models = opts
        .models
        .clone()
        .unwrap_or_else(|| cfg.tasks.models.clone());
    let mut skip = cfg.tasks.skip.clone();
    skip.extend(opts.skip.iter().cloned());
    let pipeline_dir = root.join(&cfg.tasks.pipeline_dir);
    plan_tasks(&PlanInputs {
        runtime: &cfg.bootstrap.runtime,
        pipeline_dir: &pipeline_dir,
        outputs_dir: &paths.outputs_dir,
        models: &models,
        per_image: opts.per_image.unwrap_or(cfg.tasks.per_image),
        batch_testing: opts.batch_testing || cfg.tasks.batch_testing,
        enhance_timeout: Duration::from_secs(cfg.tasks.enhance_timeout_secs),
        batch_timeout: Duration::from_secs(cfg.tasks.batch_timeout_secs),
        compare_timeout: Duration::from_secs(cfg.tasks.compare_timeout_secs),
        retries: cfg.tasks.retries,
        continue_on_failure: cfg.tasks.continue_on_failure,
        skip: &skip,
    })
}

fn poll_policy(cfg: &ReadinessConfig, wait_secs: Option<u64>) -> PollPolicy {
    let interval_secs = cfg.interval_secs;
    let max_attempts = match wait_secs {
        Some(budget) => u32::try_from(budget.div_ceil(interval_secs))
            .unwrap_or(u32::MAX)
            .max(1),
        None => cfg.max_attempts,
    };
    PollPolicy {
        max_attempts,
        interval: Duration::from_secs(interval_secs),
    }
}
