//! Sequential execution of the planned task list.
//!
//! The [`TaskExecutor`] trait decouples the task loop from process spawning.
//! Tests use scripted executors that return predetermined outcomes without
//! running anything.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::plan::{FailurePolicy, TaskSpec};
use crate::io::process::{run_with_timeout, write_command_log};

/// Shared context for every task invocation.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Working directory for task processes (the project root).
    pub workdir: PathBuf,
    /// Directory receiving one log file per task.
    pub logs_dir: PathBuf,
    /// Truncate captured task output beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Terminal state of one planned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Passed,
    Failed,
    Skipped,
}

/// Recorded outcome for one planned task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskResult {
    pub name: String,
    pub status: TaskStatus,
    /// Executions performed, 0 for skipped tasks.
    pub attempts: u32,
}

/// Abstraction over task execution backends.
pub trait TaskExecutor {
    /// Run the task once. `Ok(true)` means the command exited zero within its
    /// timeout. `Err` is reserved for runner-internal failures (e.g. the
    /// program cannot be spawned) and aborts the whole run.
    fn exec(&self, task: &TaskSpec, ctx: &TaskContext) -> Result<bool>;
}

/// Executor that spawns the task's program as a child process.
pub struct ProcessTaskExecutor;

impl TaskExecutor for ProcessTaskExecutor {
    #[instrument(skip_all, fields(task = %task.name))]
    fn exec(&self, task: &TaskSpec, ctx: &TaskContext) -> Result<bool> {
        let mut cmd = Command::new(&task.program);
        cmd.args(&task.args).current_dir(&ctx.workdir);

        let output = run_with_timeout(cmd, task.timeout, ctx.output_limit_bytes)
            .with_context(|| format!("run task {}", task.name))?;
        write_command_log(&ctx.logs_dir.join(task_log_name(&task.name)), &output)?;

        if output.timed_out {
            warn!(timeout_secs = task.timeout.as_secs(), "task timed out");
            return Ok(false);
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "task failed");
            return Ok(false);
        }
        Ok(true)
    }
}

/// Log file name for a task, safe for the filesystem.
pub fn task_log_name(task_name: &str) -> String {
    let safe: String = task_name
        .chars()
        .map(|c| if c == ':' || c == '/' { '-' } else { c })
        .collect();
    format!("{safe}.log")
}

/// Outcome of the whole task phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TasksOutcome {
    /// One entry per planned task, in plan order. Tasks after an abort are
    /// absent: they never started.
    pub results: Vec<TaskResult>,
    /// Name of the task that aborted the run, if any.
    pub aborted: Option<String>,
}

/// Run the planned tasks strictly in order.
///
/// Each task gets `retries + 1` attempts. A task that stays failed is either
/// recorded and skipped past (`FailurePolicy::Continue`) or stops the phase
/// (`FailurePolicy::Abort`), leaving later tasks unexecuted.
pub fn run_tasks<E: TaskExecutor>(
    tasks: &[TaskSpec],
    executor: &E,
    ctx: &TaskContext,
) -> Result<TasksOutcome> {
    let mut results = Vec::with_capacity(tasks.len());

    for task in tasks {
        if task.skip {
            info!(task = %task.name, "task skipped");
            results.push(TaskResult {
                name: task.name.clone(),
                status: TaskStatus::Skipped,
                attempts: 0,
            });
            continue;
        }

        let budget = task.retries + 1;
        let mut passed = false;
        let mut attempts = 0;
        while attempts < budget {
            attempts += 1;
            info!(task = %task.name, attempt = attempts, "running task");
            passed = executor.exec(task, ctx)?;
            if passed {
                break;
            }
            if attempts < budget {
                warn!(task = %task.name, attempt = attempts, "task attempt failed, retrying");
            }
        }

        results.push(TaskResult {
            name: task.name.clone(),
            status: if passed {
                TaskStatus::Passed
            } else {
                TaskStatus::Failed
            },
            attempts,
        });

        if !passed && task.on_failure == FailurePolicy::Abort {
            warn!(task = %task.name, "task failed, aborting run");
            return Ok(TasksOutcome {
                results,
                aborted: Some(task.name.clone()),
            });
        }
    }

    Ok(TasksOutcome {
        results,
        aborted: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTaskExecutor;
    use std::time::Duration;

    fn task(name: &str, retries: u32, on_failure: FailurePolicy, skip: bool) -> TaskSpec {
        TaskSpec {
            name: name.to_string(),
            program: "python3".to_string(),
            args: vec!["--model".to_string(), name.to_string()],
            timeout: Duration::from_secs(600),
            retries,
            on_failure,
            skip,
        }
    }

    fn ctx(dir: &std::path::Path) -> TaskContext {
        TaskContext {
            workdir: dir.to_path_buf(),
            logs_dir: dir.join("logs"),
            output_limit_bytes: 1000,
        }
    }

    #[test]
    fn tasks_run_in_plan_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tasks = vec![
            task("enhance:realistic_vision", 0, FailurePolicy::Abort, false),
            task("enhance:cinematic_beauty", 0, FailurePolicy::Abort, false),
            task("compare", 0, FailurePolicy::Abort, false),
        ];
        let executor = ScriptedTaskExecutor::passing();

        let outcome = run_tasks(&tasks, &executor, &ctx(temp.path())).expect("run");

        assert_eq!(
            executor.call_names(),
            vec![
                "enhance:realistic_vision",
                "enhance:cinematic_beauty",
                "compare"
            ]
        );
        assert!(outcome.aborted.is_none());
        assert!(outcome.results.iter().all(|r| r.status == TaskStatus::Passed));
    }

    #[test]
    fn aborting_failure_stops_later_tasks() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tasks = vec![
            task("enhance:realistic_vision", 0, FailurePolicy::Abort, false),
            task("enhance:cinematic_beauty", 0, FailurePolicy::Abort, false),
            task("compare", 0, FailurePolicy::Abort, false),
        ];
        let executor = ScriptedTaskExecutor::with_outcomes(vec![false]);

        let outcome = run_tasks(&tasks, &executor, &ctx(temp.path())).expect("run");

        assert_eq!(executor.call_names(), vec!["enhance:realistic_vision"]);
        assert_eq!(outcome.aborted.as_deref(), Some("enhance:realistic_vision"));
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].status, TaskStatus::Failed);
    }

    #[test]
    fn continue_policy_records_failure_and_proceeds() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tasks = vec![
            task("batch-test", 0, FailurePolicy::Continue, false),
            task("compare", 0, FailurePolicy::Abort, false),
        ];
        let executor = ScriptedTaskExecutor::with_outcomes(vec![false, true]);

        let outcome = run_tasks(&tasks, &executor, &ctx(temp.path())).expect("run");

        assert!(outcome.aborted.is_none());
        assert_eq!(outcome.results[0].status, TaskStatus::Failed);
        assert_eq!(outcome.results[1].status, TaskStatus::Passed);
    }

    #[test]
    fn retries_spend_the_attempt_budget() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tasks = vec![task("compare", 2, FailurePolicy::Abort, false)];
        let executor = ScriptedTaskExecutor::with_outcomes(vec![false, false, true]);

        let outcome = run_tasks(&tasks, &executor, &ctx(temp.path())).expect("run");

        assert_eq!(outcome.results[0].status, TaskStatus::Passed);
        assert_eq!(outcome.results[0].attempts, 3);
    }

    #[test]
    fn skipped_task_is_recorded_without_execution() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tasks = vec![
            task("enhance:realistic_vision", 0, FailurePolicy::Abort, true),
            task("compare", 0, FailurePolicy::Abort, false),
        ];
        let executor = ScriptedTaskExecutor::passing();

        let outcome = run_tasks(&tasks, &executor, &ctx(temp.path())).expect("run");

        assert_eq!(executor.call_names(), vec!["compare"]);
        assert_eq!(outcome.results[0].status, TaskStatus::Skipped);
        assert_eq!(outcome.results[0].attempts, 0);
    }

    #[test]
    fn process_executor_runs_real_commands_and_logs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let context = ctx(temp.path());
        let spec = TaskSpec {
            name: "enhance:realistic_vision".to_string(),
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo enhanced".to_string()],
            timeout: Duration::from_secs(5),
            retries: 0,
            on_failure: FailurePolicy::Abort,
            skip: false,
        };

        let passed = ProcessTaskExecutor.exec(&spec, &context).expect("exec");
        assert!(passed);

        let log = std::fs::read_to_string(
            context.logs_dir.join("enhance-realistic_vision.log"),
        )
        .expect("read log");
        assert!(log.contains("enhanced"));
    }

    #[test]
    fn process_executor_reports_nonzero_exit_as_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let context = ctx(temp.path());
        let spec = TaskSpec {
            name: "compare".to_string(),
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 2".to_string()],
            timeout: Duration::from_secs(5),
            retries: 0,
            on_failure: FailurePolicy::Abort,
            skip: false,
        };

        let passed = ProcessTaskExecutor.exec(&spec, &context).expect("exec");
        assert!(!passed);
    }
}
