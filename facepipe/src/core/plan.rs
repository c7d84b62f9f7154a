//! Pure planning of the ordered task list.
//!
//! The pipeline steps are modeled as data rather than control flow: one
//! enhancement pass per model, an optional batch-test pass, then the
//! comparison pass. Extending the pipeline means appending a [`TaskSpec`],
//! not editing the runner.

use std::path::Path;
use std::time::Duration;

/// Policy applied when a task exhausts its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the run; later tasks never start.
    Abort,
    /// Record the failure and move on to the next task.
    Continue,
}

/// One externally-executed pipeline command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    /// Stable task name, used for reporting, skip lists, and log file names.
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    /// Additional attempts after the first failure.
    pub retries: u32,
    pub on_failure: FailurePolicy,
    /// Planned but not executed; recorded as skipped.
    pub skip: bool,
}

/// Inputs the planner needs, already resolved from config and overrides.
#[derive(Debug, Clone)]
pub struct PlanInputs<'a> {
    /// Interpreter used to run the pipeline scripts.
    pub runtime: &'a str,
    /// Directory containing the pipeline scripts.
    pub pipeline_dir: &'a Path,
    /// Directory the comparison step reads results from.
    pub outputs_dir: &'a Path,
    pub models: &'a [String],
    pub per_image: u32,
    pub batch_testing: bool,
    pub enhance_timeout: Duration,
    pub batch_timeout: Duration,
    pub compare_timeout: Duration,
    pub retries: u32,
    pub continue_on_failure: bool,
    /// Task names to plan as skipped.
    pub skip: &'a [String],
}

/// Name of the comparison task.
pub const COMPARE_TASK: &str = "compare";
/// Name of the optional batch-test task.
pub const BATCH_TEST_TASK: &str = "batch-test";

/// Name of the enhancement task for `model`.
pub fn enhance_task_name(model: &str) -> String {
    format!("enhance:{model}")
}

/// Build the ordered task list.
///
/// Order is deterministic: enhancement passes in model order, then the
/// batch-test pass when enabled, then the comparison pass.
pub fn plan_tasks(inputs: &PlanInputs) -> Vec<TaskSpec> {
    let enhance_policy = if inputs.continue_on_failure {
        FailurePolicy::Continue
    } else {
        FailurePolicy::Abort
    };

    let mut tasks = Vec::new();
    for model in inputs.models {
        let name = enhance_task_name(model);
        tasks.push(TaskSpec {
            skip: inputs.skip.contains(&name),
            name,
            program: inputs.runtime.to_string(),
            args: vec![
                path_arg(inputs.pipeline_dir, "process_faces.py"),
                "--model".to_string(),
                model.clone(),
                "--per-image".to_string(),
                inputs.per_image.to_string(),
            ],
            timeout: inputs.enhance_timeout,
            retries: inputs.retries,
            on_failure: enhance_policy,
        });
    }

    if inputs.batch_testing
        && let Some(first_model) = inputs.models.first()
    {
        tasks.push(TaskSpec {
            name: BATCH_TEST_TASK.to_string(),
            program: inputs.runtime.to_string(),
            args: vec![
                path_arg(inputs.pipeline_dir, "batch_test_settings.py"),
                "--model".to_string(),
                first_model.clone(),
            ],
            timeout: inputs.batch_timeout,
            retries: inputs.retries,
            // Batch testing is exploratory; a failure never blocks the
            // comparison step.
            on_failure: FailurePolicy::Continue,
            skip: inputs.skip.iter().any(|s| s == BATCH_TEST_TASK),
        });
    }

    tasks.push(TaskSpec {
        name: COMPARE_TASK.to_string(),
        program: inputs.runtime.to_string(),
        args: vec![
            path_arg(inputs.pipeline_dir, "compare_results.py"),
            "--output-dir".to_string(),
            inputs.outputs_dir.to_string_lossy().into_owned(),
        ],
        timeout: inputs.compare_timeout,
        retries: inputs.retries,
        on_failure: enhance_policy,
        skip: inputs.skip.iter().any(|s| s == COMPARE_TASK),
    });

    tasks
}

fn path_arg(dir: &Path, script: &str) -> String {
    dir.join(script).to_string_lossy().into_owned()
}
