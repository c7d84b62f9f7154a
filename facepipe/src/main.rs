//! facepipe CLI: launch the enhancement WebUI and drive the face pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use facepipe::core::poll::{PollOutcome, PollPolicy, poll_until_ready};
use facepipe::exit_codes;
use facepipe::io::config::{PipelineConfig, load_config, write_config};
use facepipe::io::probe::HttpProbe;
use facepipe::io::tasks::ProcessTaskExecutor;
use facepipe::io::workspace::{WorkspacePaths, init_workspace};
use facepipe::run::{RunOptions, RunStop, planned_tasks, run_pipeline};

#[derive(Parser)]
#[command(
    name = "facepipe",
    version,
    about = "Launches the enhancement WebUI and drives the face pipeline"
)]
struct Cli {
    /// Path to the pipeline config file.
    #[arg(long, global = true, default_value = "facepipe.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the workspace directories and a default config file.
    Init {
        /// Overwrite an existing config file with defaults.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the ordered task list without running anything.
    Plan {
        #[command(flatten)]
        overrides: TaskOverrides,
    },
    /// Poll the configured port until the server answers or attempts run out.
    Probe {
        /// Override the configured maximum attempts.
        #[arg(long)]
        attempts: Option<u32>,
    },
    /// Run the full pipeline: bootstrap, launch, poll, tasks, supervise.
    Run {
        #[command(flatten)]
        overrides: TaskOverrides,
        /// Readiness budget in seconds (overrides readiness.max_attempts).
        #[arg(long)]
        wait_webui: Option<u64>,
        /// Skip runtime bootstrap and dependency install.
        #[arg(long)]
        skip_bootstrap: bool,
    },
}

/// Task-plan overrides shared by `plan` and `run`.
#[derive(Args)]
struct TaskOverrides {
    /// Model to run, repeatable; replaces the configured list.
    #[arg(long = "model")]
    models: Vec<String>,
    /// Variations per input image.
    #[arg(long)]
    per_image: Option<u32>,
    /// Also run the batch-test pass.
    #[arg(long)]
    batch_testing: bool,
    /// Task name to skip, repeatable.
    #[arg(long = "skip")]
    skip: Vec<String>,
}

impl TaskOverrides {
    fn into_run_options(self, wait_webui: Option<u64>, skip_bootstrap: bool) -> RunOptions {
        RunOptions {
            models: if self.models.is_empty() {
                None
            } else {
                Some(self.models)
            },
            per_image: self.per_image,
            batch_testing: self.batch_testing,
            wait_secs: wait_webui,
            skip: self.skip,
            skip_bootstrap,
        }
    }
}

fn main() {
    facepipe::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FAILURE);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("resolve working directory")?;
    let cfg = load_config(&cli.config)?;
    match cli.command {
        Command::Init { force } => cmd_init(&root, &cli.config, &cfg, force),
        Command::Plan { overrides } => {
            cmd_plan(&root, &cfg, overrides.into_run_options(None, false))
        }
        Command::Probe { attempts } => cmd_probe(&cfg, attempts),
        Command::Run {
            overrides,
            wait_webui,
            skip_bootstrap,
        } => cmd_run(
            &root,
            &cfg,
            overrides.into_run_options(wait_webui, skip_bootstrap),
        ),
    }
}

fn cmd_init(root: &Path, config_path: &Path, cfg: &PipelineConfig, force: bool) -> Result<i32> {
    let paths = WorkspacePaths::new(root.join(&cfg.workspace.root));
    init_workspace(&paths)?;
    if force || !config_path.exists() {
        write_config(config_path, &PipelineConfig::default())?;
        println!("wrote {}", config_path.display());
    }
    println!("workspace ready under {}", paths.root.display());
    Ok(exit_codes::OK)
}

fn cmd_plan(root: &Path, cfg: &PipelineConfig, opts: RunOptions) -> Result<i32> {
    for task in planned_tasks(root, cfg, &opts) {
        if task.skip {
            println!("{} (skipped)", task.name);
        } else {
            println!("{}", task.name);
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_probe(cfg: &PipelineConfig, attempts: Option<u32>) -> Result<i32> {
    let probe = HttpProbe::for_port(cfg.server.port)?;
    let policy = PollPolicy {
        max_attempts: attempts.unwrap_or(cfg.readiness.max_attempts),
        interval: Duration::from_secs(cfg.readiness.interval_secs),
    };
    match poll_until_ready(&probe, &policy, std::thread::sleep) {
        PollOutcome::Ready { attempts } => {
            println!("ready after {attempts} attempt(s)");
            Ok(exit_codes::OK)
        }
        PollOutcome::TimedOut { attempts } => {
            eprintln!("not ready after {attempts} attempt(s)");
            Ok(exit_codes::FAILURE)
        }
    }
}

fn cmd_run(root: &Path, cfg: &PipelineConfig, opts: RunOptions) -> Result<i32> {
    let probe = HttpProbe::for_port(cfg.server.port)?;
    let outcome = run_pipeline(root, cfg, &probe, &ProcessTaskExecutor, &opts)?;
    match outcome.stop {
        RunStop::Completed { server_status } => {
            match server_status {
                Some(0) => println!("pipeline complete"),
                Some(code) => println!("pipeline complete, server exited with status {code}"),
                None => println!("pipeline complete, server killed by signal"),
            }
            Ok(server_status.unwrap_or(exit_codes::FAILURE))
        }
        RunStop::ReadinessTimeout { attempts } => {
            eprintln!("server not ready after {attempts} attempt(s), giving up");
            Ok(exit_codes::FAILURE)
        }
        RunStop::TaskFailed { name } => {
            eprintln!("task {name} failed, run aborted");
            Ok(exit_codes::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::parse_from(["facepipe", "init"]);
        assert!(matches!(cli.command, Command::Init { force: false }));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["facepipe", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn parse_run_defaults() {
        let cli = Cli::parse_from(["facepipe", "run"]);
        let Command::Run {
            overrides,
            wait_webui,
            skip_bootstrap,
        } = cli.command
        else {
            panic!("expected run command");
        };
        assert!(overrides.models.is_empty());
        assert_eq!(overrides.per_image, None);
        assert!(!overrides.batch_testing);
        assert_eq!(wait_webui, None);
        assert!(!skip_bootstrap);
        assert_eq!(cli.config, PathBuf::from("facepipe.toml"));
    }

    #[test]
    fn parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "facepipe",
            "run",
            "--model",
            "realistic_vision",
            "--model",
            "cinematic_beauty",
            "--per-image",
            "2",
            "--skip",
            "compare",
            "--wait-webui",
            "120",
            "--skip-bootstrap",
        ]);
        let Command::Run {
            overrides,
            wait_webui,
            skip_bootstrap,
        } = cli.command
        else {
            panic!("expected run command");
        };
        assert_eq!(
            overrides.models,
            vec!["realistic_vision".to_string(), "cinematic_beauty".to_string()]
        );
        assert_eq!(overrides.per_image, Some(2));
        assert_eq!(overrides.skip, vec!["compare".to_string()]);
        assert_eq!(wait_webui, Some(120));
        assert!(skip_bootstrap);

        let opts = overrides.into_run_options(wait_webui, skip_bootstrap);
        assert_eq!(opts.models.as_deref().map(<[String]>::len), Some(2));
        assert_eq!(opts.wait_secs, Some(120));
        assert!(opts.skip_bootstrap);
    }

    #[test]
    fn parse_probe_attempts() {
        let cli = Cli::parse_from(["facepipe", "probe", "--attempts", "3"]);
        assert!(matches!(
            cli.command,
            Command::Probe { attempts: Some(3) }
        ));
    }

    #[test]
    fn parse_global_config_after_subcommand() {
        let cli = Cli::parse_from(["facepipe", "plan", "--config", "alt.toml"]);
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
    }
}
