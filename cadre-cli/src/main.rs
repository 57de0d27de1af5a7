//! Cadre CLI: scaffold definitions, run workflows, and probe a deployment.

#![allow(clippy::print_stdout, clippy::print_stderr)] // CLI program intentionally uses stdio

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use cadre::prelude::*;
use cadre::tools::LocalProcessExecutor;

/// Cadre - autonomous multi-agent orchestration engine
#[derive(Parser)]
#[command(name = "cadre")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold an agent or workflow definition file
    Init(InitArgs),

    /// Execute a workflow definition
    Run(RunArgs),

    /// Run the test suite
    Test,

    /// Probe a deployment's health endpoint
    Status(StatusArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum DefinitionKind {
    Agent,
    Workflow,
}

/// Arguments for the init command
#[derive(Args)]
struct InitArgs {
    /// Name of the definition to scaffold
    name: String,

    /// What to scaffold
    #[arg(long, value_enum, default_value = "agent")]
    kind: DefinitionKind,

    /// Overwrite an existing file
    #[arg(short, long)]
    force: bool,
}

/// Arguments for the run command
#[derive(Args)]
struct RunArgs {
    /// Workflow name or path to its JSON definition
    workflow: String,

    /// Workflow inputs as a JSON object
    #[arg(long, default_value = "{}")]
    inputs: String,

    /// Tenant to execute under
    #[arg(long, default_value = "", env = "CADRE_TENANT")]
    tenant: String,
}

/// Arguments for the status command
#[derive(Args)]
struct StatusArgs {
    /// Health endpoint URL
    #[arg(long, default_value = "http://127.0.0.1:8700/healthz", env = "CADRE_HEALTH_URL")]
    url: String,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Argument errors exit non-zero before any I/O. Help and
            // version requests are not errors.
            if err.use_stderr() {
                eprintln!("{err}");
                return ExitCode::FAILURE;
            }
            print!("{err}");
            return ExitCode::SUCCESS;
        }
    };

    init_logging(cli.verbose);

    match cli.command {
        Commands::Init(args) => cmd_init(&args),
        Commands::Run(args) => cmd_run(&args),
        Commands::Test => cmd_test(),
        Commands::Status(args) => cmd_status(&args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cadre={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn cmd_init(args: &InitArgs) -> ExitCode {
    let path = PathBuf::from(format!("{}.json", args.name));
    if path.exists() && !args.force {
        eprintln!(
            "error: {} already exists (use --force to overwrite)",
            path.display()
        );
        return ExitCode::FAILURE;
    }

    let scaffold = match args.kind {
        DefinitionKind::Agent => serde_json::json!({
            "name": args.name,
            "version": "0.1.0",
            "role": "implementer",
            "description": "",
            "capabilities": [],
            "constraints": {
                "max_tokens": 4096,
                "timeout_seconds": 120,
                "max_retries": 2,
                "parallel_allowed": true,
            },
            "autonomy": "supervised",
        }),
        DefinitionKind::Workflow => serde_json::json!({
            "name": args.name,
            "version": "0.1.0",
            "steps": [
                {
                    "id": "first-step",
                    "action": "run-command",
                    "command": "echo hello",
                }
            ],
            "execution": {
                "mode": "dependency-aware",
                "parallel_limit": 4,
            },
        }),
    };

    let pretty = serde_json::to_string_pretty(&scaffold).expect("scaffold serializes");
    if let Err(err) = std::fs::write(&path, pretty) {
        eprintln!("error: failed to write {}: {err}", path.display());
        return ExitCode::FAILURE;
    }
    println!("created {}", path.display());
    ExitCode::SUCCESS
}

fn cmd_run(args: &RunArgs) -> ExitCode {
    // Parse inputs before touching the filesystem or network.
    let inputs: HashMap<String, serde_json::Value> = match serde_json::from_str(&args.inputs) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        Ok(_) => {
            eprintln!("error: --inputs must be a JSON object");
            return ExitCode::FAILURE;
        }
        Err(err) => {
            eprintln!("error: invalid --inputs JSON: {err}");
            return ExitCode::FAILURE;
        }
    };

    let path = if args.workflow.ends_with(".json") {
        PathBuf::from(&args.workflow)
    } else {
        PathBuf::from(format!("{}.json", args.workflow))
    };
    let definition = match WorkflowDefinition::load_from_file(&path) {
        Ok(definition) => definition,
        Err(err) => {
            eprintln!("error: failed to load {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(workflow = %definition.name, steps = definition.steps.len(), "loaded workflow");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = runtime.block_on(async {
        let engine = Engine::builder()
            .executor(Arc::new(LocalProcessExecutor))
            .build();
        engine.register_builtin_hooks();
        engine.register_workflow(definition.clone())?;
        engine
            .execute_workflow(&definition.name, inputs, &args.tenant)
            .await
    });

    match outcome {
        Ok(result) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&result).expect("result serializes")
            );
            if result.status == WorkflowStatus::Completed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_test() -> ExitCode {
    let status = std::process::Command::new("cargo")
        .args(["test", "--workspace"])
        .status();
    match status {
        Ok(status) if status.success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: failed to run cargo test: {err}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_status(args: &StatusArgs) -> ExitCode {
    match reqwest::blocking::get(&args.url) {
        Ok(response) if response.status().is_success() => {
            println!("ok: {} -> {}", args.url, response.status());
            ExitCode::SUCCESS
        }
        Ok(response) => {
            eprintln!("unhealthy: {} -> {}", args.url, response.status());
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("unreachable: {err}");
            ExitCode::FAILURE
        }
    }
}
