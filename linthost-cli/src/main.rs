use anyhow::{anyhow, Context, Result};
use clap::Parser;
use linthost_config::{ConfigLoader, LinthostConfig};
use linthost_engine::fs_utils::find_up;
use linthost_engine::{resolve_installation, FLAT_CONFIG_FILE, LEGACY_CONFIG_FILE};
use linthost_execution::{LintOutcome, LintService, WorkerPool};
use linthost_ipc::{JobContent, Prerequisite};
use serde_json::{json, Value as JsonValue};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

mod cli;
use cli::{Cli, Commands, ConfigCommands, FileArgs};

/// `$XDG_CONFIG_HOME/linthost/config.yaml` or the platform equivalent
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("linthost").join("config.yaml"))
}

/// Load configuration from file or use defaults
fn load_config(config_path: Option<&PathBuf>) -> Result<LinthostConfig> {
    let loader = ConfigLoader::new();
    match config_path {
        Some(path) => loader
            .from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => loader
            .load(None::<&Path>, default_config_path())
            .context("Failed to load configuration"),
    }
}

/// Describe the worker a project needs: this executable in worker mode,
/// running whichever engine is installed above `file`
fn prerequisite_for(
    config: &LinthostConfig,
    project: &Path,
    file: &Path,
) -> Result<(Prerequisite, Vec<String>)> {
    let (runtime_path, launch_args) = match &config.worker.runtime_override {
        Some(runtime) => (runtime.clone(), config.worker.launch_args.clone()),
        None => {
            let current = std::env::current_exe().context("Failed to locate linthost executable")?;
            let mut args = config.worker.launch_args.clone();
            args.push("--worker".to_string());
            (current, args)
        }
    };

    let installation = resolve_installation(file)
        .with_context(|| format!("Failed to resolve engine for {:?}", file))?;
    let engine_config = config
        .lint
        .engine_location
        .override_config_file
        .clone()
        .or_else(|| find_up(file, FLAT_CONFIG_FILE, None))
        .or_else(|| find_up(file, LEGACY_CONFIG_FILE, None));

    let prerequisite = Prerequisite {
        runtime_path,
        runtime_version: env!("CARGO_PKG_VERSION").to_string(),
        engine_path: installation.package_root,
        engine_version: installation.version,
        engine_config,
        engine_ignore: None,
        working_directory: Some(project.to_path_buf()),
    };
    Ok((prerequisite, launch_args))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path {:?}", path))
}

fn service_for(config: &LinthostConfig, launch_args: Vec<String>) -> LintService {
    let pool = WorkerPool::new()
        .with_launch_args(launch_args)
        .with_request_timeout(config.worker.request_timeout());
    LintService::new(Arc::new(pool), config.lint.clone())
}

fn job_content(args: &FileArgs, file: &Path) -> Result<JobContent> {
    let mut content = JobContent::new(file).modified(args.modified);
    if args.stdin {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read file contents from stdin")?;
        content = content.with_text(text);
    }
    Ok(content)
}

#[derive(Clone, Copy)]
enum FileCommand {
    Lint,
    Fix,
    Debug,
}

async fn run_file_command(
    config: &LinthostConfig,
    command: FileCommand,
    args: &FileArgs,
) -> Result<JsonValue> {
    let project = absolute(&args.project)?;
    let file = absolute(&args.file)?;
    let (prerequisite, launch_args) = prerequisite_for(config, &project, &file)?;
    let content = job_content(args, &file)?;
    let service = service_for(config, launch_args);

    let output = match command {
        FileCommand::Lint => outcome_json(service.lint(&project, &prerequisite, content).await?)?,
        FileCommand::Fix => outcome_json(service.fix(&project, &prerequisite, content).await?)?,
        FileCommand::Debug => match service.debug(&project, &prerequisite, content).await? {
            Some(report) => serde_json::to_value(report)?,
            None => JsonValue::Null,
        },
    };

    service.pool().dispose_all();
    Ok(output)
}

fn outcome_json(outcome: LintOutcome) -> Result<JsonValue> {
    match outcome {
        LintOutcome::Report(report) => Ok(serde_json::to_value(report)?),
        LintOutcome::NothingToLint => {
            info!("No lint configuration applies to this file");
            Ok(json!({ "rules": {}, "results": [] }))
        }
        LintOutcome::NoResult => {
            warn!("Worker exited before answering");
            Ok(JsonValue::Null)
        }
    }
}

async fn clear_cache_command(config: &LinthostConfig, project: &Path) -> Result<JsonValue> {
    let project = absolute(project)?;
    // Any path inside the project resolves the same engine as the project
    let (prerequisite, launch_args) =
        prerequisite_for(config, &project, &project.join(FLAT_CONFIG_FILE))?;
    let service = service_for(config, launch_args);

    service.pool().ensure_worker(&project, &prerequisite)?;
    let cleared = service.clear_cache().await;
    service.pool().dispose_all();
    Ok(json!({ "cleared": cleared }))
}

/// Handle configuration validation
fn handle_config_validate(config_file: &PathBuf) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow!("Configuration file not found: {:?}", config_file));
    }

    load_config(Some(config_file))?;
    println!("Configuration file is valid");
    Ok(())
}

/// Handle configuration generation
fn handle_config_generate(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    fs::write(output, LinthostConfig::generate_sample())
        .context("Failed to write configuration file")?;

    println!("Configuration generated at: {:?}", output);
    Ok(())
}

/// Handle configuration display
fn handle_config_show(config: &LinthostConfig, format: &str) -> Result<()> {
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => {
            let yaml = serde_yaml::to_string(config).context("Failed to serialize to YAML")?;
            print!("{}", yaml);
        }
        "json" => {
            let json =
                serde_json::to_string_pretty(config).context("Failed to serialize to JSON")?;
            println!("{}", json);
        }
        _ => {
            return Err(anyhow!(
                "Unknown output format: {}. Valid formats: yaml, json",
                format
            ));
        }
    }
    Ok(())
}

fn print_json(value: &JsonValue) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Worker mode owns stdio, so it sets up its own tracing
    if cli.worker {
        return linthost_worker::run(cli.dispatcher)
            .await
            .context("Worker failed");
    }

    let mut config = load_config(cli.config.as_ref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    linthost_logging::init_logging(&config.logging)?;
    debug!("linthost {} starting", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Some(Commands::Lint(args)) => {
            print_json(&run_file_command(&config, FileCommand::Lint, args).await?)
        }
        Some(Commands::Fix(args)) => {
            print_json(&run_file_command(&config, FileCommand::Fix, args).await?)
        }
        Some(Commands::Debug(args)) => {
            print_json(&run_file_command(&config, FileCommand::Debug, args).await?)
        }
        Some(Commands::ClearCache { project }) => {
            print_json(&clear_cache_command(&config, project).await?)
        }
        Some(Commands::Config { config_cmd }) => match config_cmd {
            ConfigCommands::Validate { config_file } => handle_config_validate(config_file),
            ConfigCommands::Generate { output, force } => handle_config_generate(output, *force),
            ConfigCommands::Show { format } => handle_config_show(&config, format),
        },
        None => Err(anyhow!("No command given; see --help")),
    }
}
