//! CLI argument parsing definitions

use clap::{Args, Parser, Subcommand};
use linthost_ipc::DispatcherVariant;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Run as worker process (internal use)
    #[arg(long, hide = true)]
    pub worker: bool,

    /// Dispatcher the worker serves (used with --worker)
    #[arg(long, value_name = "VARIANT", hide = true, default_value = "modern")]
    pub dispatcher: DispatcherVariant,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// A file to hand to a worker
#[derive(Args, Debug, Clone)]
pub struct FileArgs {
    /// Project root the worker is bound to
    #[arg(long, value_name = "PATH")]
    pub project: PathBuf,

    /// File to lint
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Read the file's contents from stdin instead of disk
    #[arg(long)]
    pub stdin: bool,

    /// Treat the text as an unsaved editor buffer
    #[arg(long)]
    pub modified: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Lint a file and print the report as JSON
    Lint(FileArgs),

    /// Apply fixes to a file and print what remains as JSON
    Fix(FileArgs),

    /// Show which engine a file resolves to
    Debug(FileArgs),

    /// Drop the engine cache of the worker for a project
    ClearCache {
        /// Project root the worker is bound to
        #[arg(long, value_name = "PATH")]
        project: PathBuf,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Write a sample configuration file
    Generate {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration in use
    Show {
        /// Output format: yaml, json
        #[arg(long, value_name = "FORMAT", default_value = "yaml")]
        format: String,
    },
}
