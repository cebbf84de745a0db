//! apilint CLI tool.
//!
//! Usage:
//! ```bash
//! apilint lint [OPTIONS] <FILES>...
//! apilint list-functions
//! apilint init
//! ```

use anyhow::Result;
use apilint_core::Severity;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod config_resolver;

/// Linter for OpenAPI, Swagger and AsyncAPI documents
#[derive(Parser)]
#[command(name = "apilint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "APILINT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lint API description documents
    Lint(LintArgs),

    /// List available rule functions and presets
    ListFunctions,

    /// Initialize configuration and rule-set files
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
}

/// Arguments of the `lint` command.
#[derive(clap::Args, Debug, Clone)]
pub struct LintArgs {
    /// Documents to lint (glob patterns allowed)
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Rule-set file (YAML or JSON), added on top of the preset
    #[arg(short, long)]
    pub ruleset: Option<PathBuf>,

    /// Built-in preset: recommended, strict, minimal or off
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Lowest severity that makes the command fail
    #[arg(long, value_parser = parse_severity)]
    pub fail_on: Option<Severity>,

    /// Maximum number of rules evaluated in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Evaluation deadline per document, in milliseconds
    #[arg(long)]
    pub deadline_ms: Option<u64>,

    /// Only run specific rules (comma-separated ids)
    #[arg(long)]
    pub rules: Option<String>,
}

/// Output format for lint results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// One-line-per-violation compact format.
    Compact,
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    s.parse::<Severity>().map_err(|e| e.to_string())
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Lint(args) => {
            let cwd = std::env::current_dir()?;
            let source = config_resolver::resolve(&cwd, cli.config.as_deref());
            let passed = commands::lint::run(&args, &source)?;
            Ok(if passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::ListFunctions => {
            commands::list_functions::run();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { force } => {
            let cwd = std::env::current_dir()?;
            commands::init::run(&cwd, force)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
