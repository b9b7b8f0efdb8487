//! CLI command definitions for codesniff.
//!
//! Two subcommands mirror the two goals of a build integration:
//! `download` fetches and caches the tool, `check` runs it.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use crate::acquire::{Acquirer, HttpFetcher};
use crate::config::Settings;
use crate::error::ConfigurationError;
use crate::pipeline::{CheckPipeline, ToolSource};
use crate::runner::{Outcome, Runner, TracingSink};

/// Exit code for configuration, download and execution errors.
pub const EXIT_ERROR: u8 = 2;

/// Exit code when the tool reports violations.
pub const EXIT_VIOLATIONS: u8 = 1;

/// Fetch, cache and run PHP CodeSniffer.
#[derive(Parser)]
#[command(name = "codesniff")]
#[command(about = "Fetch, cache and run PHP CodeSniffer against a source tree")]
#[command(version)]
#[command(
    long_about = "codesniff downloads a PHP CodeSniffer release into a local cache (once per version) and runs it against your code.\n\nExit codes: 0 = clean, 1 = violations found, 2 = error.\n\nExample usage:\n  codesniff check --download-path ./.cache --tool-version 2.4.0 --php /usr/bin/php --source src --standard PSR2"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Download PHP CodeSniffer into the cache unless already present.
    Download(DownloadArgs),

    /// Run PHP CodeSniffer against the source tree.
    Check(CheckArgs),
}

/// Options shared by every subcommand.
#[derive(clap::Args, Debug, Default)]
pub struct ToolArgs {
    /// YAML settings file; flags and environment override its values.
    #[arg(long, env = "CODESNIFF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to an installed PHP CodeSniffer.
    #[arg(long, env = "CODESNIFF_TOOL_PATH")]
    pub tool_path: Option<PathBuf>,

    /// Directory to download PHP CodeSniffer into. Takes precedence over --tool-path.
    #[arg(long, env = "CODESNIFF_DOWNLOAD_PATH")]
    pub download_path: Option<PathBuf>,

    /// PHP CodeSniffer version to download (e.g. 2.4.0).
    #[arg(long, env = "CODESNIFF_TOOL_VERSION")]
    pub tool_version: Option<String>,

    /// Base URL of the package mirror.
    #[arg(long)]
    pub download_base_url: Option<String>,

    /// Download timeout in seconds (default: 300).
    #[arg(long)]
    pub download_timeout_secs: Option<u64>,
}

/// Arguments for `codesniff download`.
#[derive(Parser, Debug)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub tool: ToolArgs,
}

/// Arguments for `codesniff check`.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub tool: ToolArgs,

    /// PHP interpreter binary.
    #[arg(long, env = "CODESNIFF_PHP")]
    pub php: Option<PathBuf>,

    /// File or directory to check.
    #[arg(long, env = "CODESNIFF_SOURCE")]
    pub source: Option<PathBuf>,

    /// Coding standard name or ruleset file.
    #[arg(long, env = "CODESNIFF_STANDARD")]
    pub standard: Option<String>,

    /// PHP memory_limit for the run (default: 250M).
    #[arg(long, env = "CODESNIFF_MEMORY_LIMIT")]
    pub memory_limit: Option<String>,

    /// Kill the check after this many seconds.
    #[arg(long, env = "CODESNIFF_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Print the run result as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

impl ToolArgs {
    fn overrides(&self) -> Settings {
        Settings {
            tool_path: self.tool_path.clone(),
            download_path: self.download_path.clone(),
            tool_version: self.tool_version.clone(),
            download_base_url: self.download_base_url.clone(),
            download_timeout_secs: self.download_timeout_secs,
            ..Default::default()
        }
    }
}

impl CheckArgs {
    fn overrides(&self) -> Settings {
        Settings {
            php: self.php.clone(),
            source: self.source.clone(),
            standard: self.standard.clone(),
            memory_limit: self.memory_limit.clone(),
            timeout_secs: self.timeout_secs,
            ..self.tool.overrides()
        }
    }
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<ExitCode> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Download(args) => run_download_command(args).await,
        Commands::Check(args) => run_check_command(args).await,
    }
}

fn load_settings(config: Option<&PathBuf>, overrides: Settings) -> anyhow::Result<Settings> {
    let base = match config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    Ok(base.overlay(overrides))
}

fn build_acquirer(settings: &Settings) -> anyhow::Result<Acquirer> {
    let fetcher = HttpFetcher::new(settings.download_timeout())
        .context("Failed to create HTTP client")?;
    let mut acquirer = Acquirer::new(Arc::new(fetcher));
    if let Some(ref base_url) = settings.download_base_url {
        acquirer = acquirer.with_base_url(base_url.clone());
    }
    Ok(acquirer)
}

// ============================================================================
// Download Command Implementation
// ============================================================================

async fn run_download_command(args: DownloadArgs) -> anyhow::Result<ExitCode> {
    let settings = load_settings(args.tool.config.as_ref(), args.tool.overrides())?;

    let source = match settings.tool_source() {
        Err(ConfigurationError::MissingToolLocation) => {
            info!("No download path configured, nothing to download");
            return Ok(ExitCode::SUCCESS);
        }
        other => other?,
    };

    let path = match source {
        ToolSource::Download { root, version } => {
            build_acquirer(&settings)?
                .ensure_installed(&version, &root)
                .await?
        }
        ToolSource::Installed(path) => {
            info!("No download path configured, using installed PHP CodeSniffer");
            path
        }
    };

    println!("{}", path.display());
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Check Command Implementation
// ============================================================================

async fn run_check_command(args: CheckArgs) -> anyhow::Result<ExitCode> {
    let settings = load_settings(args.tool.config.as_ref(), args.overrides())?;
    let plan = settings.check_plan()?;

    let pipeline = CheckPipeline::new(build_acquirer(&settings)?, Runner::new());
    let result = pipeline.check(&plan, &mut TracingSink).await?;

    if args.json {
        let summary = serde_json::json!({
            "outcome": result.outcome(),
            "exit_code": result.exit_code,
            "duration_ms": result.duration.as_millis() as u64,
            "stdout": result.stdout_lines,
            "stderr": result.stderr_lines,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    match result.outcome() {
        Outcome::Passed => {
            info!("PHP CodeSniffer checks passed");
            Ok(ExitCode::SUCCESS)
        }
        Outcome::ViolationsFound => {
            error!("Fix the above errors.");
            Ok(ExitCode::from(EXIT_VIOLATIONS))
        }
    }
}
