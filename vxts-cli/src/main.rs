//! vxts CLI: plot and check commands.
//!
//! Commands:
//! - `plot`: render every time-series plot described by a TOML config
//! - `check`: validate a config and print the resolved run plan

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use vxts_runner::{run_plan, PlotConfig, RunPlan, RunSummary};

#[derive(Parser)]
#[command(
    name = "vxts",
    about = "vxts: verification-metric time-series plots from MET statistics"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every plot described by a config file.
    Plot {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Override the configured output directory.
        #[arg(long)]
        save_dir: Option<PathBuf>,

        /// Override the configured log level (DEBUG, INFO, WARNING, ERROR).
        #[arg(long)]
        log_level: Option<String>,
    },
    /// Validate a config file and print the resolved run plan.
    Check {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Plot {
            config,
            save_dir,
            log_level,
        } => run_plot_cmd(&config, save_dir, log_level),
        Commands::Check { config } => run_check_cmd(&config),
    }
}

/// Map a configured level name onto a tracing filter directive.
fn filter_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}

/// Install stderr and log-file layers. The returned guard flushes the file
/// writer on drop and must live until the end of the run.
fn init_logging(log_file: &Path, level: &str) -> Result<WorkerGuard> {
    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let file_name = log_file
        .file_name()
        .context("log_file has no file name")?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let directive = filter_directive(level);
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)));
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::new(directive));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(guard)
}

fn run_plot_cmd(config_path: &Path, save_dir: Option<PathBuf>, log_level: Option<String>) -> Result<()> {
    let mut config = PlotConfig::from_file(config_path)?;
    if let Some(dir) = save_dir {
        config.run.save_dir = dir;
    }
    if let Some(level) = log_level {
        config.run.log_level = level;
    }

    let _guard = init_logging(&config.run.log_file, &config.run.log_level)?;
    let log_info = format!("Log file: {}", config.run.log_file.display());
    println!("{log_info}");
    info!("{log_info}");

    let plan = RunPlan::resolve(&config)?;
    let summary = run_plan(&plan, &config)?;
    print_summary(&summary);
    Ok(())
}

fn run_check_cmd(config_path: &Path) -> Result<()> {
    let config = PlotConfig::from_file(config_path)?;
    let plan = RunPlan::resolve(&config)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&plan).context("failed to serialize run plan")?
    );
    println!("Config OK: {} plots planned", plan.plot_count());
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("=== Run Summary ===");
    println!("Plots attempted: {}", summary.plots_attempted);
    println!("Plots saved:     {}", summary.plots_saved);
    println!("Plots skipped:   {}", summary.plots_skipped);
    for path in &summary.saved {
        println!("  {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_map_to_directives() {
        assert_eq!(filter_directive("DEBUG"), "debug");
        assert_eq!(filter_directive("warning"), "warn");
        assert_eq!(filter_directive("CRITICAL"), "error");
        assert_eq!(filter_directive("INFO"), "info");
        assert_eq!(filter_directive("bogus"), "info");
    }

    #[test]
    fn cli_parses_plot_overrides() {
        let cli = Cli::try_parse_from([
            "vxts",
            "plot",
            "--config",
            "run.toml",
            "--save-dir",
            "/tmp/out",
            "--log-level",
            "DEBUG",
        ])
        .unwrap();
        match cli.command {
            Commands::Plot {
                config,
                save_dir,
                log_level,
            } => {
                assert_eq!(config, PathBuf::from("run.toml"));
                assert_eq!(save_dir, Some(PathBuf::from("/tmp/out")));
                assert_eq!(log_level.as_deref(), Some("DEBUG"));
            }
            Commands::Check { .. } => panic!("expected plot"),
        }
    }
}
