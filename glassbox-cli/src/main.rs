//! Glassbox CLI: render explanation charts for a fitted model.
//!
//! Runs partial dependence, permutation importance and break-down pipelines
//! against an evaluation dataset and writes one SVG per pipeline plus a JSON
//! report.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Glassbox: model explanation reports
#[derive(Parser, Debug)]
#[command(name = "glassbox", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (reads .glassbox/config.toml)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Settings that override the loaded configuration for one invocation.
#[derive(clap::Args, Debug, Clone, Default)]
struct RunOverrides {
    /// Seed for every sampling step
    #[arg(long)]
    seed: Option<u64>,

    /// Output directory for charts and the report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum rows per model call
    #[arg(long)]
    batch_size: Option<usize>,

    /// Re-download remote artifacts even when cached
    #[arg(long)]
    refresh: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run all three pipelines
    Run {
        /// Row to explain in the break-down chart
        #[arg(long)]
        row: Option<usize>,

        #[command(flatten)]
        overrides: RunOverrides,
    },
    /// Partial dependence chart only
    Pdp {
        /// Predictor to sweep
        #[arg(long)]
        predictor: Option<String>,

        #[command(flatten)]
        overrides: RunOverrides,
    },
    /// Permutation importance chart only
    Importance {
        #[command(flatten)]
        overrides: RunOverrides,
    },
    /// Break-down chart only
    Breakdown {
        /// Row to explain
        #[arg(long)]
        row: Option<usize>,

        #[command(flatten)]
        overrides: RunOverrides,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default .glassbox/config.toml into the workspace
    Init,
    /// Show the merged configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "glassbox", "glassbox")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "glassbox.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    // Resolve workspace
    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref(), cli.quiet).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "glassbox",
            "-vv",
            "run",
            "--row",
            "3",
            "--seed",
            "7",
            "--batch-size",
            "500",
            "-o",
            "out",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run { row, overrides } => {
                assert_eq!(row, Some(3));
                assert_eq!(overrides.seed, Some(7));
                assert_eq!(overrides.batch_size, Some(500));
                assert_eq!(overrides.output, Some(PathBuf::from("out")));
                assert!(!overrides.refresh);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_show() {
        let cli = Cli::parse_from(["glassbox", "--config", "custom.toml", "config", "show"]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
    }
}
