//! Subcommand handlers.

use crate::{Commands, ConfigAction, RunOverrides};
use glassbox_core::{GlassboxConfig, load_config};
use glassbox_ml::{Pipeline, ReportRunner, ReportSummary, load_inputs};
use std::path::Path;
use std::sync::Arc;

pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_path: Option<&Path>,
    quiet: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, config_path),
        Commands::Run { row, overrides } => {
            run_pipelines(&Pipeline::ALL, row, None, &overrides, workspace, config_path, quiet)
                .await
        }
        Commands::Pdp {
            predictor,
            overrides,
        } => {
            run_pipelines(
                &[Pipeline::PartialDependence],
                None,
                predictor,
                &overrides,
                workspace,
                config_path,
                quiet,
            )
            .await
        }
        Commands::Importance { overrides } => {
            run_pipelines(
                &[Pipeline::Importance],
                None,
                None,
                &overrides,
                workspace,
                config_path,
                quiet,
            )
            .await
        }
        Commands::Breakdown { row, overrides } => {
            run_pipelines(
                &[Pipeline::Breakdown],
                row,
                None,
                &overrides,
                workspace,
                config_path,
                quiet,
            )
            .await
        }
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".glassbox");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&GlassboxConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!("Created configuration file: {}", config_path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), config_path)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

impl RunOverrides {
    fn apply(&self, config: &mut GlassboxConfig) {
        if let Some(seed) = self.seed {
            config.partial_dependence.seed = Some(seed);
            config.importance.seed = Some(seed);
            config.breakdown.seed = Some(seed);
        }
        if let Some(dir) = &self.output {
            config.output.dir = dir.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.scoring.batch_size = batch_size;
        }
        if self.refresh {
            config.cache.refresh = true;
        }
    }
}

async fn run_pipelines(
    pipelines: &[Pipeline],
    row: Option<usize>,
    predictor: Option<String>,
    overrides: &RunOverrides,
    workspace: &Path,
    config_path: Option<&Path>,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut config = load_config(Some(workspace), config_path)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    overrides.apply(&mut config);
    if let Some(predictor) = predictor {
        config.partial_dependence.predictor = predictor;
    }
    if config.output.dir.is_relative() {
        config.output.dir = workspace.join(&config.output.dir);
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    tracing::info!(
        workspace = %workspace.display(),
        pipelines = pipelines.len(),
        output = %config.output.dir.display(),
        "Running pipelines"
    );
    let (table, model) = load_inputs(&config).await?;
    let runner = ReportRunner::new(config, Arc::new(model), table)?;
    let pipelines = pipelines.to_vec();
    let summary = tokio::task::spawn_blocking(move || runner.run(&pipelines, row)).await??;

    if !quiet {
        print_summary(&summary);
    }
    if !summary.is_success() {
        anyhow::bail!(
            "{} of {} pipeline(s) failed",
            summary.failures.len(),
            summary.failures.len() + summary.artifacts.len()
        );
    }
    Ok(())
}

fn print_summary(summary: &ReportSummary) {
    for path in &summary.artifacts {
        println!("  wrote {}", path.display());
    }
    for failure in &summary.failures {
        println!("  {} failed: {}", failure.pipeline, failure.error);
    }
}
