//! Runs the explanation pipelines from a configuration and writes the charts
//! plus a JSON summary of everything computed.

use crate::breakdown::{Breakdown, BreakdownParams, DisplayStep, break_down_row};
use crate::error::MlError;
use crate::importance::{FeatureImportance, ImportanceParams, permutation_importance};
use crate::labels::DisplayAliases;
use crate::model::Model;
use crate::pdp::{PartialDependence, PartialDependenceParams, partial_dependence};
use crate::render::{
    ChartRenderer, ChartSize, importance_chart, partial_dependence_chart, waterfall_chart,
};
use crate::scoring::ScoringAdapter;
use chrono::{DateTime, Utc};
use glassbox_core::{EvalTable, GlassboxConfig, ImportanceKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    PartialDependence,
    Importance,
    Breakdown,
}

impl Pipeline {
    pub const ALL: [Pipeline; 3] = [
        Pipeline::PartialDependence,
        Pipeline::Importance,
        Pipeline::Breakdown,
    ];
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pipeline::PartialDependence => write!(f, "partial_dependence"),
            Pipeline::Importance => write!(f, "importance"),
            Pipeline::Breakdown => write!(f, "breakdown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineFailure {
    pub pipeline: Pipeline,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceSection {
    pub kind: ImportanceKind,
    #[serde(flatten)]
    pub result: FeatureImportance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownSection {
    pub row_index: usize,
    #[serde(flatten)]
    pub result: Breakdown,
    pub display: Vec<DisplayStep>,
}

/// Contents of `report.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub model: String,
    pub rows: usize,
    pub batch_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_dependence: Option<PartialDependence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<ImportanceSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<BreakdownSection>,
    /// Files written by this run, report excluded.
    pub artifacts: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<PipelineFailure>,
}

impl ReportSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs pipelines against one model and table with settings from a
/// [`GlassboxConfig`].
pub struct ReportRunner {
    config: GlassboxConfig,
    table: EvalTable,
    adapter: ScoringAdapter,
    renderer: ChartRenderer,
    aliases: DisplayAliases,
}

impl ReportRunner {
    pub fn new(
        config: GlassboxConfig,
        model: Arc<dyn Model>,
        table: EvalTable,
    ) -> Result<Self, MlError> {
        config.validate()?;
        let adapter = ScoringAdapter::new(model, config.scoring.batch_size)?;
        let aliases = DisplayAliases::new(config.breakdown.aliases.clone());
        Ok(Self {
            config,
            table,
            adapter,
            renderer: ChartRenderer::new()?,
            aliases,
        })
    }

    pub fn adapter(&self) -> &ScoringAdapter {
        &self.adapter
    }

    pub fn table(&self) -> &EvalTable {
        &self.table
    }

    fn chart_size(&self) -> ChartSize {
        ChartSize {
            width: self.config.output.width,
            height: self.config.output.height,
        }
    }

    fn output_path(&self, file: &str) -> PathBuf {
        self.config.output.dir.join(file)
    }

    pub fn run_partial_dependence(&self) -> Result<(PartialDependence, PathBuf), MlError> {
        let cfg = &self.config.partial_dependence;
        let params = PartialDependenceParams {
            predictor: cfg.predictor.clone(),
            grid: self.config.partial_dependence_grid(),
            sample_size: cfg.sample_size,
            seed: cfg.seed,
            histogram_bins: cfg.histogram_bins,
            keep_individual: cfg.keep_individual,
        };
        let pd = partial_dependence(&self.adapter, &self.table, &params)?;
        let path = self.output_path(&self.config.output.partial_dependence_file);
        self.renderer
            .write(&partial_dependence_chart(&pd, self.chart_size()), &path)?;
        Ok((pd, path))
    }

    pub fn run_importance(&self) -> Result<(ImportanceSection, PathBuf), MlError> {
        let cfg = &self.config.importance;
        let params = ImportanceParams {
            predictors: self.config.importance_predictors(),
            repetitions: cfg.repetitions,
            sample_size: cfg.sample_size,
            seed: cfg.seed,
            loss: cfg.loss,
        };
        let fi = permutation_importance(&self.adapter, &self.table, &params)?;
        let chart = importance_chart(&fi, cfg.kind, self.chart_size())?;
        let path = self.output_path(&self.config.output.importance_file);
        self.renderer.write(&chart, &path)?;
        Ok((
            ImportanceSection {
                kind: cfg.kind,
                result: fi,
            },
            path,
        ))
    }

    /// Explain `row_index`, or the configured row when `None`.
    pub fn run_breakdown(
        &self,
        row_index: Option<usize>,
    ) -> Result<(BreakdownSection, PathBuf), MlError> {
        let cfg = &self.config.breakdown;
        let row_index = row_index.unwrap_or(cfg.row_index);
        let params = BreakdownParams {
            background_size: cfg.background_size,
            seed: cfg.seed,
            order: cfg.order.clone(),
            max_features: cfg.max_features,
        };
        let bd = break_down_row(&self.adapter, &self.table, row_index, &params)?;
        let display = bd.display_steps(&self.aliases);
        let path = self.output_path(&self.config.output.breakdown_file);
        self.renderer
            .write(&waterfall_chart(&display, self.chart_size()), &path)?;
        Ok((
            BreakdownSection {
                row_index,
                result: bd,
                display,
            },
            path,
        ))
    }

    /// Run `pipelines` in order and write `report.json`.
    ///
    /// A failing pipeline is logged and recorded in the summary; the others
    /// still run. Only failing to write the report itself is an `Err`.
    pub fn run(
        &self,
        pipelines: &[Pipeline],
        row_index: Option<usize>,
    ) -> Result<ReportSummary, MlError> {
        let mut summary = ReportSummary {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            model: self.adapter.model_name().to_string(),
            rows: self.table.len(),
            batch_size: self.adapter.batch_size(),
            partial_dependence: None,
            importance: None,
            breakdown: None,
            artifacts: Vec::new(),
            failures: Vec::new(),
        };
        tracing::info!(run_id = %summary.run_id, model = %summary.model, rows = summary.rows, "Starting report");

        for &pipeline in pipelines {
            let outcome = match pipeline {
                Pipeline::PartialDependence => self.run_partial_dependence().map(|(pd, path)| {
                    summary.partial_dependence = Some(pd);
                    path
                }),
                Pipeline::Importance => self.run_importance().map(|(fi, path)| {
                    summary.importance = Some(fi);
                    path
                }),
                Pipeline::Breakdown => self.run_breakdown(row_index).map(|(bd, path)| {
                    summary.breakdown = Some(bd);
                    path
                }),
            };
            match outcome {
                Ok(path) => summary.artifacts.push(path),
                Err(e) => {
                    tracing::error!(%pipeline, error = %e, "Pipeline failed");
                    summary.failures.push(PipelineFailure {
                        pipeline,
                        error: e.to_string(),
                    });
                }
            }
        }

        let path = self.output_path(&self.config.output.report_file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
        tracing::info!(
            path = %path.display(),
            artifacts = summary.artifacts.len(),
            failures = summary.failures.len(),
            "Report written"
        );
        Ok(summary)
    }

    pub fn run_all(&self, row_index: Option<usize>) -> Result<ReportSummary, MlError> {
        self.run(&Pipeline::ALL, row_index)
    }
}
