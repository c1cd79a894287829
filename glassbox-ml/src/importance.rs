//! Permutation feature importance.
//!
//! Each repetition draws a row subset, scores it unpermuted (`_full_model_`),
//! against a constant weighted-mean predictor (`_baseline_`), and once per
//! predictor with that predictor's column shuffled. Dropout losses are then
//! averaged per variable across repetitions.

use crate::error::MlError;
use crate::loss::{loss_fn, weighted_mean};
use crate::sampling::RowSampler;
use crate::scoring::ScoringAdapter;
use glassbox_core::{EvalTable, ImportanceKind, LossKind, Value};
use serde::{Deserialize, Serialize};

pub const FULL_MODEL: &str = "_full_model_";
pub const BASELINE: &str = "_baseline_";

#[derive(Debug, Clone)]
pub struct ImportanceParams {
    pub predictors: Vec<String>,
    pub repetitions: usize,
    pub sample_size: usize,
    pub seed: Option<u64>,
    pub loss: LossKind,
}

impl ImportanceParams {
    pub fn new(predictors: Vec<String>) -> Self {
        Self {
            predictors,
            repetitions: 10,
            sample_size: 1_000,
            seed: None,
            loss: LossKind::Rmse,
        }
    }
}

/// Loss of one variable in one repetition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceRecord {
    pub variable: String,
    pub repetition: usize,
    pub dropout_loss: f64,
}

/// Dropout loss of one predictor averaged over repetitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceSummary {
    pub variable: String,
    pub mean_dropout_loss: f64,
    pub min_dropout_loss: f64,
    pub max_dropout_loss: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub records: Vec<ImportanceRecord>,
    /// Predictors sorted ascending by mean dropout loss; sentinels excluded.
    pub summary: Vec<ImportanceSummary>,
    pub full_model_loss: f64,
    pub baseline_loss: f64,
    pub loss: LossKind,
    pub repetitions: usize,
    pub sample_size: usize,
    pub seed: u64,
}

impl FeatureImportance {
    /// Mean dropout loss of a predictor or sentinel.
    pub fn mean_loss(&self, variable: &str) -> Option<f64> {
        mean_of(&self.records, variable)
    }

    /// Value shown on the chart where the bars start.
    pub fn reference_value(&self, kind: ImportanceKind) -> f64 {
        match kind {
            ImportanceKind::Raw => self.full_model_loss,
            ImportanceKind::Difference => 0.0,
            ImportanceKind::Ratio => 1.0,
        }
    }

    /// Ranked `(variable, value)` pairs expressed as `kind`.
    pub fn display_values(&self, kind: ImportanceKind) -> Result<Vec<(String, f64)>, MlError> {
        if kind == ImportanceKind::Ratio && self.full_model_loss == 0.0 {
            return Err(MlError::invalid_input(
                "ratio importance is undefined when the full model loss is zero",
            ));
        }
        Ok(self
            .summary
            .iter()
            .map(|s| {
                let value = match kind {
                    ImportanceKind::Raw => s.mean_dropout_loss,
                    ImportanceKind::Difference => s.mean_dropout_loss - self.full_model_loss,
                    ImportanceKind::Ratio => s.mean_dropout_loss / self.full_model_loss,
                };
                (s.variable.clone(), value)
            })
            .collect())
    }
}

/// Compute permutation importance for `params.predictors`.
pub fn permutation_importance(
    adapter: &ScoringAdapter,
    table: &EvalTable,
    params: &ImportanceParams,
) -> Result<FeatureImportance, MlError> {
    if table.is_empty() {
        return Err(MlError::invalid_input("evaluation table is empty"));
    }
    if params.predictors.is_empty() {
        return Err(MlError::invalid_input("no predictors to permute"));
    }
    if params.repetitions == 0 || params.sample_size == 0 {
        return Err(MlError::invalid_input(
            "repetitions and sample size must be greater than zero",
        ));
    }
    for name in &params.predictors {
        table.predictor(name)?;
    }

    let loss = loss_fn(params.loss);
    let mut sampler = RowSampler::new(params.seed);
    let mut records = Vec::with_capacity(params.repetitions * (params.predictors.len() + 2));
    let mut drawn = 0;

    tracing::info!(
        predictors = params.predictors.len(),
        repetitions = params.repetitions,
        sample_size = params.sample_size,
        seed = sampler.seed(),
        "Computing permutation importance"
    );

    for repetition in 0..params.repetitions {
        let indices = sampler.sample_indices(table.len(), params.sample_size);
        let rows = table.subset(&indices);
        drawn = rows.len();
        let observed: Vec<f64> = rows.iter().map(|r| r.observed_outcome).collect();
        let weights: Vec<f64> = rows.iter().map(|r| r.exposure_weight).collect();

        let predicted = adapter.score(&rows)?;
        records.push(ImportanceRecord {
            variable: FULL_MODEL.to_string(),
            repetition,
            dropout_loss: loss(&observed, &predicted, &weights)?,
        });

        for name in &params.predictors {
            let mut column: Vec<Value> = rows
                .iter()
                .map(|r| r.get(name).cloned())
                .collect::<Result<_, _>>()?;
            sampler.shuffle(&mut column);
            let permuted = rows
                .iter()
                .zip(column)
                .map(|(row, value)| row.with_value(name, value));
            let predicted = adapter.score_iter(permuted)?;
            let dropout_loss = loss(&observed, &predicted, &weights)?;
            tracing::debug!(variable = %name, repetition, dropout_loss, "Permuted predictor");
            records.push(ImportanceRecord {
                variable: name.clone(),
                repetition,
                dropout_loss,
            });
        }

        let mean = weighted_mean(&observed, &weights)?;
        let constant = vec![mean; observed.len()];
        records.push(ImportanceRecord {
            variable: BASELINE.to_string(),
            repetition,
            dropout_loss: loss(&observed, &constant, &weights)?,
        });
    }

    let summary = summarize(&records, &params.predictors);
    let full_model_loss = mean_of(&records, FULL_MODEL).unwrap_or(0.0);
    let baseline_loss = mean_of(&records, BASELINE).unwrap_or(0.0);
    tracing::info!(full_model_loss, baseline_loss, "Permutation importance done");

    Ok(FeatureImportance {
        records,
        summary,
        full_model_loss,
        baseline_loss,
        loss: params.loss,
        repetitions: params.repetitions,
        sample_size: drawn,
        seed: sampler.seed(),
    })
}

fn mean_of(records: &[ImportanceRecord], variable: &str) -> Option<f64> {
    let losses: Vec<f64> = records
        .iter()
        .filter(|r| r.variable == variable)
        .map(|r| r.dropout_loss)
        .collect();
    if losses.is_empty() {
        return None;
    }
    Some(losses.iter().sum::<f64>() / losses.len() as f64)
}

/// Aggregate records per predictor and sort ascending by mean dropout loss.
/// Ties keep the input order of `predictors`.
pub fn summarize(records: &[ImportanceRecord], predictors: &[String]) -> Vec<ImportanceSummary> {
    let mut summary: Vec<ImportanceSummary> = predictors
        .iter()
        .filter_map(|name| {
            let losses: Vec<f64> = records
                .iter()
                .filter(|r| &r.variable == name)
                .map(|r| r.dropout_loss)
                .collect();
            if losses.is_empty() {
                return None;
            }
            Some(ImportanceSummary {
                variable: name.clone(),
                mean_dropout_loss: losses.iter().sum::<f64>() / losses.len() as f64,
                min_dropout_loss: losses.iter().copied().fold(f64::INFINITY, f64::min),
                max_dropout_loss: losses.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            })
        })
        .collect();
    summary.sort_by(|a, b| {
        a.mean_dropout_loss
            .partial_cmp(&b.mean_dropout_loss)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    summary
}
