//! Break-down attribution of a single prediction.
//!
//! Starting from the mean prediction over a background sample (the intercept),
//! predictors are fixed to the explained row's values one at a time; each
//! step's contribution is the change in the background mean prediction. After
//! the last predictor the background rows equal the explained row, so the
//! running sum ends at the row's own prediction.

use crate::error::MlError;
use crate::labels::{DisplayAliases, format_contribution};
use crate::sampling::RowSampler;
use crate::scoring::ScoringAdapter;
use glassbox_core::{EvalRow, EvalTable, Value};
use serde::{Deserialize, Serialize};

pub const INTERCEPT: &str = "intercept";
pub const PREDICTION: &str = "prediction";
pub const OTHER_FACTORS: &str = "all other factors";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sign {
    Positive,
    Negative,
    Neutral,
}

impl Sign {
    fn of(contribution: f64) -> Self {
        if contribution > 0.0 {
            Sign::Positive
        } else if contribution < 0.0 {
            Sign::Negative
        } else {
            Sign::Neutral
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionStep {
    pub variable_name: String,
    /// The explained row's value; `None` for intercept, prediction and merged steps.
    pub variable_value: Option<Value>,
    pub contribution: f64,
    pub cumulative_sum: f64,
    pub position_index: usize,
    pub sign: Sign,
}

impl ContributionStep {
    pub fn is_total(&self) -> bool {
        self.variable_name == INTERCEPT || self.variable_name == PREDICTION
    }
}

#[derive(Debug, Clone, Default)]
pub struct BreakdownParams {
    pub background_size: usize,
    pub seed: Option<u64>,
    /// Fixed order; unlisted predictors follow in declaration order.
    pub order: Option<Vec<String>>,
    pub max_features: Option<usize>,
}

impl BreakdownParams {
    pub fn new(background_size: usize) -> Self {
        Self {
            background_size,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breakdown {
    pub steps: Vec<ContributionStep>,
    pub intercept: f64,
    pub prediction: f64,
    /// Predictors in the order they were added.
    pub order: Vec<String>,
    pub background_size: usize,
    pub seed: u64,
}

/// A step ready for the waterfall chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayStep {
    pub label: String,
    pub variable_name: String,
    pub display_value: String,
    pub contribution: f64,
    pub contribution_label: String,
    pub start: f64,
    pub cumulative_sum: f64,
    pub position_index: usize,
    pub sign: Sign,
}

impl Breakdown {
    /// Post-process steps for display: bar start, signed labels, aliases.
    ///
    /// A step starts at the previous step's cumulative sum; the first step has
    /// no predecessor and starts at its own contribution.
    pub fn display_steps(&self, aliases: &DisplayAliases) -> Vec<DisplayStep> {
        let mut out = Vec::with_capacity(self.steps.len());
        for (i, step) in self.steps.iter().enumerate() {
            let start = if i == 0 {
                step.contribution
            } else {
                self.steps[i - 1].cumulative_sum
            };
            let display_value = step
                .variable_value
                .as_ref()
                .map(|v| aliases.display(v))
                .unwrap_or_default();
            let label = if step.variable_value.is_some() {
                format!("{} = {}", step.variable_name, display_value)
            } else {
                step.variable_name.clone()
            };
            out.push(DisplayStep {
                label,
                variable_name: step.variable_name.clone(),
                display_value,
                contribution: step.contribution,
                contribution_label: format_contribution(step.contribution, !step.is_total()),
                start,
                cumulative_sum: step.cumulative_sum,
                position_index: step.position_index,
                sign: step.sign,
            });
        }
        out
    }
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Explain the table row at `row_index`.
pub fn break_down_row(
    adapter: &ScoringAdapter,
    table: &EvalTable,
    row_index: usize,
    params: &BreakdownParams,
) -> Result<Breakdown, MlError> {
    let row = table.row(row_index)?;
    break_down(adapter, table, row, params)
}

/// Decompose the prediction for `row` into an intercept plus one additive
/// contribution per declared predictor.
pub fn break_down(
    adapter: &ScoringAdapter,
    table: &EvalTable,
    row: &EvalRow,
    params: &BreakdownParams,
) -> Result<Breakdown, MlError> {
    if table.is_empty() {
        return Err(MlError::invalid_input("evaluation table is empty"));
    }
    if params.background_size == 0 {
        return Err(MlError::invalid_input(
            "background size must be greater than zero",
        ));
    }
    let predictors = table.predictor_names();
    let row = row.restrict(&predictors)?;

    let mut sampler = RowSampler::new(params.seed);
    let indices = sampler.sample_indices(table.len(), params.background_size);
    let background = table.subset(&indices);

    let intercept = mean(&adapter.score(&background)?);
    let prediction = adapter.score_one(&row)?;

    let order = match &params.order {
        Some(order) => resolve_order(order, &predictors)?,
        None => impact_order(adapter, &background, &row, &predictors, intercept)?,
    };
    tracing::info!(
        background_rows = background.len(),
        seed = sampler.seed(),
        intercept,
        prediction,
        "Computing break-down"
    );

    let mut variables: Vec<(String, Option<Value>, f64)> = Vec::with_capacity(order.len());
    let mut current = background;
    for (k, name) in order.iter().enumerate() {
        let value = row.get(name)?.clone();
        current = current
            .iter()
            .map(|r| r.with_value(name, value.clone()))
            .collect();
        let cumulative = if k + 1 == order.len() {
            prediction
        } else {
            mean(&adapter.score(&current)?)
        };
        tracing::debug!(variable = %name, cumulative, "Break-down step");
        variables.push((name.clone(), Some(value), cumulative));
    }

    if let Some(k) = params.max_features {
        if k < variables.len() {
            let rest = variables.split_off(k);
            if let Some((_, _, cumulative)) = rest.last() {
                variables.push((OTHER_FACTORS.to_string(), None, *cumulative));
            }
        }
    }

    let mut steps = Vec::with_capacity(variables.len() + 2);
    steps.push(ContributionStep {
        variable_name: INTERCEPT.to_string(),
        variable_value: None,
        contribution: intercept,
        cumulative_sum: intercept,
        position_index: 1,
        sign: Sign::Neutral,
    });
    let mut previous = intercept;
    for (name, value, cumulative) in variables {
        let contribution = cumulative - previous;
        steps.push(ContributionStep {
            variable_name: name,
            variable_value: value,
            contribution,
            cumulative_sum: cumulative,
            position_index: steps.len() + 1,
            sign: Sign::of(contribution),
        });
        previous = cumulative;
    }
    steps.push(ContributionStep {
        variable_name: PREDICTION.to_string(),
        variable_value: None,
        contribution: prediction,
        cumulative_sum: prediction,
        position_index: steps.len() + 1,
        sign: Sign::Neutral,
    });

    Ok(Breakdown {
        steps,
        intercept,
        prediction,
        order,
        background_size: indices.len(),
        seed: sampler.seed(),
    })
}

fn resolve_order(order: &[String], predictors: &[String]) -> Result<Vec<String>, MlError> {
    let mut resolved: Vec<String> = Vec::with_capacity(predictors.len());
    for name in order {
        if !predictors.contains(name) {
            return Err(MlError::missing_column(name.as_str()));
        }
        if resolved.contains(name) {
            return Err(MlError::invalid_input(format!(
                "'{}' appears twice in the break-down order",
                name
            )));
        }
        resolved.push(name.clone());
    }
    for name in predictors {
        if !resolved.contains(name) {
            resolved.push(name.clone());
        }
    }
    Ok(resolved)
}

/// Order predictors by the absolute change in mean prediction when each is
/// fixed alone, largest first; ties keep declaration order.
fn impact_order(
    adapter: &ScoringAdapter,
    background: &[EvalRow],
    row: &EvalRow,
    predictors: &[String],
    intercept: f64,
) -> Result<Vec<String>, MlError> {
    let mut impacts = Vec::with_capacity(predictors.len());
    for name in predictors {
        let value = row.get(name)?;
        let preds = adapter.score_iter(
            background
                .iter()
                .map(|r| r.with_value(name, value.clone())),
        )?;
        impacts.push((name.clone(), (mean(&preds) - intercept).abs()));
    }
    impacts.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    Ok(impacts.into_iter().map(|(name, _)| name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FnModel;
    use glassbox_core::{GridSpec, PredictorSpec};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn fixture() -> (ScoringAdapter, EvalTable) {
        let rows = vec![
            EvalRow::from_pairs(
                [
                    ("vehicle_age", Value::Numeric(2.0)),
                    ("sex", Value::from("Masculino")),
                ],
                10.0,
            ),
            EvalRow::from_pairs(
                [
                    ("vehicle_age", Value::Numeric(8.0)),
                    ("sex", Value::from("Feminino")),
                ],
                20.0,
            ),
        ];
        let table = EvalTable::new(
            vec![
                PredictorSpec::numeric("vehicle_age", GridSpec::default()),
                PredictorSpec::categorical("sex", vec![]),
            ],
            rows,
        )
        .unwrap();
        // additive model: 100 + 5 * age + 30 for men
        let model = FnModel::new(
            "additive",
            vec!["vehicle_age".into(), "sex".into()],
            |row: &EvalRow| {
                let male = row.get("sex")?.as_str() == Some("Masculino");
                Ok(100.0 + 5.0 * row.numeric("vehicle_age")? + if male { 30.0 } else { 0.0 })
            },
        );
        (ScoringAdapter::new(Arc::new(model), 8).unwrap(), table)
    }

    #[test]
    fn test_additive_model_exact_contributions() {
        let (adapter, table) = fixture();
        let bd = break_down_row(&adapter, &table, 0, &BreakdownParams::new(100)).unwrap();
        // intercept: mean(140, 140) ; prediction: 100 + 10 + 30
        assert_eq!(bd.intercept, 140.0);
        assert_eq!(bd.prediction, 140.0);
        // sex moves the mean by +15, age by -15: equal impact, declaration order wins
        assert_eq!(bd.order, vec!["vehicle_age".to_string(), "sex".to_string()]);
        let names: Vec<&str> = bd.steps.iter().map(|s| s.variable_name.as_str()).collect();
        assert_eq!(names, vec![INTERCEPT, "vehicle_age", "sex", PREDICTION]);
        assert_eq!(bd.steps[1].contribution, -15.0);
        assert_eq!(bd.steps[1].sign, Sign::Negative);
        assert_eq!(bd.steps[2].contribution, 15.0);
        assert_eq!(bd.steps[2].sign, Sign::Positive);
    }

    #[test]
    fn test_cumulative_invariant_and_final_sum() {
        let (adapter, table) = fixture();
        let bd = break_down_row(&adapter, &table, 1, &BreakdownParams::new(100)).unwrap();
        let last_variable = bd.steps.len() - 2;
        for i in 1..=last_variable {
            let expected = bd.steps[i - 1].cumulative_sum + bd.steps[i].contribution;
            assert!((bd.steps[i].cumulative_sum - expected).abs() < 1e-9);
        }
        let direct = adapter.score_one(table.row(1).unwrap()).unwrap();
        assert_eq!(bd.steps.last().unwrap().cumulative_sum, direct);
        assert_eq!(bd.steps[last_variable].cumulative_sum, direct);
    }

    #[test]
    fn test_explicit_order_is_respected() {
        let (adapter, table) = fixture();
        let params = BreakdownParams {
            order: Some(vec!["sex".into()]),
            ..BreakdownParams::new(100)
        };
        let bd = break_down_row(&adapter, &table, 0, &params).unwrap();
        assert_eq!(bd.order, vec!["sex".to_string(), "vehicle_age".to_string()]);
    }

    #[test]
    fn test_duplicate_order_rejected() {
        let (adapter, table) = fixture();
        let params = BreakdownParams {
            order: Some(vec!["sex".into(), "sex".into()]),
            ..BreakdownParams::new(100)
        };
        assert!(break_down_row(&adapter, &table, 0, &params).is_err());
    }

    #[test]
    fn test_max_features_merges_tail() {
        let (adapter, table) = fixture();
        let params = BreakdownParams {
            max_features: Some(1),
            ..BreakdownParams::new(100)
        };
        let bd = break_down_row(&adapter, &table, 0, &params).unwrap();
        assert_eq!(bd.steps.len(), 4);
        assert_eq!(bd.steps[2].variable_name, OTHER_FACTORS);
        assert_eq!(bd.steps[2].variable_value, None);
        assert_eq!(bd.steps[2].cumulative_sum, bd.prediction);
    }

    #[test]
    fn test_row_index_out_of_range() {
        let (adapter, table) = fixture();
        assert!(matches!(
            break_down_row(&adapter, &table, 5, &BreakdownParams::new(10)),
            Err(MlError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_display_steps() {
        let (adapter, table) = fixture();
        let bd = break_down_row(&adapter, &table, 0, &BreakdownParams::new(100)).unwrap();
        let steps = bd.display_steps(&DisplayAliases::reference());
        assert_eq!(steps[0].start, steps[0].contribution);
        assert_eq!(steps[0].contribution_label, "140.00");
        assert_eq!(steps[1].label, "vehicle_age = 2");
        assert_eq!(steps[1].contribution_label, "-15.00");
        assert_eq!(steps[1].start, 140.0);
        assert_eq!(steps[2].label, "sex = Male");
        assert_eq!(steps[2].contribution_label, "+15.00");
        assert_eq!(steps[2].start, 125.0);
        assert_eq!(steps[3].label, PREDICTION);
        assert_eq!(steps[3].contribution_label, "140.00");
    }
}
