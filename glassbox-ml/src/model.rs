//! Scoring models.
//!
//! The pipelines only need `predict(rows)`; [`GlmModel`] is the artifact format
//! loaded from disk, [`FnModel`] wraps a closure for embedding and tests.

use crate::error::MlError;
use glassbox_core::{EvalRow, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A fitted model that maps rows to numeric predictions.
pub trait Model: Send + Sync {
    fn name(&self) -> &str;

    /// Columns every scored row must carry.
    fn required_columns(&self) -> Vec<String>;

    /// Score rows, returning one prediction per row in input order.
    fn predict(&self, rows: &[EvalRow]) -> Result<Vec<f64>, MlError>;
}

/// Link function of a generalized linear model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    #[default]
    Identity,
    Log,
}

impl Link {
    fn inverse(self, eta: f64) -> f64 {
        match self {
            Link::Identity => eta,
            Link::Log => eta.exp(),
        }
    }
}

/// A piecewise-linear hinge `coefficient * max(0, x - knot)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hinge {
    pub knot: f64,
    pub coefficient: f64,
}

/// One additive term of the linear predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Term {
    Numeric {
        column: String,
        coefficient: f64,
        #[serde(default)]
        hinges: Vec<Hinge>,
    },
    Categorical {
        column: String,
        levels: BTreeMap<String, f64>,
        /// Effect of levels not seen during fitting (the reference level).
        #[serde(default)]
        default_effect: f64,
    },
}

impl Term {
    pub fn column(&self) -> &str {
        match self {
            Term::Numeric { column, .. } | Term::Categorical { column, .. } => column,
        }
    }

    fn effect(&self, row: &EvalRow) -> Result<f64, MlError> {
        let value = row
            .get(self.column())
            .map_err(|_| MlError::missing_column(self.column()))?;
        match (self, value) {
            (
                Term::Numeric {
                    coefficient,
                    hinges,
                    ..
                },
                Value::Numeric(x),
            ) => {
                let hinge_sum: f64 = hinges
                    .iter()
                    .map(|h| h.coefficient * (x - h.knot).max(0.0))
                    .sum();
                Ok(coefficient * x + hinge_sum)
            }
            (
                Term::Categorical {
                    levels,
                    default_effect,
                    ..
                },
                Value::Categorical(level),
            ) => Ok(levels.get(level).copied().unwrap_or(*default_effect)),
            (term, value) => Err(MlError::shape_mismatch(format!(
                "term on '{}' cannot score a {} value",
                term.column(),
                value.kind()
            ))),
        }
    }

    fn coefficients(&self) -> Vec<f64> {
        match self {
            Term::Numeric {
                coefficient,
                hinges,
                ..
            } => std::iter::once(*coefficient)
                .chain(hinges.iter().flat_map(|h| [h.knot, h.coefficient]))
                .collect(),
            Term::Categorical {
                levels,
                default_effect,
                ..
            } => levels
                .values()
                .copied()
                .chain(std::iter::once(*default_effect))
                .collect(),
        }
    }
}

/// Generalized linear model artifact, stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlmModel {
    pub name: String,
    #[serde(default)]
    pub link: Link,
    pub intercept: f64,
    #[serde(default)]
    pub terms: Vec<Term>,
}

impl GlmModel {
    pub fn from_json(json: &str) -> Result<Self, MlError> {
        let model: GlmModel = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), MlError> {
        if !self.intercept.is_finite() {
            return Err(MlError::model("intercept is not finite"));
        }
        for term in &self.terms {
            if term.coefficients().iter().any(|c| !c.is_finite()) {
                return Err(MlError::model(format!(
                    "term on '{}' has a non-finite coefficient",
                    term.column()
                )));
            }
        }
        Ok(())
    }

    fn predict_row(&self, row: &EvalRow) -> Result<f64, MlError> {
        let mut eta = self.intercept;
        for term in &self.terms {
            eta += term.effect(row)?;
        }
        Ok(self.link.inverse(eta))
    }
}

impl Model for GlmModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for term in &self.terms {
            if !columns.iter().any(|c| c == term.column()) {
                columns.push(term.column().to_string());
            }
        }
        columns
    }

    fn predict(&self, rows: &[EvalRow]) -> Result<Vec<f64>, MlError> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }
}

/// A model backed by a per-row scoring closure.
pub struct FnModel<F>
where
    F: Fn(&EvalRow) -> Result<f64, MlError> + Send + Sync,
{
    name: String,
    columns: Vec<String>,
    score: F,
}

impl<F> FnModel<F>
where
    F: Fn(&EvalRow) -> Result<f64, MlError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, columns: Vec<String>, score: F) -> Self {
        Self {
            name: name.into(),
            columns,
            score,
        }
    }
}

impl<F> Model for FnModel<F>
where
    F: Fn(&EvalRow) -> Result<f64, MlError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn required_columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn predict(&self, rows: &[EvalRow]) -> Result<Vec<f64>, MlError> {
        rows.iter().map(|row| (self.score)(row)).collect()
    }
}
