//! Core data model: predictor values, evaluation rows and tables.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single predictor value as the model sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Numeric(f64),
    Categorical(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Numeric(v) => Some(*v),
            Value::Categorical(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Numeric(_) => None,
            Value::Categorical(s) => Some(s.as_str()),
        }
    }

    /// Short name of the variant, used in type-mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Numeric(_) => "numeric",
            Value::Categorical(_) => "categorical",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Numeric(v) => write!(f, "{}", v),
            Value::Categorical(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Numeric(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Categorical(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Categorical(s)
    }
}

/// One observation of the evaluation dataset.
///
/// Rows are read-only once loaded; modified copies are produced with
/// [`EvalRow::with_value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRow {
    values: BTreeMap<String, Value>,
    pub observed_outcome: f64,
    pub exposure_weight: f64,
}

impl EvalRow {
    pub fn new(values: BTreeMap<String, Value>, observed_outcome: f64, exposure_weight: f64) -> Self {
        Self {
            values,
            observed_outcome,
            exposure_weight,
        }
    }

    /// Build a row from `(name, value)` pairs with unit weight.
    pub fn from_pairs<I, K, V>(pairs: I, observed_outcome: f64) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(values, observed_outcome, 1.0)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Value, CoreError> {
        self.values
            .get(name)
            .ok_or_else(|| CoreError::missing_column(name))
    }

    pub fn numeric(&self, name: &str) -> Result<f64, CoreError> {
        match self.get(name)? {
            Value::Numeric(v) => Ok(*v),
            other => Err(CoreError::TypeMismatch {
                column: name.to_string(),
                expected: "numeric",
                found: other.kind(),
            }),
        }
    }

    /// Copy of this row with one column overwritten.
    pub fn with_value(&self, name: &str, value: Value) -> EvalRow {
        let mut row = self.clone();
        row.values.insert(name.to_string(), value);
        row
    }

    /// Copy of this row keeping only the named columns.
    pub fn restrict(&self, names: &[String]) -> Result<EvalRow, CoreError> {
        let mut values = BTreeMap::new();
        for name in names {
            values.insert(name.clone(), self.get(name)?.clone());
        }
        Ok(Self::new(values, self.observed_outcome, self.exposure_weight))
    }
}

/// Candidate values for a numeric sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridSpec {
    Range { start: f64, end: f64, step: f64 },
    Values { values: Vec<f64> },
}

impl Default for GridSpec {
    fn default() -> Self {
        GridSpec::Range {
            start: 0.0,
            end: 35.0,
            step: 0.1,
        }
    }
}

/// Upper bound on the number of points a range grid may expand to.
pub const MAX_GRID_POINTS: usize = 1_000_000;

impl GridSpec {
    /// Expand the grid into its ordered points.
    ///
    /// Range points are computed as `start + i * step` so that long grids do
    /// not accumulate drift; `end` is included when it lies on the grid up to
    /// floating-point tolerance.
    pub fn points(&self) -> Result<Vec<f64>, CoreError> {
        match self {
            GridSpec::Range { start, end, step } => {
                if !start.is_finite() || !end.is_finite() || !step.is_finite() {
                    return Err(CoreError::invalid_input("grid bounds must be finite"));
                }
                if *step <= 0.0 {
                    return Err(CoreError::invalid_input("grid step must be positive"));
                }
                if end < start {
                    return Err(CoreError::invalid_input(format!(
                        "grid end {} is below start {}",
                        end, start
                    )));
                }
                let steps = (end - start) / step;
                if !steps.is_finite() || steps.round() >= MAX_GRID_POINTS as f64 {
                    return Err(CoreError::invalid_input(format!(
                        "grid from {} to {} by {} exceeds {} points",
                        start, end, step, MAX_GRID_POINTS
                    )));
                }
                let n = if (steps - steps.round()).abs() < 1e-9 {
                    steps.round()
                } else {
                    steps.floor()
                } as usize;
                Ok((0..=n).map(|i| start + i as f64 * step).collect())
            }
            GridSpec::Values { values } => {
                if values.is_empty() {
                    return Err(CoreError::invalid_input("grid has no values"));
                }
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(CoreError::invalid_input("grid values must be finite"));
                }
                Ok(values.clone())
            }
        }
    }
}

/// Declared domain of a predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PredictorDomain {
    Numeric {
        #[serde(default)]
        grid: GridSpec,
    },
    Categorical {
        #[serde(default)]
        levels: Vec<String>,
    },
}

/// A predictor column the model consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorSpec {
    pub name: String,
    #[serde(flatten)]
    pub domain: PredictorDomain,
}

impl PredictorSpec {
    pub fn numeric(name: impl Into<String>, grid: GridSpec) -> Self {
        Self {
            name: name.into(),
            domain: PredictorDomain::Numeric { grid },
        }
    }

    pub fn categorical(name: impl Into<String>, levels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            domain: PredictorDomain::Categorical { levels },
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.domain, PredictorDomain::Numeric { .. })
    }
}

/// The held-out evaluation dataset.
#[derive(Debug, Clone)]
pub struct EvalTable {
    predictors: Vec<PredictorSpec>,
    rows: Vec<EvalRow>,
}

impl EvalTable {
    /// Build a table, checking every row against the declared predictors.
    pub fn new(predictors: Vec<PredictorSpec>, rows: Vec<EvalRow>) -> Result<Self, CoreError> {
        for (i, row) in rows.iter().enumerate() {
            for spec in &predictors {
                let value = row.get(&spec.name).map_err(|_| {
                    CoreError::invalid_input(format!("row {} is missing predictor '{}'", i, spec.name))
                })?;
                let expected = if spec.is_numeric() {
                    "numeric"
                } else {
                    "categorical"
                };
                if value.kind() != expected {
                    return Err(CoreError::TypeMismatch {
                        column: spec.name.clone(),
                        expected,
                        found: value.kind(),
                    });
                }
            }
            if row.exposure_weight.is_nan() || row.exposure_weight < 0.0 {
                return Err(CoreError::invalid_input(format!(
                    "row {} has invalid exposure weight {}",
                    i, row.exposure_weight
                )));
            }
        }
        Ok(Self { predictors, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[EvalRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Result<&EvalRow, CoreError> {
        self.rows.get(index).ok_or_else(|| {
            CoreError::invalid_input(format!(
                "row index {} out of range (table has {} rows)",
                index,
                self.rows.len()
            ))
        })
    }

    pub fn predictors(&self) -> &[PredictorSpec] {
        &self.predictors
    }

    pub fn predictor(&self, name: &str) -> Result<&PredictorSpec, CoreError> {
        self.predictors
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| CoreError::missing_column(name))
    }

    pub fn predictor_names(&self) -> Vec<String> {
        self.predictors.iter().map(|p| p.name.clone()).collect()
    }

    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>, CoreError> {
        self.rows.iter().map(|r| r.numeric(name)).collect()
    }

    pub fn outcomes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.observed_outcome).collect()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.exposure_weight).collect()
    }

    /// Clone the rows at the given indices, in index order.
    pub fn subset(&self, indices: &[usize]) -> Vec<EvalRow> {
        indices
            .iter()
            .filter_map(|&i| self.rows.get(i).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn age_row(age: f64, outcome: f64) -> EvalRow {
        EvalRow::from_pairs([("vehicle_age", Value::Numeric(age))], outcome)
    }

    #[test]
    fn test_oversized_range_grid_is_rejected() {
        let grid = GridSpec::Range {
            start: 0.0,
            end: 1e300,
            step: 1e-300,
        };
        assert!(matches!(grid.points(), Err(CoreError::InvalidInput(_))));

        let grid = GridSpec::Range {
            start: 0.0,
            end: 2_000_000.0,
            step: 1.0,
        };
        assert!(matches!(grid.points(), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_reference_grid_has_351_points() {
        let points = GridSpec::default().points().unwrap();
        assert_eq!(points.len(), 351);
        assert_eq!(points[0], 0.0);
        assert!((points[350] - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_grid_excludes_end_off_step() {
        let grid = GridSpec::Range {
            start: 0.0,
            end: 1.0,
            step: 0.3,
        };
        assert_eq!(grid.points().unwrap().len(), 4);
    }

    #[test]
    fn test_grid_rejects_bad_step() {
        let grid = GridSpec::Range {
            start: 0.0,
            end: 1.0,
            step: 0.0,
        };
        assert!(grid.points().is_err());
        assert!(GridSpec::Values { values: vec![] }.points().is_err());
    }

    #[test]
    fn test_row_get_missing_column() {
        let row = age_row(3.0, 10.0);
        let err = row.get("sex").unwrap_err();
        assert!(matches!(err, CoreError::MissingColumn { .. }));
    }

    #[test]
    fn test_with_value_leaves_original_untouched() {
        let row = age_row(3.0, 10.0);
        let modified = row.with_value("vehicle_age", Value::Numeric(7.0));
        assert_eq!(row.numeric("vehicle_age").unwrap(), 3.0);
        assert_eq!(modified.numeric("vehicle_age").unwrap(), 7.0);
    }

    #[test]
    fn test_numeric_on_categorical_is_type_mismatch() {
        let row = EvalRow::from_pairs([("sex", "Masculino")], 1.0);
        assert!(matches!(
            row.numeric("sex"),
            Err(CoreError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_table_validates_declared_types() {
        let specs = vec![PredictorSpec::categorical("vehicle_age", vec![])];
        let err = EvalTable::new(specs, vec![age_row(1.0, 1.0)]).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }

    #[test]
    fn test_table_rejects_negative_weight() {
        let specs = vec![PredictorSpec::numeric("vehicle_age", GridSpec::default())];
        let mut row = age_row(1.0, 1.0);
        row.exposure_weight = -0.5;
        assert!(EvalTable::new(specs, vec![row]).is_err());
    }

    #[test]
    fn test_predictor_spec_toml_shape() {
        let spec: PredictorSpec = toml::from_str(
            r#"
            name = "vehicle_age"
            type = "numeric"
            grid = { start = 0.0, end = 10.0, step = 5.0 }
            "#,
        )
        .unwrap();
        assert!(spec.is_numeric());
        let PredictorDomain::Numeric { grid } = spec.domain else {
            panic!("expected numeric domain");
        };
        assert_eq!(grid.points().unwrap(), vec![0.0, 5.0, 10.0]);
    }
}
