//! Partial dependence: the average prediction as one predictor is swept over
//! a grid while every other column keeps its observed value.

use crate::error::MlError;
use crate::sampling::RowSampler;
use crate::scoring::ScoringAdapter;
use glassbox_core::{EvalTable, GridSpec, PredictorDomain, PredictorSpec, Value};
use serde::{Deserialize, Serialize};

/// Sweep values for one predictor.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepGrid {
    Numeric(Vec<f64>),
    /// Explicit discrete grid for a categorical predictor.
    Levels(Vec<String>),
}

impl SweepGrid {
    /// Resolve the grid for `spec`, preferring `override_grid` when given.
    ///
    /// Categorical predictors need a declared level list; numeric grids
    /// cannot be applied to them.
    pub fn for_predictor(
        spec: &PredictorSpec,
        override_grid: Option<&GridSpec>,
    ) -> Result<Self, MlError> {
        match (&spec.domain, override_grid) {
            (PredictorDomain::Numeric { .. }, Some(grid))
            | (PredictorDomain::Numeric { grid }, None) => Ok(SweepGrid::Numeric(grid.points()?)),
            (PredictorDomain::Categorical { .. }, Some(_)) => {
                Err(MlError::UnsupportedPredictor(format!(
                    "'{}' is categorical and cannot be swept over a numeric grid",
                    spec.name
                )))
            }
            (PredictorDomain::Categorical { levels }, None) => {
                if levels.is_empty() {
                    return Err(MlError::UnsupportedPredictor(format!(
                        "'{}' is categorical and declares no levels to sweep",
                        spec.name
                    )));
                }
                Ok(SweepGrid::Levels(levels.clone()))
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SweepGrid::Numeric(v) => v.len(),
            SweepGrid::Levels(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn values(&self) -> Vec<Value> {
        match self {
            SweepGrid::Numeric(v) => v.iter().map(|&x| Value::Numeric(x)).collect(),
            SweepGrid::Levels(v) => v.iter().map(|s| Value::Categorical(s.clone())).collect(),
        }
    }
}

/// Average prediction at one grid value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PDPoint {
    /// Grid value, or the level index for categorical sweeps.
    pub predictor_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub mean_prediction: f64,
}

/// One bar of the predictor's empirical distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct PartialDependenceParams {
    pub predictor: String,
    pub grid: Option<GridSpec>,
    pub sample_size: usize,
    pub seed: Option<u64>,
    pub histogram_bins: usize,
    pub keep_individual: bool,
}

impl PartialDependenceParams {
    pub fn new(predictor: impl Into<String>, sample_size: usize) -> Self {
        Self {
            predictor: predictor.into(),
            grid: None,
            sample_size,
            seed: None,
            histogram_bins: 35,
            keep_individual: false,
        }
    }

    pub fn with_grid(mut self, grid: GridSpec) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Result of a partial dependence run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialDependence {
    pub predictor: String,
    pub points: Vec<PDPoint>,
    pub histogram: Vec<HistogramBin>,
    /// Number of base rows averaged per grid value.
    pub sample_size: usize,
    pub seed: u64,
    /// Individual conditional expectation curves, one per base row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub individual: Option<Vec<Vec<f64>>>,
}

/// Compute partial dependence of the model on `params.predictor`.
///
/// Points come back in grid order, one per grid value. Modified rows are
/// generated lazily so that at most one scoring batch is alive at a time.
pub fn partial_dependence(
    adapter: &ScoringAdapter,
    table: &EvalTable,
    params: &PartialDependenceParams,
) -> Result<PartialDependence, MlError> {
    if table.is_empty() {
        return Err(MlError::invalid_input("evaluation table is empty"));
    }
    if params.sample_size == 0 {
        return Err(MlError::invalid_input("sample size must be greater than zero"));
    }
    let spec = table.predictor(&params.predictor)?;
    let grid = SweepGrid::for_predictor(spec, params.grid.as_ref())?;
    if grid.is_empty() {
        return Err(MlError::invalid_input("grid has no values"));
    }

    let mut sampler = RowSampler::new(params.seed);
    let indices = sampler.sample_indices(table.len(), params.sample_size);
    let base = table.subset(&indices);
    let n = base.len();

    tracing::info!(
        predictor = %params.predictor,
        grid_points = grid.len(),
        base_rows = n,
        seed = sampler.seed(),
        "Computing partial dependence"
    );

    let values = grid.values();
    let name = params.predictor.as_str();
    let rows = values
        .iter()
        .flat_map(|v| base.iter().map(move |row| row.with_value(name, v.clone())));

    let mut sums = vec![0.0; values.len()];
    let mut individual = params
        .keep_individual
        .then(|| vec![vec![0.0; values.len()]; n]);
    let mut k = 0usize;
    adapter.score_stream(rows, |p| {
        let (g, r) = (k / n, k % n);
        sums[g] += p;
        if let Some(curves) = individual.as_mut() {
            curves[r][g] = p;
        }
        k += 1;
    })?;

    let points: Vec<PDPoint> = match &grid {
        SweepGrid::Numeric(xs) => xs
            .iter()
            .zip(&sums)
            .map(|(&x, s)| PDPoint {
                predictor_value: x,
                label: None,
                mean_prediction: s / n as f64,
            })
            .collect(),
        SweepGrid::Levels(levels) => levels
            .iter()
            .zip(&sums)
            .enumerate()
            .map(|(i, (level, s))| PDPoint {
                predictor_value: i as f64,
                label: Some(level.clone()),
                mean_prediction: s / n as f64,
            })
            .collect(),
    };
    for point in &points {
        tracing::debug!(
            value = point.predictor_value,
            mean = point.mean_prediction,
            "Partial dependence point"
        );
    }

    let histogram = match &grid {
        SweepGrid::Numeric(xs) => {
            let column = table.numeric_column(name)?;
            let (lo, hi) = min_max(xs);
            histogram(&column, lo, hi, params.histogram_bins)
        }
        SweepGrid::Levels(levels) => level_counts(table, name, levels)?,
    };

    Ok(PartialDependence {
        predictor: params.predictor.clone(),
        points,
        histogram,
        sample_size: n,
        seed: sampler.seed(),
        individual,
    })
}

fn min_max(xs: &[f64]) -> (f64, f64) {
    xs.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        })
}

/// Equal-width histogram over `[lo, hi]`; values outside the range land in
/// the edge bins.
pub fn histogram(values: &[f64], lo: f64, hi: f64, bins: usize) -> Vec<HistogramBin> {
    let bins = bins.max(1);
    if hi <= lo {
        return vec![HistogramBin {
            lower: lo,
            upper: hi,
            count: values.iter().filter(|v| !v.is_nan()).count(),
        }];
    }
    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in values.iter().filter(|v| !v.is_nan()) {
        let idx = ((v - lo) / width).floor();
        let idx = if idx < 0.0 {
            0
        } else {
            (idx as usize).min(bins - 1)
        };
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: lo + i as f64 * width,
            upper: lo + (i + 1) as f64 * width,
            count,
        })
        .collect()
}

fn level_counts(
    table: &EvalTable,
    name: &str,
    levels: &[String],
) -> Result<Vec<HistogramBin>, MlError> {
    let mut counts = vec![0usize; levels.len()];
    for row in table.rows() {
        if let Some(level) = row.get(name)?.as_str() {
            if let Some(i) = levels.iter().position(|l| l == level) {
                counts[i] += 1;
            }
        }
    }
    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: i as f64 - 0.5,
            upper: i as f64 + 0.5,
            count,
        })
        .collect())
}
