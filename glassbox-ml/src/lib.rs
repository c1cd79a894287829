//! # glassbox-ml: model explanation pipelines
//!
//! Model-agnostic explanations for a fitted regression model scored through a
//! batch-bounded [`ScoringAdapter`]:
//!
//! 1. **Partial dependence**: mean prediction as one predictor sweeps a grid
//! 2. **Permutation importance**: loss increase when a predictor is shuffled
//! 3. **Break-down**: additive attribution of a single prediction
//!
//! Each result renders to an SVG chart; [`ReportRunner`] drives all three from
//! a [`glassbox_core::GlassboxConfig`] and writes a JSON summary.

// Foundation
pub mod error;
pub mod labels;
pub mod loss;
pub mod model;
pub mod sampling;
pub mod scoring;

// Inputs
pub mod loader;

// Pipelines
pub mod breakdown;
pub mod importance;
pub mod pdp;

// Output
pub mod render;
pub mod report;

// Re-exports
pub use breakdown::{Breakdown, BreakdownParams, ContributionStep, DisplayStep, Sign};
pub use error::MlError;
pub use importance::{FeatureImportance, ImportanceParams, ImportanceRecord, ImportanceSummary};
pub use labels::DisplayAliases;
pub use loader::{ArtifactFetcher, Location, load_inputs};
pub use model::{FnModel, GlmModel, Model};
pub use pdp::{HistogramBin, PDPoint, PartialDependence, PartialDependenceParams};
pub use report::{Pipeline, ReportRunner, ReportSummary};
pub use scoring::ScoringAdapter;
