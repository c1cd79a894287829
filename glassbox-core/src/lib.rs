//! # glassbox-core
//!
//! Shared data model and configuration for Glassbox: the evaluation table and
//! its rows, predictor declarations and sweep grids, and the layered
//! configuration consumed by the explanation pipelines in `glassbox-ml`.

pub mod config;
pub mod error;
pub mod types;

pub use config::{GlassboxConfig, ImportanceKind, LossKind, load_config};
pub use error::{ConfigError, CoreError};
pub use types::{EvalRow, EvalTable, GridSpec, PredictorDomain, PredictorSpec, Value};
