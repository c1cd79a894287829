//! Error types for the glassbox-ml crate.

use glassbox_core::{ConfigError, CoreError};
use thiserror::Error;

/// Top-level error type for explanation pipelines.
///
/// Every variant is fatal for the pipeline that raised it; nothing here is
/// retried.
#[derive(Debug, Error)]
pub enum MlError {
    #[error("Missing column '{column}' required by the model")]
    MissingColumn { column: String },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Unsupported predictor: {0}")]
    UnsupportedPredictor(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Template error: {0}")]
    Template(#[from] handlebars::RenderError),
}

impl MlError {
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<CoreError> for MlError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MissingColumn { column } => Self::MissingColumn { column },
            CoreError::TypeMismatch {
                column,
                expected,
                found,
            } => Self::ShapeMismatch(format!(
                "column '{}' expected a {} value, found {}",
                column, expected, found
            )),
            CoreError::InvalidInput(msg) => Self::InvalidInput(msg),
            CoreError::Config(e) => Self::Config(e),
        }
    }
}

impl From<handlebars::TemplateError> for MlError {
    fn from(err: handlebars::TemplateError) -> Self {
        Self::Render(err.to_string())
    }
}
