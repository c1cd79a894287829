//! Error types for the Glassbox core library.
//!
//! Uses `thiserror` for public API error types. The pipelines in `glassbox-ml`
//! wrap these into their own error enum.

/// Top-level error type for the Glassbox core library.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Missing column '{column}'")]
    MissingColumn { column: String },

    #[error("Column '{column}' expected a {expected} value, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {message}")]
    Load { message: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Predictor '{name}' is referenced by [{section}] but not declared in [[predictors]]")]
    UndeclaredPredictor { name: String, section: &'static str },
}

impl CoreError {
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load {
            message: err.to_string(),
        }
    }
}
