//! Configuration system for Glassbox.
//!
//! Uses `figment` for layered configuration: defaults -> config files -> environment.
//! CLI overrides are applied on the loaded value by the binary. Configuration is
//! loaded from `~/.config/glassbox/config.toml`, `.glassbox/config.toml` in the
//! workspace directory, and an optional explicit file.

use crate::error::ConfigError;
use crate::types::{GridSpec, PredictorDomain, PredictorSpec};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration for a Glassbox report run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlassboxConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Predictor columns the model consumes, with their domains.
    #[serde(default)]
    pub predictors: Vec<PredictorSpec>,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub partial_dependence: PartialDependenceConfig,
    #[serde(default)]
    pub importance: ImportanceConfig,
    #[serde(default)]
    pub breakdown: BreakdownConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Evaluation dataset location and column roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Local path or `http(s)://` URL of the CSV file.
    pub source: String,
    pub delimiter: char,
    pub outcome_column: String,
    /// Exposure weight column; every row weighs 1.0 when unset.
    pub weight_column: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: "data/eval.csv".to_string(),
            delimiter: ',',
            outcome_column: "outcome".to_string(),
            weight_column: None,
        }
    }
}

/// Model artifact location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Local path or `http(s)://` URL of the JSON model artifact.
    pub source: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            source: "model/glm.json".to_string(),
        }
    }
}

/// Download cache for remote artifacts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory (project cache dir when unset).
    pub dir: Option<PathBuf>,
    /// Re-download remote artifacts even when cached.
    pub refresh: bool,
}

impl CacheConfig {
    pub fn resolve_dir(&self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return dir.clone();
        }
        directories::ProjectDirs::from("dev", "glassbox", "glassbox")
            .map(|d| d.cache_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".glassbox").join("cache"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Maximum number of rows handed to the model per call.
    pub batch_size: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self { batch_size: 10_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialDependenceConfig {
    pub predictor: String,
    /// Overrides the grid declared on the predictor.
    pub grid: Option<GridSpec>,
    /// Number of base rows averaged per grid point.
    pub sample_size: usize,
    pub seed: Option<u64>,
    pub histogram_bins: usize,
    /// Keep one curve per base row (individual conditional expectation).
    pub keep_individual: bool,
}

impl Default for PartialDependenceConfig {
    fn default() -> Self {
        Self {
            predictor: "vehicle_age".to_string(),
            grid: None,
            sample_size: 10_000,
            seed: None,
            histogram_bins: 35,
            keep_individual: false,
        }
    }
}

/// Loss used to measure dropout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    #[default]
    Rmse,
    Mse,
    Mae,
}

/// How importance values are expressed on the chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceKind {
    #[default]
    Raw,
    Difference,
    Ratio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportanceConfig {
    /// Predictors to permute; all declared predictors when empty.
    pub predictors: Vec<String>,
    pub repetitions: usize,
    /// Rows drawn per repetition.
    pub sample_size: usize,
    pub seed: Option<u64>,
    pub loss: LossKind,
    pub kind: ImportanceKind,
}

impl Default for ImportanceConfig {
    fn default() -> Self {
        Self {
            predictors: Vec::new(),
            repetitions: 10,
            sample_size: 1_000,
            seed: None,
            loss: LossKind::Rmse,
            kind: ImportanceKind::Raw,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakdownConfig {
    /// Index of the explained row in the evaluation table.
    pub row_index: usize,
    /// Rows used to estimate the intercept and the conditional means.
    pub background_size: usize,
    pub seed: Option<u64>,
    /// Fixed variable order; the largest-impact-first heuristic is used when unset.
    pub order: Option<Vec<String>>,
    /// Merge variables beyond the top `k` into one step.
    pub max_features: Option<usize>,
    /// Display aliases for categorical values.
    pub aliases: BTreeMap<String, String>,
}

impl Default for BreakdownConfig {
    fn default() -> Self {
        Self {
            row_index: 0,
            background_size: 1_000,
            seed: None,
            order: None,
            max_features: None,
            aliases: default_aliases(),
        }
    }
}

/// The display aliases of the reference report.
pub fn default_aliases() -> BTreeMap<String, String> {
    [
        ("Entre 18 e 25 anos", "18-25"),
        ("Passeio nacional", "Domestic passenger"),
        ("Masculino", "Male"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub partial_dependence_file: String,
    pub importance_file: String,
    pub breakdown_file: String,
    pub report_file: String,
    pub width: u32,
    pub height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("figures"),
            partial_dependence_file: "partial_dependence.svg".to_string(),
            importance_file: "feature_importance.svg".to_string(),
            breakdown_file: "breakdown.svg".to_string(),
            report_file: "report.json".to_string(),
            width: 800,
            height: 600,
        }
    }
}

impl GlassboxConfig {
    pub fn predictor(&self, name: &str) -> Option<&PredictorSpec> {
        self.predictors.iter().find(|p| p.name == name)
    }

    /// Predictors permuted by the importance pipeline.
    pub fn importance_predictors(&self) -> Vec<String> {
        if self.importance.predictors.is_empty() {
            self.predictors.iter().map(|p| p.name.clone()).collect()
        } else {
            self.importance.predictors.clone()
        }
    }

    /// Grid swept by the partial dependence pipeline, if one is defined.
    pub fn partial_dependence_grid(&self) -> Option<GridSpec> {
        if let Some(grid) = &self.partial_dependence.grid {
            return Some(grid.clone());
        }
        match self.predictor(&self.partial_dependence.predictor)?.domain {
            PredictorDomain::Numeric { ref grid } => Some(grid.clone()),
            PredictorDomain::Categorical { .. } => None,
        }
    }

    /// Check cross-section consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("scoring.batch_size", self.scoring.batch_size)?;
        positive(
            "partial_dependence.sample_size",
            self.partial_dependence.sample_size,
        )?;
        positive(
            "partial_dependence.histogram_bins",
            self.partial_dependence.histogram_bins,
        )?;
        positive("importance.repetitions", self.importance.repetitions)?;
        positive("importance.sample_size", self.importance.sample_size)?;
        positive("breakdown.background_size", self.breakdown.background_size)?;
        if self.output.width < 200 || self.output.height < 150 {
            return Err(ConfigError::InvalidValue {
                field: "output.width/output.height".into(),
                reason: "charts need at least 200x150 pixels".into(),
            });
        }

        self.declared(&self.partial_dependence.predictor, "partial_dependence")?;
        for (i, name) in self.importance.predictors.iter().enumerate() {
            self.declared(name, "importance")?;
            if self.importance.predictors[..i].contains(name) {
                return Err(ConfigError::InvalidValue {
                    field: "importance.predictors".into(),
                    reason: format!("predictor '{}' is listed more than once", name),
                });
            }
        }
        if let Some(order) = &self.breakdown.order {
            for name in order {
                self.declared(name, "breakdown")?;
            }
        }
        Ok(())
    }

    fn declared(&self, name: &str, section: &'static str) -> Result<(), ConfigError> {
        if self.predictor(name).is_none() {
            return Err(ConfigError::UndeclaredPredictor {
                name: name.to_string(),
                section,
            });
        }
        Ok(())
    }
}

fn positive(field: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `GLASSBOX_`)
/// 2. Explicit config file
/// 3. Workspace-local config (`.glassbox/config.toml`)
/// 4. User config (`~/.config/glassbox/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<GlassboxConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(GlassboxConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "glassbox", "glassbox") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".glassbox").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::Load {
                message: format!("config file not found: {}", path.display()),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // Environment variables (GLASSBOX_SCORING__BATCH_SIZE, GLASSBOX_OUTPUT__DIR, etc.)
    figment = figment.merge(Env::prefixed("GLASSBOX_").split("__"));

    let config: GlassboxConfig = figment.extract()?;
    tracing::debug!(
        predictors = config.predictors.len(),
        batch_size = config.scoring.batch_size,
        "Configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn declared_config() -> GlassboxConfig {
        GlassboxConfig {
            predictors: vec![
                PredictorSpec::numeric("vehicle_age", GridSpec::default()),
                PredictorSpec::categorical("sex", vec!["Masculino".into(), "Feminino".into()]),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_match_reference_run() {
        let config = GlassboxConfig::default();
        assert_eq!(config.partial_dependence.sample_size, 10_000);
        assert_eq!(config.scoring.batch_size, 10_000);
        assert_eq!(config.importance.loss, LossKind::Rmse);
        assert_eq!(config.breakdown.aliases.get("Masculino").unwrap(), "Male");
        assert_eq!(config.breakdown.aliases.len(), 3);
    }

    #[test]
    fn test_validate_accepts_declared_predictors() {
        declared_config().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_undeclared_pdp_predictor() {
        let mut config = declared_config();
        config.partial_dependence.predictor = "driver_age".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UndeclaredPredictor {
                section: "partial_dependence",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_repeated_importance_predictor() {
        let mut config = declared_config();
        config.importance.predictors = vec!["sex".into(), "vehicle_age".into(), "sex".into()];
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "importance.predictors"));
        assert!(err.to_string().contains("sex"));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut config = declared_config();
        config.scoring.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_importance_predictors_default_to_all() {
        let config = declared_config();
        assert_eq!(
            config.importance_predictors(),
            vec!["vehicle_age".to_string(), "sex".to_string()]
        );
    }

    #[test]
    fn test_partial_dependence_grid_prefers_override() {
        let mut config = declared_config();
        assert_eq!(config.partial_dependence_grid(), Some(GridSpec::default()));
        config.partial_dependence.grid = Some(GridSpec::Values {
            values: vec![0.0, 5.0],
        });
        assert_eq!(
            config.partial_dependence_grid(),
            Some(GridSpec::Values {
                values: vec![0.0, 5.0]
            })
        );
        config.partial_dependence.grid = None;
        config.partial_dependence.predictor = "sex".into();
        assert_eq!(config.partial_dependence_grid(), None);
    }

    #[test]
    fn test_load_config_layers_workspace_and_env() {
        figment::Jail::expect_with(|jail| {
            std::fs::create_dir_all(jail.directory().join(".glassbox"))
                .map_err(|e| e.to_string())?;
            jail.create_file(
                ".glassbox/config.toml",
                r#"
                [scoring]
                batch_size = 256

                [[predictors]]
                name = "vehicle_age"
                type = "numeric"
                grid = { start = 0.0, end = 10.0, step = 5.0 }

                [breakdown]
                row_index = 4
                "#,
            )?;
            jail.set_env("GLASSBOX_IMPORTANCE__REPETITIONS", "3");

            let config =
                load_config(Some(jail.directory()), None).map_err(|e| e.to_string())?;
            assert_eq!(config.scoring.batch_size, 256);
            assert_eq!(config.importance.repetitions, 3);
            assert_eq!(config.breakdown.row_index, 4);
            assert_eq!(config.breakdown.aliases.len(), 3);
            assert_eq!(config.predictors.len(), 1);
            Ok(())
        });
    }

    #[test]
    fn test_weight_column_is_unset_unless_configured() {
        figment::Jail::expect_with(|jail| {
            std::fs::create_dir_all(jail.directory().join(".glassbox"))
                .map_err(|e| e.to_string())?;
            jail.create_file(".glassbox/config.toml", "[data]\noutcome_column = \"y\"\n")?;
            let config =
                load_config(Some(jail.directory()), None).map_err(|e| e.to_string())?;
            assert_eq!(config.data.outcome_column, "y");
            assert_eq!(config.data.weight_column, None);

            jail.set_env("GLASSBOX_DATA__WEIGHT_COLUMN", "exposure");
            let config =
                load_config(Some(jail.directory()), None).map_err(|e| e.to_string())?;
            assert_eq!(config.data.weight_column.as_deref(), Some("exposure"));
            Ok(())
        });
    }

    #[test]
    fn test_load_config_missing_explicit_file() {
        let err = load_config(None, Some(Path::new("/nonexistent/glassbox.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
