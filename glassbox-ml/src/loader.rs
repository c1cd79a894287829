//! Loading the evaluation dataset and model artifact, locally or over HTTP.

use crate::error::MlError;
use crate::model::GlmModel;
use glassbox_core::config::{CacheConfig, DataConfig};
use glassbox_core::{EvalRow, EvalTable, GlassboxConfig, PredictorDomain, PredictorSpec, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Where an artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote(String),
}

impl Location {
    pub fn parse(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            Location::Remote(source.to_string())
        } else {
            Location::Local(PathBuf::from(source))
        }
    }
}

/// Resolves artifact locations to local files, downloading remote ones into
/// a cache directory.
pub struct ArtifactFetcher {
    cache_dir: PathBuf,
    refresh: bool,
    client: reqwest::Client,
}

impl ArtifactFetcher {
    pub fn new(cache_dir: PathBuf, refresh: bool) -> Self {
        Self {
            cache_dir,
            refresh,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(cache: &CacheConfig) -> Self {
        Self::new(cache.resolve_dir(), cache.refresh)
    }

    /// Cache file for a remote URL: SHA-256 of the URL plus its extension.
    pub fn cache_path(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        let stem: String = format!("{:x}", digest).chars().take(16).collect();
        let file = url
            .rsplit('/')
            .next()
            .and_then(|name| name.split('?').next())
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| format!("{}.{}", stem, ext))
            .unwrap_or(stem);
        self.cache_dir.join(file)
    }

    pub async fn fetch(&self, location: &Location) -> Result<PathBuf, MlError> {
        match location {
            Location::Local(path) => {
                if !path.exists() {
                    return Err(MlError::invalid_input(format!(
                        "artifact not found: {}",
                        path.display()
                    )));
                }
                Ok(path.clone())
            }
            Location::Remote(url) => {
                let target = self.cache_path(url);
                if target.exists() && !self.refresh {
                    tracing::debug!(url = %url, path = %target.display(), "Using cached artifact");
                    return Ok(target);
                }
                tracing::info!(url = %url, "Downloading artifact");
                let response = self.client.get(url).send().await?.error_for_status()?;
                let bytes = response.bytes().await?;
                tokio::fs::create_dir_all(&self.cache_dir).await?;
                let partial = target.with_extension("part");
                tokio::fs::write(&partial, &bytes).await?;
                tokio::fs::rename(&partial, &target).await?;
                tracing::info!(bytes = bytes.len(), path = %target.display(), "Artifact cached");
                Ok(target)
            }
        }
    }
}

/// Read a JSON model artifact.
pub fn read_model(path: &Path) -> Result<GlmModel, MlError> {
    let json = std::fs::read_to_string(path)?;
    GlmModel::from_json(&json)
}

/// Read the evaluation CSV at `path`.
pub fn read_table(
    path: &Path,
    data: &DataConfig,
    predictors: &[PredictorSpec],
) -> Result<EvalTable, MlError> {
    let file = std::fs::File::open(path)?;
    read_table_from(file, data, predictors)
}

/// Parse an evaluation CSV. Predictor columns are typed by their declared
/// domain; other columns are ignored.
pub fn read_table_from<R: Read>(
    reader: R,
    data: &DataConfig,
    predictors: &[PredictorSpec],
) -> Result<EvalTable, MlError> {
    if !data.delimiter.is_ascii() {
        return Err(MlError::invalid_input(format!(
            "delimiter '{}' is not a single-byte character",
            data.delimiter
        )));
    }
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(data.delimiter as u8)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let position = |name: &str| -> Result<usize, MlError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| MlError::dataset(format!("column '{}' not found in header", name)))
    };

    let outcome_idx = position(&data.outcome_column)?;
    let weight_idx = data.weight_column.as_deref().map(position).transpose()?;
    let predictor_idx: Vec<(usize, &PredictorSpec)> = predictors
        .iter()
        .map(|spec| position(&spec.name).map(|i| (i, spec)))
        .collect::<Result<_, _>>()?;

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or("");
        let number = |idx: usize, column: &str| -> Result<f64, MlError> {
            field(idx).parse::<f64>().map_err(|_| {
                MlError::dataset(format!(
                    "row {}, column '{}': '{}' is not numeric",
                    line + 1,
                    column,
                    field(idx)
                ))
            })
        };

        let mut values = BTreeMap::new();
        for (idx, spec) in &predictor_idx {
            let value = match spec.domain {
                PredictorDomain::Numeric { .. } => Value::Numeric(number(*idx, &spec.name)?),
                PredictorDomain::Categorical { .. } => Value::Categorical(field(*idx).to_string()),
            };
            values.insert(spec.name.clone(), value);
        }
        let outcome = number(outcome_idx, &data.outcome_column)?;
        let weight = match (weight_idx, &data.weight_column) {
            (Some(idx), Some(column)) => number(idx, column)?,
            _ => 1.0,
        };
        rows.push(EvalRow::new(values, outcome, weight));
    }

    tracing::info!(rows = rows.len(), predictors = predictors.len(), "Evaluation table loaded");
    Ok(EvalTable::new(predictors.to_vec(), rows)?)
}

/// Fetch and parse both inputs named by the configuration.
pub async fn load_inputs(config: &GlassboxConfig) -> Result<(EvalTable, GlmModel), MlError> {
    let fetcher = ArtifactFetcher::from_config(&config.cache);
    let data_path = fetcher.fetch(&Location::parse(&config.data.source)).await?;
    let model_path = fetcher.fetch(&Location::parse(&config.model.source)).await?;
    let table = read_table(&data_path, &config.data, &config.predictors)?;
    let model = read_model(&model_path)?;
    tracing::info!(model = %model.name, terms = model.terms.len(), "Model loaded");
    Ok((table, model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glassbox_core::GridSpec;
    use tempfile::TempDir;

    const CSV: &str = "\
vehicle_age,sex,claim_cost,exposure
1,Masculino,100,0.5
5 ,Feminino,150,1
10,Masculino,200,1
";

    fn predictors() -> Vec<PredictorSpec> {
        vec![
            PredictorSpec::numeric("vehicle_age", GridSpec::default()),
            PredictorSpec::categorical("sex", vec![]),
        ]
    }

    fn data_config() -> DataConfig {
        DataConfig {
            outcome_column: "claim_cost".into(),
            weight_column: Some("exposure".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_location_parse() {
        assert_eq!(
            Location::parse("https://example.com/eval.csv"),
            Location::Remote("https://example.com/eval.csv".into())
        );
        assert_eq!(
            Location::parse("data/eval.csv"),
            Location::Local(PathBuf::from("data/eval.csv"))
        );
    }

    #[test]
    fn test_read_table_types_columns() {
        let table = read_table_from(CSV.as_bytes(), &data_config(), &predictors()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.numeric_column("vehicle_age").unwrap(), vec![1.0, 5.0, 10.0]);
        assert_eq!(table.outcomes(), vec![100.0, 150.0, 200.0]);
        assert_eq!(table.weights(), vec![0.5, 1.0, 1.0]);
        assert_eq!(
            table.row(1).unwrap().get("sex").unwrap(),
            &Value::from("Feminino")
        );
    }

    #[test]
    fn test_missing_weight_column_defaults_to_one() {
        let data = DataConfig {
            weight_column: None,
            ..data_config()
        };
        let table = read_table_from(CSV.as_bytes(), &data, &predictors()).unwrap();
        assert_eq!(table.weights(), vec![1.0; 3]);
    }

    #[test]
    fn test_weightless_csv_loads_with_workspace_config() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".glassbox")).unwrap();
        std::fs::write(
            dir.path().join(".glassbox").join("config.toml"),
            "[data]\noutcome_column = \"claim_cost\"\n",
        )
        .unwrap();
        let config = glassbox_core::load_config(Some(dir.path()), None).unwrap();

        let csv = "vehicle_age,sex,claim_cost\n1,Masculino,100\n5,Feminino,150\n";
        let table = read_table_from(csv.as_bytes(), &config.data, &predictors()).unwrap();
        assert_eq!(table.weights(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_non_numeric_value_names_row_and_column() {
        let csv = "vehicle_age,sex,claim_cost,exposure\nold,Masculino,1,1\n";
        let err = read_table_from(csv.as_bytes(), &data_config(), &predictors()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("row 1"));
        assert!(msg.contains("vehicle_age"));
    }

    #[test]
    fn test_missing_predictor_column() {
        let csv = "vehicle_age,claim_cost,exposure\n1,1,1\n";
        let err = read_table_from(csv.as_bytes(), &data_config(), &predictors()).unwrap_err();
        assert!(matches!(err, MlError::Dataset(_)));
    }

    #[test]
    fn test_cache_path_is_stable_and_keeps_extension() {
        let fetcher = ArtifactFetcher::new(PathBuf::from("/tmp/cache"), false);
        let a = fetcher.cache_path("https://example.com/data/eval.csv?token=1");
        let b = fetcher.cache_path("https://example.com/data/eval.csv?token=1");
        assert_eq!(a, b);
        assert_eq!(a.extension().unwrap(), "csv");
        assert_ne!(a, fetcher.cache_path("https://example.com/other.csv"));
    }

    #[tokio::test]
    async fn test_fetch_local_and_cached_remote() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("eval.csv");
        std::fs::write(&local, CSV).unwrap();
        let fetcher = ArtifactFetcher::new(dir.path().join("cache"), false);

        let path = fetcher.fetch(&Location::Local(local.clone())).await.unwrap();
        assert_eq!(path, local);

        // a pre-populated cache entry is served without touching the network
        let url = "https://example.invalid/eval.csv";
        let cached = fetcher.cache_path(url);
        std::fs::create_dir_all(cached.parent().unwrap()).unwrap();
        std::fs::write(&cached, CSV).unwrap();
        let path = fetcher.fetch(&Location::Remote(url.into())).await.unwrap();
        assert_eq!(path, cached);
    }

    #[tokio::test]
    async fn test_fetch_missing_local() {
        let fetcher = ArtifactFetcher::new(PathBuf::from("/tmp/cache"), false);
        let result = fetcher
            .fetch(&Location::Local(PathBuf::from("/nonexistent/eval.csv")))
            .await;
        assert!(matches!(result, Err(MlError::InvalidInput(_))));
    }

    #[test]
    fn test_read_model_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("glm.json");
        std::fs::write(
            &path,
            r#"{"name": "severity", "intercept": 1.5, "terms": []}"#,
        )
        .unwrap();
        let model = read_model(&path).unwrap();
        assert_eq!(model.name, "severity");
    }
}
