use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub data: DataConfig,
    pub prediction: PredictionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory holding the registry document and every artifact it names.
    pub models_dir: PathBuf,
    pub registry_file: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    pub features_file: PathBuf,
    pub feature_columns: Vec<String>,
    pub history_file: PathBuf,
    pub target_column: String,
    pub year_column: String,
    pub quarter_column: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub timeout_ms: u64,
    pub history_years: u32,
    pub cache_artifacts: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            registry_file: "model_registry.json".to_string(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            features_file: PathBuf::from("data/pca_features.csv"),
            feature_columns: (1..=6).map(|i| format!("PC{}", i)).collect(),
            history_file: PathBuf::from("data/ml_ready_data.csv"),
            target_column: "Nağd_pul_kredit_satışı".to_string(),
            year_column: "Year".to_string(),
            quarter_column: "Quarter".to_string(),
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            history_years: 5,
            cache_artifacts: true,
        }
    }
}

impl RegistryConfig {
    pub fn registry_path(&self) -> PathBuf {
        self.models_dir.join(&self.registry_file)
    }
}

impl PredictionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Layers `path` (optional) under `LOANCAST__SECTION__FIELD` environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("LOANCAST")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("data.feature_columns")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.data.feature_columns.is_empty() {
            return Err(ConfigError::Invalid(
                "data.feature_columns must name at least one column".to_string(),
            ));
        }
        if self.prediction.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "prediction.timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
