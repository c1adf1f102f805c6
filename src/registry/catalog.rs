//! Read-only catalog of trained models produced by the offline training pipeline.
//!
//! The persisted document groups entries by family:
//!
//! ```json
//! {
//!   "ml_models": { "Ridge (α=1.0)": { "filename": "ml_Ridge_α=10.json", "type": "ml", "metrics": { "test_r2": 0.41 } } },
//!   "ts_models": { "ARIMA(1,1,1)": { "filename": "ts_ARIMA111.json", "type": "timeseries", "metrics": {} } },
//!   "metadata": { "total_models": 2, "ml_models_count": 1, "ts_models_count": 1 }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::RegistryConfig;
use crate::error::{RegistryError, ServeError};

/// Stand-in for a missing "higher is better" metric such as `test_r2`.
pub const R2_SENTINEL: f64 = -999.0;
/// Stand-in for a missing "lower is better" metric such as `test_mape`.
pub const ERROR_SENTINEL: f64 = 999.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    #[serde(rename = "ml")]
    PointEstimate,
    #[serde(rename = "timeseries")]
    SequentialForecast,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::PointEstimate => "ml",
            Family::SequentialForecast => "timeseries",
        }
    }

    /// Display label used by the statistics endpoint.
    pub fn label(&self) -> &'static str {
        match self {
            Family::PointEstimate => "ML",
            Family::SequentialForecast => "Time Series",
        }
    }

    fn section(&self) -> &'static str {
        match self {
            Family::PointEstimate => "ml_models",
            Family::SequentialForecast => "ts_models",
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Offline evaluation metrics. Keys are not guaranteed to be present; `null`
/// values written by the training pipeline are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "BTreeMap<String, Option<f64>>")]
pub struct Metrics(BTreeMap<String, f64>);

impl From<BTreeMap<String, Option<f64>>> for Metrics {
    fn from(raw: BTreeMap<String, Option<f64>>) -> Self {
        Metrics(
            raw.into_iter()
                .filter_map(|(k, v)| v.filter(|v| v.is_finite()).map(|v| (k, v)))
                .collect(),
        )
    }
}

impl Serialize for Metrics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl FromIterator<(String, f64)> for Metrics {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Metrics(iter.into_iter().collect())
    }
}

impl Metrics {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn get_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).unwrap_or(default)
    }

    pub fn test_r2(&self) -> f64 {
        self.get_or("test_r2", R2_SENTINEL)
    }

    pub fn test_mape(&self) -> f64 {
        self.get_or("test_mape", ERROR_SENTINEL)
    }
}

/// Descending `test_r2` ordering; entries without the metric sort last.
pub fn by_r2_desc(a: &Metrics, b: &Metrics) -> Ordering {
    b.test_r2().total_cmp(&a.test_r2())
}

#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub name: String,
    pub family: Family,
    pub filename: String,
    pub artifact_ref: PathBuf,
    pub metrics: Metrics,
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    ml_models: BTreeMap<String, RawEntry>,
    ts_models: BTreeMap<String, RawEntry>,
    #[serde(default)]
    metadata: RawMetadata,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    filename: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    metrics: Metrics,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
    total_models: Option<usize>,
}

#[derive(Debug)]
pub struct Registry {
    id: Uuid,
    entries: Vec<ModelEntry>,
    index: HashMap<String, usize>,
    loaded_at: DateTime<Utc>,
}

impl Registry {
    pub fn load(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let path = config.registry_path();
        info!("Loading model registry from {}", path.display());

        let content = fs::read_to_string(&path).map_err(|e| {
            RegistryError::Unavailable(format!("cannot read {}: {}", path.display(), e))
        })?;

        let registry = Self::from_json(&content, &config.models_dir)?;
        info!(
            "Model registry loaded: {} point-estimate, {} sequential",
            registry.list_by_family(Family::PointEstimate).count(),
            registry.list_by_family(Family::SequentialForecast).count(),
        );
        Ok(registry)
    }

    pub fn from_json(content: &str, models_dir: &Path) -> Result<Self, RegistryError> {
        let document: RegistryDocument = serde_json::from_str(content)
            .map_err(|e| RegistryError::Unavailable(format!("malformed registry: {}", e)))?;

        let mut entries = Vec::with_capacity(document.ml_models.len() + document.ts_models.len());
        let mut index = HashMap::new();

        let sections = [
            (Family::PointEstimate, document.ml_models),
            (Family::SequentialForecast, document.ts_models),
        ];

        for (family, section) in sections {
            for (name, raw) in section {
                if let Some(kind) = raw.kind.as_deref() {
                    if kind != family.as_str() {
                        return Err(RegistryError::Unavailable(format!(
                            "model {:?} in {} declares type {:?}",
                            name,
                            family.section(),
                            kind
                        )));
                    }
                }

                validate_filename(&name, &raw.filename)?;

                if index.insert(name.clone(), entries.len()).is_some() {
                    return Err(RegistryError::Unavailable(format!(
                        "model {:?} is registered more than once",
                        name
                    )));
                }

                entries.push(ModelEntry {
                    artifact_ref: models_dir.join(&raw.filename),
                    name,
                    family,
                    filename: raw.filename,
                    metrics: raw.metrics,
                });
            }
        }

        if let Some(declared) = document.metadata.total_models {
            if declared != entries.len() {
                warn!(
                    "Registry metadata declares {} models but {} are listed",
                    declared,
                    entries.len()
                );
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            entries,
            index,
            loaded_at: Utc::now(),
        })
    }

    /// Identifies this load; caches keyed on models must not outlive it.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn total_models(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, name: &str) -> Result<&ModelEntry, ServeError> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| ServeError::NotFound(name.to_string()))
    }

    pub fn list_by_family(&self, family: Family) -> impl Iterator<Item = &ModelEntry> {
        self.entries.iter().filter(move |e| e.family == family)
    }

    /// Entries of one family, best `test_r2` first.
    pub fn ranked(&self, family: Family) -> Vec<&ModelEntry> {
        let mut ranked: Vec<&ModelEntry> = self.list_by_family(family).collect();
        ranked.sort_by(|a, b| by_r2_desc(&a.metrics, &b.metrics));
        ranked
    }

    /// Every entry, best `test_r2` first.
    pub fn ranked_all(&self) -> Vec<&ModelEntry> {
        let mut ranked: Vec<&ModelEntry> = self.entries.iter().collect();
        ranked.sort_by(|a, b| by_r2_desc(&a.metrics, &b.metrics));
        ranked
    }
}

/// Artifacts are addressed by bare filenames inside the models directory only.
fn validate_filename(name: &str, filename: &str) -> Result<(), RegistryError> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(RegistryError::Unavailable(format!(
            "model {:?} has unsafe artifact filename {:?}",
            name, filename
        ))),
    }
}
