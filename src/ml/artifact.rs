//! Loads fitted models from disk.
//!
//! This is the one place artifact bytes are interpreted. Paths come only from
//! registry entries, whose filenames are checked at registry load; request
//! data never reaches this module except as a registry-validated name.

use dashmap::DashMap;
use std::fs;
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{ArtifactDocument, FittedModel};
use crate::error::ArtifactError;
use crate::metrics;
use crate::registry::{ModelEntry, Registry};

struct CachedArtifact {
    registry_id: Uuid,
    model: Arc<FittedModel>,
}

pub struct ArtifactLoader {
    cache: Option<DashMap<String, CachedArtifact>>,
}

impl ArtifactLoader {
    pub fn new(cache_artifacts: bool) -> Self {
        Self {
            cache: cache_artifacts.then(DashMap::new),
        }
    }

    /// Returns the fitted model for `entry`, reusing a cached copy only if it
    /// was loaded under the same registry.
    pub fn load(
        &self,
        registry: &Registry,
        entry: &ModelEntry,
    ) -> Result<Arc<FittedModel>, ArtifactError> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&entry.name) {
                if cached.registry_id == registry.id() {
                    debug!("Artifact cache hit for {}", entry.name);
                    return Ok(cached.model.clone());
                }
            }
        }

        let model = Arc::new(read_artifact(entry)?);

        if let Some(cache) = &self.cache {
            cache.insert(
                entry.name.clone(),
                CachedArtifact {
                    registry_id: registry.id(),
                    model: model.clone(),
                },
            );
        }
        Ok(model)
    }

    #[cfg(test)]
    pub(crate) fn preload(&self, registry: &Registry, name: &str, model: FittedModel) {
        if let Some(cache) = &self.cache {
            cache.insert(
                name.to_string(),
                CachedArtifact {
                    registry_id: registry.id(),
                    model: Arc::new(model),
                },
            );
        }
    }
}

fn read_artifact(entry: &ModelEntry) -> Result<FittedModel, ArtifactError> {
    let path = &entry.artifact_ref;
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            metrics::record_artifact_load("missing");
            return Err(ArtifactError::Missing(format!(
                "{} ({})",
                entry.name,
                path.display()
            )));
        }
        Err(e) => {
            metrics::record_artifact_load("corrupt");
            return Err(ArtifactError::Corrupt(format!("{}: {}", entry.name, e)));
        }
    };

    let fitted = serde_json::from_slice::<ArtifactDocument>(&bytes)
        .map_err(|e| e.to_string())
        .and_then(|doc| doc.into_fitted().map_err(|e| e.to_string()))
        .map_err(|reason| {
            metrics::record_artifact_load("corrupt");
            ArtifactError::Corrupt(format!("{}: {}", entry.name, reason))
        })?;

    metrics::record_artifact_load("ok");
    info!("Loaded {} artifact for {}", fitted.capability(), entry.name);
    Ok(fitted)
}
