use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::artifact::ArtifactLoader;
use super::comparison::{rank, Comparison, ComparisonItem};
use super::predictor::PredictionDispatcher;
use super::scenario::ScenarioBand;
use crate::config::{DataConfig, PredictionConfig};
use crate::data::{FeatureProvisioner, HistoricalPoint, HistoricalStore};
use crate::error::{PredictionError, ServeError};
use crate::metrics;
use crate::registry::{Family, Metrics, RegistrySlot};

/// One model's decision-ready output.
#[derive(Debug, Clone)]
pub struct ModelPrediction {
    pub model_name: String,
    pub family: Family,
    pub point_value: f64,
    pub scenario: ScenarioBand,
    pub metrics: Metrics,
}

#[derive(Debug, Clone)]
pub struct PredictionResult {
    pub year: i32,
    pub quarter: i32,
    pub prediction: ModelPrediction,
    pub historical: Vec<HistoricalPoint>,
}

/// Registry lookup, artifact load, dispatch and scenario band, per request.
///
/// Holds no per-request state. Blocking work runs on the blocking pool so a
/// slow artifact never stalls unrelated requests.
#[derive(Clone)]
pub struct PredictionEngine {
    registry: Arc<RegistrySlot>,
    loader: Arc<ArtifactLoader>,
    dispatcher: Arc<PredictionDispatcher>,
    history: HistoricalStore,
    config: PredictionConfig,
}

impl PredictionEngine {
    pub fn new(registry: Arc<RegistrySlot>, data: &DataConfig, config: &PredictionConfig) -> Self {
        info!(
            "Prediction engine ready (timeout {} ms, artifact cache {})",
            config.timeout_ms,
            if config.cache_artifacts { "on" } else { "off" }
        );

        Self {
            registry,
            loader: Arc::new(ArtifactLoader::new(config.cache_artifacts)),
            dispatcher: Arc::new(PredictionDispatcher::new(FeatureProvisioner::new(data))),
            history: HistoricalStore::new(data),
            config: config.clone(),
        }
    }

    pub fn registry(&self) -> &RegistrySlot {
        &self.registry
    }

    /// Runs one model end to end, without historical context.
    pub async fn evaluate(&self, name: &str) -> Result<ModelPrediction, ServeError> {
        let registry = self.registry.get()?;
        let entry = registry.get(name)?.clone();
        let family = entry.family;
        let started = Instant::now();

        let task = {
            let loader = self.loader.clone();
            let dispatcher = self.dispatcher.clone();
            let entry = entry.clone();
            tokio::task::spawn_blocking(move || {
                let model = loader.load(&registry, &entry)?;
                dispatcher.predict(&entry, &model)
            })
        };

        let outcome = match tokio::time::timeout(self.config.timeout(), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(PredictionError::failed(family, format!("inference task aborted: {}", e)).into()),
            Err(_) => Err(PredictionError::failed(
                family,
                format!("timed out after {} ms", self.config.timeout_ms),
            )
            .into()),
        };

        let elapsed = started.elapsed();
        let point = match outcome {
            Ok(point) => {
                metrics::record_prediction(&entry.name, family, "ok", elapsed);
                point
            }
            Err(e) => {
                metrics::record_prediction(&entry.name, family, "error", elapsed);
                warn!("Prediction with {} failed: {}", entry.name, e);
                return Err(e);
            }
        };

        debug!("{} answered in {:?}", entry.name, elapsed);
        Ok(ModelPrediction {
            scenario: ScenarioBand::from_prediction(point, &entry.metrics),
            model_name: entry.name,
            family,
            point_value: point,
            metrics: entry.metrics,
        })
    }

    /// Same-quarter actuals for the configured number of prior years.
    pub async fn historical(&self, year: i32, quarter: i32) -> Vec<HistoricalPoint> {
        let history = self.history.clone();
        let years_back = self.config.history_years;
        match tokio::task::spawn_blocking(move || history.lookup(year, quarter, years_back)).await {
            Ok(points) => points,
            Err(e) => {
                warn!("Historical lookup aborted: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn predict(&self, name: &str, year: i32, quarter: i32) -> Result<PredictionResult, ServeError> {
        let span = info_span!("predict", request_id = %Uuid::new_v4(), model = name, year, quarter);
        async {
            let (prediction, historical) = tokio::join!(self.evaluate(name), self.historical(year, quarter));
            let prediction = prediction?;
            info!("Predicted {:.2} with {}", prediction.point_value, prediction.model_name);

            Ok::<_, ServeError>(PredictionResult {
                year,
                quarter,
                prediction,
                historical,
            })
        }
        .instrument(span)
        .await
    }

    /// Evaluates every requested model concurrently; the result has one item
    /// per requested name, ranked by `test_r2`.
    pub async fn compare(&self, names: &[String], year: i32, quarter: i32) -> Comparison {
        let span = info_span!("compare", request_id = %Uuid::new_v4(), models = names.len(), year, quarter);
        async {
            let evaluations = join_all(names.iter().map(|name| async move {
                ComparisonItem::from_result(name, self.evaluate(name).await)
            }));
            let (mut results, historical) = tokio::join!(evaluations, self.historical(year, quarter));
            rank(&mut results);

            let failed = results.iter().filter(|r| !r.is_success()).count();
            info!("Compared {} models ({} failed)", results.len(), failed);

            Comparison {
                year,
                quarter,
                results,
                historical,
            }
        }
        .instrument(span)
        .await
    }
}
