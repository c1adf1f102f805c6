use tracing::debug;

use super::models::FittedModel;
use crate::data::FeatureProvisioner;
use crate::error::{ModelError, PredictionError, ServeError};
use crate::registry::{Family, ModelEntry};

/// Turns one fitted model into one scalar, according to its family's contract.
#[derive(Debug, Clone)]
pub struct PredictionDispatcher {
    features: FeatureProvisioner,
}

impl PredictionDispatcher {
    pub fn new(features: FeatureProvisioner) -> Self {
        Self { features }
    }

    pub fn predict(&self, entry: &ModelEntry, model: &FittedModel) -> Result<f64, ServeError> {
        let family = entry.family;
        let failed = |e: ModelError| PredictionError::failed(family, e.to_string());

        let value = match (family, model) {
            (Family::PointEstimate, FittedModel::Regressor(regressor)) => {
                let features = self.features.current_features()?;
                let output = regressor.predict(&features).map_err(failed)?;
                // single-target regressors: the first output is the prediction
                output
                    .first()
                    .copied()
                    .ok_or_else(|| PredictionError::failed(family, "model returned no output"))?
            }
            (Family::SequentialForecast, FittedModel::Forecaster(forecaster)) => {
                let output = forecaster.forecast(1).map_err(failed)?;
                output
                    .last()
                    .copied()
                    .ok_or_else(|| PredictionError::failed(family, "model returned an empty forecast"))?
            }
            (family, model) => {
                return Err(PredictionError::Unsupported(format!(
                    "{} is registered as {} but its artifact is a {}",
                    entry.name,
                    family,
                    model.capability()
                ))
                .into())
            }
        };

        if !value.is_finite() {
            return Err(failed(ModelError::NonFinite).into());
        }
        debug!("{} predicted {}", entry.name, value);
        Ok(value)
    }
}
