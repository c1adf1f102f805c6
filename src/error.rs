use thiserror::Error;

use crate::registry::Family;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    #[error("Registry already loaded")]
    AlreadyLoaded,
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Artifact missing: {0}")]
    Missing(String),

    #[error("Artifact corrupt: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Feature source unavailable: {0}")]
    SourceUnavailable(String),
}

/// Raised by a fitted estimator while producing output.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("expected {expected} features, got {actual}")]
    FeatureWidth { expected: usize, actual: usize },

    #[error("model requires {0} exogenous regressors to forecast")]
    MissingExogenous(usize),

    #[error("model produced a non-finite value")]
    NonFinite,

    #[error("{0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Prediction unsupported: {0}")]
    Unsupported(String),

    #[error("Prediction failed: {message}")]
    Failed {
        message: String,
        family: Family,
    },
}

impl PredictionError {
    pub fn failed(family: Family, message: impl Into<String>) -> Self {
        PredictionError::Failed {
            message: message.into(),
            family,
        }
    }

    /// Sequential forecasters commonly fail for want of auxiliary regressors.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            PredictionError::Failed {
                family: Family::SequentialForecast,
                ..
            } => Some("This model may require exogenous variables"),
            _ => None,
        }
    }
}

/// Every failure a single request can run into.
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Service unavailable: model registry not loaded")]
    ServiceUnavailable,

    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Prediction(#[from] PredictionError),
}
