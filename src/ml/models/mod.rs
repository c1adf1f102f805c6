//! Fitted estimators as written by the training pipeline.
//!
//! Every artifact is a JSON document tagged by `estimator`. Deserialization
//! yields plain parameter structs; nothing in an artifact is executed.
//! [`FittedModel`] is the only surface the rest of the service sees: a
//! point-estimate [`Regressor`] or a sequential [`Forecaster`].

mod forecasting;
mod regression;
mod tree;

pub use forecasting::{ArimaModel, HoltWinters, SeasonalMode};
pub use regression::{Kernel, KNearestModel, LinearModel, StandardScaler, SvrModel, Weighting};
pub use tree::{Aggregation, DecisionTree, TreeEnsemble, TreeNode};

use serde::Deserialize;
use std::fmt::Debug;

use crate::error::ModelError;

/// Consumes a fixed-width feature vector, returns one output per target.
pub trait Regressor: Send + Sync + Debug {
    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, ModelError>;
}

/// Carries its own fitted state and extrapolates it `steps` periods ahead.
pub trait Forecaster: Send + Sync + Debug {
    fn forecast(&self, steps: usize) -> Result<Vec<f64>, ModelError>;
}

#[derive(Debug)]
pub enum FittedModel {
    Regressor(Box<dyn Regressor>),
    Forecaster(Box<dyn Forecaster>),
}

impl FittedModel {
    pub fn capability(&self) -> &'static str {
        match self {
            FittedModel::Regressor(_) => "regressor",
            FittedModel::Forecaster(_) => "forecaster",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "estimator", rename_all = "snake_case")]
pub enum ArtifactDocument {
    Linear(LinearModel),
    DecisionTree(DecisionTree),
    TreeEnsemble(TreeEnsemble),
    KNearest(KNearestModel),
    Svr(SvrModel),
    Arima(ArimaModel),
    HoltWinters(HoltWinters),
}

impl ArtifactDocument {
    /// Checks parameter shapes and hands back the typed adapter.
    pub fn into_fitted(self) -> Result<FittedModel, ModelError> {
        let fitted = match self {
            ArtifactDocument::Linear(m) => regressor(m.validated()?),
            ArtifactDocument::DecisionTree(m) => regressor(m.validated()?),
            ArtifactDocument::TreeEnsemble(m) => regressor(m.validated()?),
            ArtifactDocument::KNearest(m) => regressor(m.validated()?),
            ArtifactDocument::Svr(m) => regressor(m.validated()?),
            ArtifactDocument::Arima(m) => forecaster(m.validated()?),
            ArtifactDocument::HoltWinters(m) => forecaster(m.validated()?),
        };
        Ok(fitted)
    }
}

fn regressor<R: Regressor + 'static>(model: R) -> FittedModel {
    FittedModel::Regressor(Box::new(model))
}

fn forecaster<F: Forecaster + 'static>(model: F) -> FittedModel {
    FittedModel::Forecaster(Box::new(model))
}

fn ensure_finite(what: &str, values: &[f64]) -> Result<(), ModelError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ModelError::Invalid(format!("{} contains non-finite values", what)))
    }
}

fn ensure_width(expected: usize, features: &[f64]) -> Result<(), ModelError> {
    if features.len() == expected {
        Ok(())
    } else {
        Err(ModelError::FeatureWidth {
            expected,
            actual: features.len(),
        })
    }
}
