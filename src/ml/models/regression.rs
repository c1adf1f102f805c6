use nalgebra::DVector;
use serde::Deserialize;
use statrs::statistics::Statistics;

use super::{ensure_finite, ensure_width, Regressor};
use crate::error::ModelError;

/// Per-feature standardization fitted alongside the estimator.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    fn validate(&self, width: usize) -> Result<(), ModelError> {
        if self.mean.len() != width || self.scale.len() != width {
            return Err(ModelError::Invalid(format!(
                "scaler expects {} features, has mean {} and scale {}",
                width,
                self.mean.len(),
                self.scale.len()
            )));
        }
        ensure_finite("scaler mean", &self.mean)?;
        ensure_finite("scaler scale", &self.scale)
    }

    fn transform(&self, features: &[f64]) -> DVector<f64> {
        DVector::from_iterator(
            features.len(),
            features
                .iter()
                .zip(self.mean.iter().zip(&self.scale))
                // zero-variance columns are centered only
                .map(|(x, (m, s))| if *s == 0.0 { x - m } else { (x - m) / s }),
        )
    }
}

fn prepare(scaler: &Option<StandardScaler>, features: &[f64]) -> DVector<f64> {
    match scaler {
        Some(scaler) => scaler.transform(features),
        None => DVector::from_column_slice(features),
    }
}

/// Ridge, Lasso, ElasticNet and plain least squares all reduce to this.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
}

impl LinearModel {
    pub(super) fn validated(self) -> Result<Self, ModelError> {
        if self.coefficients.is_empty() {
            return Err(ModelError::Invalid("linear model has no coefficients".to_string()));
        }
        ensure_finite("coefficients", &self.coefficients)?;
        ensure_finite("intercept", &[self.intercept])?;
        if let Some(scaler) = &self.scaler {
            scaler.validate(self.coefficients.len())?;
        }
        Ok(self)
    }
}

impl Regressor for LinearModel {
    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        ensure_width(self.coefficients.len(), features)?;
        let x = prepare(&self.scaler, features);
        let coefficients = DVector::from_column_slice(&self.coefficients);
        Ok(vec![coefficients.dot(&x) + self.intercept])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    #[default]
    Uniform,
    Distance,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KNearestModel {
    pub k: usize,
    pub points: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
    #[serde(default)]
    pub weights: Weighting,
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
}

impl KNearestModel {
    pub(super) fn validated(self) -> Result<Self, ModelError> {
        if self.k == 0 || self.k > self.points.len() {
            return Err(ModelError::Invalid(format!(
                "k = {} with {} training points",
                self.k,
                self.points.len()
            )));
        }
        if self.points.len() != self.targets.len() {
            return Err(ModelError::Invalid("points and targets differ in length".to_string()));
        }
        let width = self.width();
        if width == 0 || self.points.iter().any(|p| p.len() != width) {
            return Err(ModelError::Invalid("training points have ragged widths".to_string()));
        }
        for point in &self.points {
            ensure_finite("training point", point)?;
        }
        ensure_finite("targets", &self.targets)?;
        if let Some(scaler) = &self.scaler {
            scaler.validate(width)?;
        }
        Ok(self)
    }

    fn width(&self) -> usize {
        self.points.first().map(Vec::len).unwrap_or(0)
    }
}

impl Regressor for KNearestModel {
    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        ensure_width(self.width(), features)?;
        let x = prepare(&self.scaler, features);

        // training points are stored already scaled
        let mut neighbours: Vec<(f64, f64)> = self
            .points
            .iter()
            .zip(&self.targets)
            .map(|(p, &t)| ((DVector::from_column_slice(p) - &x).norm(), t))
            .collect();
        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0));
        neighbours.truncate(self.k);

        let value = match self.weights {
            Weighting::Uniform => neighbours.iter().map(|n| n.1).mean(),
            Weighting::Distance => {
                let exact: Vec<f64> = neighbours
                    .iter()
                    .filter(|n| n.0 == 0.0)
                    .map(|n| n.1)
                    .collect();
                if !exact.is_empty() {
                    exact.mean()
                } else {
                    let (weighted, total) = neighbours
                        .iter()
                        .fold((0.0, 0.0), |(s, w), (d, t)| (s + t / d, w + 1.0 / d));
                    weighted / total
                }
            }
        };
        Ok(vec![value])
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    Linear,
    Rbf { gamma: f64 },
}

/// Epsilon-SVR decision function over the stored support vectors.
#[derive(Debug, Clone, Deserialize)]
pub struct SvrModel {
    pub kernel: Kernel,
    pub support_vectors: Vec<Vec<f64>>,
    pub dual_coef: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
}

impl SvrModel {
    pub(super) fn validated(self) -> Result<Self, ModelError> {
        if self.support_vectors.is_empty() {
            return Err(ModelError::Invalid("SVR has no support vectors".to_string()));
        }
        if self.support_vectors.len() != self.dual_coef.len() {
            return Err(ModelError::Invalid(
                "support vectors and dual coefficients differ in length".to_string(),
            ));
        }
        let width = self.support_vectors[0].len();
        if width == 0 || self.support_vectors.iter().any(|v| v.len() != width) {
            return Err(ModelError::Invalid("support vectors have ragged widths".to_string()));
        }
        if let Kernel::Rbf { gamma } = self.kernel {
            if !(gamma.is_finite() && gamma > 0.0) {
                return Err(ModelError::Invalid(format!("invalid RBF gamma {}", gamma)));
            }
        }
        ensure_finite("dual coefficients", &self.dual_coef)?;
        if let Some(scaler) = &self.scaler {
            scaler.validate(width)?;
        }
        Ok(self)
    }
}

impl Regressor for SvrModel {
    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        ensure_width(self.support_vectors[0].len(), features)?;
        let x = prepare(&self.scaler, features);

        let value = self
            .support_vectors
            .iter()
            .zip(&self.dual_coef)
            .map(|(sv, alpha)| {
                let sv = DVector::from_column_slice(sv);
                let k = match self.kernel {
                    Kernel::Linear => sv.dot(&x),
                    Kernel::Rbf { gamma } => (-gamma * (sv - &x).norm_squared()).exp(),
                };
                alpha * k
            })
            .sum::<f64>()
            + self.intercept;
        Ok(vec![value])
    }
}
