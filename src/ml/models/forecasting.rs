use serde::Deserialize;

use super::{ensure_finite, Forecaster};
use crate::error::ModelError;

/// ARIMA-family forecaster.
///
/// Seasonal multiplicative terms are expanded by the training pipeline into
/// dense `ar`/`ma` lag polynomials (index 0 is lag 1), and every differencing
/// operation, regular or seasonal, is listed by lag in `differencing`.
#[derive(Debug, Clone, Deserialize)]
pub struct ArimaModel {
    #[serde(default)]
    pub ar: Vec<f64>,
    #[serde(default)]
    pub ma: Vec<f64>,
    #[serde(default)]
    pub differencing: Vec<usize>,
    #[serde(default)]
    pub constant: f64,
    /// Observed series in levels, oldest first.
    pub history: Vec<f64>,
    /// In-sample one-step errors on the differenced scale, aligned to its end.
    #[serde(default)]
    pub residuals: Vec<f64>,
    /// Non-empty for SARIMAX fits; those need future regressors to forecast.
    #[serde(default)]
    pub exog_coefficients: Vec<f64>,
}

impl ArimaModel {
    pub(super) fn validated(self) -> Result<Self, ModelError> {
        ensure_finite("history", &self.history)?;
        ensure_finite("ar", &self.ar)?;
        ensure_finite("ma", &self.ma)?;
        ensure_finite("residuals", &self.residuals)?;
        ensure_finite("constant", &[self.constant])?;
        if self.differencing.iter().any(|&lag| lag == 0) {
            return Err(ModelError::Invalid("differencing lag of 0".to_string()));
        }

        let consumed: usize = self.differencing.iter().sum();
        let available = self.history.len().saturating_sub(consumed);
        if available == 0 || available < self.ar.len() {
            return Err(ModelError::Invalid(format!(
                "history of {} points is too short for {} AR lags after differencing by {:?}",
                self.history.len(),
                self.ar.len(),
                self.differencing
            )));
        }
        Ok(self)
    }

    /// `levels[0]` is the history, `levels[k]` its k-th difference.
    fn difference_levels(&self) -> Vec<Vec<f64>> {
        let mut levels = vec![self.history.clone()];
        for &lag in &self.differencing {
            let previous = &levels[levels.len() - 1];
            let next: Vec<f64> = (lag..previous.len())
                .map(|t| previous[t] - previous[t - lag])
                .collect();
            levels.push(next);
        }
        levels
    }
}

impl Forecaster for ArimaModel {
    fn forecast(&self, steps: usize) -> Result<Vec<f64>, ModelError> {
        if !self.exog_coefficients.is_empty() {
            return Err(ModelError::MissingExogenous(self.exog_coefficients.len()));
        }

        let mut levels = self.difference_levels();
        let mut residuals = self.residuals.clone();
        let mut forecasts = Vec::with_capacity(steps);

        for _ in 0..steps {
            let top = &levels[levels.len() - 1];
            let mut next = self.constant;
            for (j, phi) in self.ar.iter().enumerate() {
                next += phi * top[top.len() - 1 - j];
            }
            for (j, theta) in self.ma.iter().enumerate() {
                if let Some(e) = residuals.len().checked_sub(j + 1).map(|i| residuals[i]) {
                    next += theta * e;
                }
            }
            residuals.push(0.0);

            // integrate back up through each differencing lag
            let mut value = next;
            for k in (0..levels.len()).rev() {
                if k < levels.len() - 1 {
                    let lag = self.differencing[k];
                    let below = &levels[k];
                    value += below[below.len() - lag];
                }
                levels[k].push(value);
            }
            forecasts.push(value);
        }

        if forecasts.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite);
        }
        Ok(forecasts)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalMode {
    #[default]
    Additive,
    Multiplicative,
}

fn no_damping() -> f64 {
    1.0
}

/// Final smoothed state of a Holt-Winters fit.
///
/// `seasonal[0]` is the factor for the first forecast period.
#[derive(Debug, Clone, Deserialize)]
pub struct HoltWinters {
    pub level: f64,
    #[serde(default)]
    pub trend: Option<f64>,
    #[serde(default = "no_damping")]
    pub damping: f64,
    #[serde(default)]
    pub seasonal: Vec<f64>,
    #[serde(default)]
    pub seasonal_mode: SeasonalMode,
}

impl HoltWinters {
    pub(super) fn validated(self) -> Result<Self, ModelError> {
        ensure_finite("level", &[self.level])?;
        ensure_finite("trend", &[self.trend.unwrap_or(0.0)])?;
        ensure_finite("seasonal", &self.seasonal)?;
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(ModelError::Invalid(format!(
                "damping {} outside (0, 1]",
                self.damping
            )));
        }
        Ok(self)
    }

    /// `phi + phi^2 + ... + phi^h`, which is `h` without damping.
    fn trend_multiplier(&self, h: usize) -> f64 {
        (1..=h).map(|i| self.damping.powi(i as i32)).sum()
    }
}

impl Forecaster for HoltWinters {
    fn forecast(&self, steps: usize) -> Result<Vec<f64>, ModelError> {
        let forecasts: Vec<f64> = (1..=steps)
            .map(|h| {
                let base = self.level + self.trend.unwrap_or(0.0) * self.trend_multiplier(h);
                if self.seasonal.is_empty() {
                    return base;
                }
                let season = self.seasonal[(h - 1) % self.seasonal.len()];
                match self.seasonal_mode {
                    SeasonalMode::Additive => base + season,
                    SeasonalMode::Multiplicative => base * season,
                }
            })
            .collect();

        if forecasts.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite);
        }
        Ok(forecasts)
    }
}
