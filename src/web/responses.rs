use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::HistoricalPoint;
use crate::error::{PredictionError, ServeError};
use crate::format::format_amount;
use crate::ml::{Comparison, ComparisonItem, ModelPrediction, PredictionResult, ScenarioBand};
use crate::registry::{Family, Metrics, ModelEntry};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub success: bool,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            note: None,
            detail: None,
            success: false,
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ServeError::ServiceUnavailable => (StatusCode::SERVICE_UNAVAILABLE, ErrorBody::new(self.to_string())),
            ServeError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorBody::new("Model not found")),
            ServeError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorBody::new(self.to_string())),
            ServeError::Prediction(e @ PredictionError::Failed { .. }) if e.hint().is_some() => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "Time series prediction failed".to_string(),
                    note: e.hint(),
                    detail: Some(e.to_string()),
                    success: false,
                },
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::new(self.to_string())),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub family: Family,
    pub metrics: Metrics,
}

impl From<&ModelEntry> for ModelSummary {
    fn from(entry: &ModelEntry) -> Self {
        Self {
            name: entry.name.clone(),
            family: entry.family,
            metrics: entry.metrics.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Categories {
    pub recommended: Vec<String>,
    pub advanced_ml: Vec<String>,
    pub time_series: Vec<String>,
    pub experimental: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ModelsByFamily {
    pub ml: Vec<ModelSummary>,
    pub ts: Vec<ModelSummary>,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub categories: Categories,
    pub models: ModelsByFamily,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub name: String,
    #[serde(rename = "type")]
    pub family: Family,
    pub filename: String,
    pub metrics: Metrics,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    pub model: String,
    pub year: i32,
    pub quarter: i32,
    pub prediction: f64,
    pub prediction_formatted: String,
    pub scenarios: ScenarioBand,
    pub historical: Vec<HistoricalPoint>,
    pub metrics: Metrics,
    #[serde(rename = "type")]
    pub family: Family,
}

impl From<PredictionResult> for PredictResponse {
    fn from(result: PredictionResult) -> Self {
        let p = result.prediction;
        Self {
            success: true,
            prediction_formatted: format_amount(p.point_value),
            model: p.model_name,
            year: result.year,
            quarter: result.quarter,
            prediction: p.point_value,
            scenarios: p.scenario,
            historical: result.historical,
            metrics: p.metrics,
            family: p.family,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ComparisonEntry {
    Success {
        model: String,
        prediction: f64,
        prediction_formatted: String,
        scenarios: ScenarioBand,
        metrics: Metrics,
        #[serde(rename = "type")]
        family: Family,
    },
    Failure {
        model: String,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<&'static str>,
        success: bool,
    },
}

impl From<ComparisonItem> for ComparisonEntry {
    fn from(item: ComparisonItem) -> Self {
        match item {
            ComparisonItem::Success(ModelPrediction {
                model_name,
                family,
                point_value,
                scenario,
                metrics,
            }) => ComparisonEntry::Success {
                model: model_name,
                prediction: point_value,
                prediction_formatted: format_amount(point_value),
                scenarios: scenario,
                metrics,
                family,
            },
            ComparisonItem::Failure { model, error } => {
                let note = match &error {
                    ServeError::Prediction(e) => e.hint(),
                    _ => None,
                };
                ComparisonEntry::Failure {
                    model,
                    error: error.to_string(),
                    note,
                    success: false,
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub success: bool,
    pub year: i32,
    pub quarter: i32,
    pub results: Vec<ComparisonEntry>,
    pub historical: Vec<HistoricalPoint>,
    pub count: usize,
}

impl From<Comparison> for CompareResponse {
    fn from(comparison: Comparison) -> Self {
        let results: Vec<ComparisonEntry> = comparison.results.into_iter().map(Into::into).collect();
        Self {
            success: true,
            year: comparison.year,
            quarter: comparison.quarter,
            count: results.len(),
            results,
            historical: comparison.historical,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BestModel {
    pub name: String,
    #[serde(rename = "type")]
    pub label: &'static str,
    pub r2: f64,
    pub mape: f64,
}

impl From<&ModelEntry> for BestModel {
    fn from(entry: &ModelEntry) -> Self {
        Self {
            name: entry.name.clone(),
            label: entry.family.label(),
            r2: entry.metrics.test_r2(),
            mape: entry.metrics.test_mape(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_models: usize,
    pub ml_models: usize,
    pub ts_models: usize,
    pub best_overall: Option<BestModel>,
    pub best_ml: Option<BestModel>,
    pub best_ts: Option<BestModel>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub models_loaded: bool,
    pub total_models: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ArtifactError, PredictionError};

    fn status_of(error: ServeError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(status_of(ServeError::ServiceUnavailable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(ServeError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ArtifactError::Corrupt("x".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(PredictionError::failed(Family::SequentialForecast, "boom").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(PredictionError::failed(Family::PointEstimate, "boom").into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn failure_entry_keeps_model_and_hint() {
        let item = ComparisonItem::Failure {
            model: "SARIMAX".to_string(),
            error: PredictionError::failed(Family::SequentialForecast, "needs exog").into(),
        };
        let json = serde_json::to_value(ComparisonEntry::from(item)).unwrap();
        assert_eq!(json["model"], "SARIMAX");
        assert_eq!(json["success"], false);
        assert_eq!(json["note"], "This model may require exogenous variables");
        assert!(json.get("prediction").is_none());
    }
}
