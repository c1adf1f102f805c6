use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::responses::{
    BestModel, Categories, CompareResponse, HealthResponse, ModelInfoResponse, ModelsByFamily, ModelsResponse,
    PredictResponse, StatsResponse,
};
use crate::error::ServeError;
use crate::metrics::MetricsHandle;
use crate::ml::PredictionEngine;
use crate::registry::Family;

/// `test_r2` a top-5 model needs to be recommended.
const RECOMMENDED_MIN_R2: f64 = 0.3;
const RECOMMENDED_MAX: usize = 5;
const ADVANCED_MIN_R2: f64 = 0.1;
const EXPERIMENTAL_MAX_R2: f64 = 0.0;

#[derive(Clone)]
pub struct ApiServer {
    engine: PredictionEngine,
    metrics: MetricsHandle,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub model: String,
    pub year: i32,
    pub quarter: i32,
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub models: Vec<String>,
    pub year: i32,
    pub quarter: i32,
}

impl ApiServer {
    pub fn new(engine: PredictionEngine, metrics: MetricsHandle) -> Self {
        Self { engine, metrics }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/api/models", get(get_models))
            .route("/api/model/:name", get(get_model_info))
            .route("/api/predict", post(predict))
            .route("/api/compare", post(compare))
            .route("/api/stats", get(get_statistics))
            .route("/api/health", get(health_check))
            .route("/metrics", get(render_metrics))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.clone())
    }

    pub async fn start(&self, addr: SocketAddr) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Loan sales prediction API listening on http://{}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown signal received, stopping API server");
            })
            .await?;
        Ok(())
    }
}

async fn get_models(State(server): State<ApiServer>) -> Result<Json<ModelsResponse>, ServeError> {
    let registry = server.engine.registry().get()?;
    let ml = registry.ranked(Family::PointEstimate);
    let ts = registry.ranked(Family::SequentialForecast);

    let recommended: Vec<String> = registry
        .ranked_all()
        .into_iter()
        .take(RECOMMENDED_MAX)
        .filter(|e| e.metrics.test_r2() > RECOMMENDED_MIN_R2)
        .map(|e| e.name.clone())
        .collect();

    let advanced_ml = ml
        .iter()
        .filter(|e| e.metrics.test_r2() > ADVANCED_MIN_R2 && !recommended.contains(&e.name))
        .map(|e| e.name.clone())
        .collect();

    let experimental = ml
        .iter()
        .filter(|e| e.metrics.test_r2() <= EXPERIMENTAL_MAX_R2)
        .map(|e| e.name.clone())
        .collect();

    Ok(Json(ModelsResponse {
        categories: Categories {
            time_series: ts.iter().map(|e| e.name.clone()).collect(),
            recommended,
            advanced_ml,
            experimental,
        },
        models: ModelsByFamily {
            ml: ml.iter().map(|&e| e.into()).collect(),
            ts: ts.iter().map(|&e| e.into()).collect(),
        },
        total: registry.total_models(),
    }))
}

async fn get_model_info(
    State(server): State<ApiServer>,
    Path(name): Path<String>,
) -> Result<Json<ModelInfoResponse>, ServeError> {
    let registry = server.engine.registry().get()?;
    let entry = registry.get(&name)?;
    Ok(Json(ModelInfoResponse {
        name: entry.name.clone(),
        family: entry.family,
        filename: entry.filename.clone(),
        metrics: entry.metrics.clone(),
    }))
}

async fn predict(
    State(server): State<ApiServer>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ServeError> {
    let Json(request) = payload.map_err(|e| ServeError::BadRequest(e.body_text()))?;

    let result = server
        .engine
        .predict(&request.model, request.year, request.quarter)
        .await?;
    Ok(Json(result.into()))
}

async fn compare(
    State(server): State<ApiServer>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<Json<CompareResponse>, ServeError> {
    let Json(request) = payload.map_err(|e| ServeError::BadRequest(e.body_text()))?;

    let comparison = server
        .engine
        .compare(&request.models, request.year, request.quarter)
        .await;
    Ok(Json(comparison.into()))
}

async fn get_statistics(State(server): State<ApiServer>) -> Result<Json<StatsResponse>, ServeError> {
    let registry = server.engine.registry().get()?;
    let ranked = registry.ranked_all();
    let best_of = |family: Family| ranked.iter().find(|e| e.family == family).map(|&e| BestModel::from(e));

    Ok(Json(StatsResponse {
        total_models: registry.total_models(),
        ml_models: registry.list_by_family(Family::PointEstimate).count(),
        ts_models: registry.list_by_family(Family::SequentialForecast).count(),
        best_overall: ranked.first().map(|&e| BestModel::from(e)),
        best_ml: best_of(Family::PointEstimate),
        best_ts: best_of(Family::SequentialForecast),
    }))
}

async fn health_check(State(server): State<ApiServer>) -> Json<HealthResponse> {
    let response = match server.engine.registry().get() {
        Ok(registry) => HealthResponse {
            status: "healthy",
            models_loaded: true,
            total_models: registry.total_models(),
            loaded_at: Some(registry.loaded_at()),
        },
        Err(_) => HealthResponse {
            status: "starting",
            models_loaded: false,
            total_models: 0,
            loaded_at: None,
        },
    };
    Json(response)
}

async fn render_metrics(State(server): State<ApiServer>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        server.metrics.render(),
    )
}
