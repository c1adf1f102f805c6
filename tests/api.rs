use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use loancast::config::Config;
use loancast::metrics::MetricsHandle;
use loancast::ml::PredictionEngine;
use loancast::registry::{Registry, RegistrySlot};
use loancast::web::ApiServer;

const TARGET: &str = "Nağd_pul_kredit_satışı";

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).unwrap();
}

fn fixture() -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let models = dir.path().join("models");
    let data = dir.path().join("data");
    fs::create_dir_all(&models).unwrap();
    fs::create_dir_all(&data).unwrap();

    let registry = json!({
        "ml_models": {
            "Ridge (α=1.0)": {"filename": "ml_Ridge_α=10.json", "type": "ml",
                "metrics": {"test_r2": 0.45, "test_mae": 100.0, "test_mape": 6.5, "train_r2": 0.9}},
            "Random Forest": {"filename": "ml_Random_Forest.json", "type": "ml",
                "metrics": {"test_r2": 0.2, "test_mae": 40.0}},
            "Broken": {"filename": "ml_Broken.json", "type": "ml",
                "metrics": {"test_r2": 0.9}},
            "Unscored": {"filename": "ml_Unscored.json", "type": "ml", "metrics": {}}
        },
        "ts_models": {
            "ARIMA(1,1,1)": {"filename": "ts_ARIMA111.json", "type": "timeseries",
                "metrics": {"test_r2": -0.1, "test_mae": 20.0}},
            "SARIMAX(1,1,1)(1,1,1,4)": {"filename": "ts_SARIMAX.json", "type": "timeseries",
                "metrics": {"test_r2": 0.05}}
        },
        "metadata": {"total_models": 6, "ml_models_count": 4, "ts_models_count": 2}
    });
    write(&models, "model_registry.json", &registry.to_string());

    write(
        &models,
        "ml_Ridge_α=10.json",
        r#"{"estimator": "linear", "coefficients": [0, 0, 0, 0, 0, 0], "intercept": 1000.0}"#,
    );
    write(
        &models,
        "ml_Random_Forest.json",
        r#"{"estimator": "tree_ensemble", "n_features": 6, "aggregation": {"method": "mean"},
            "trees": [
                [{"feature": 0, "threshold": 0.5, "left": 1, "right": 2}, {"value": 1.0}, {"value": 300.0}],
                [{"feature": 5, "threshold": 10.0, "left": 1, "right": 2}, {"value": 500.0}, {"value": 2.0}]
            ]}"#,
    );
    write(
        &models,
        "ml_Unscored.json",
        r#"{"estimator": "linear", "coefficients": [1, 1, 1, 1, 1, 1]}"#,
    );
    write(
        &models,
        "ts_ARIMA111.json",
        r#"{"estimator": "arima", "ar": [], "ma": [], "differencing": [1], "constant": 5.0,
            "history": [100.0, 110.0]}"#,
    );
    write(
        &models,
        "ts_SARIMAX.json",
        r#"{"estimator": "arima", "ar": [0.2], "differencing": [1], "history": [1.0, 2.0, 3.0],
            "exog_coefficients": [0.4]}"#,
    );

    write(&data, "pca_features.csv", "PC1,PC2,PC3,PC4,PC5,PC6\n0,0,0,0,0,0\n1,2,3,4,5,6\n");
    write(
        &data,
        "ml_ready_data.csv",
        &format!("Year,Quarter,{}\n2022,1,400.0\n2022,2,410.0\n2023,1,500.0\n2024,2,520.0\n", TARGET),
    );

    let mut config = Config::default();
    config.registry.models_dir = models;
    config.data.features_file = data.join("pca_features.csv");
    config.data.history_file = data.join("ml_ready_data.csv");
    (dir, config)
}

fn router(config: &Config, slot: Arc<RegistrySlot>) -> Router {
    let engine = PredictionEngine::new(slot, &config.data, &config.prediction);
    ApiServer::new(engine, MetricsHandle::default()).router()
}

fn loaded_router(config: &Config) -> Router {
    let slot = Arc::new(RegistrySlot::loaded(Registry::load(&config.registry).unwrap()));
    router(config, slot)
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(router: Router, uri: &str) -> (StatusCode, Value) {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post(router: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

#[tokio::test]
async fn health_reports_unloaded_registry() {
    let (_dir, config) = fixture();
    let slot = Arc::new(RegistrySlot::new());

    let (status, body) = get(router(&config, slot.clone()), "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models_loaded"], false);
    assert_eq!(body["total_models"], 0);

    let (status, body) = post(
        router(&config, slot.clone()),
        "/api/predict",
        json!({"model": "Ridge (α=1.0)", "year": 2025, "quarter": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);

    slot.install(Registry::load(&config.registry).unwrap()).unwrap();
    let (_, body) = get(router(&config, slot), "/api/health").await;
    assert_eq!(body["models_loaded"], true);
    assert_eq!(body["total_models"], 6);
}

#[tokio::test]
async fn predict_point_estimate_with_band_and_history() {
    let (_dir, config) = fixture();
    let (status, body) = post(
        loaded_router(&config),
        "/api/predict",
        json!({"model": "Ridge (α=1.0)", "year": 2025, "quarter": 1}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["type"], "ml");
    assert_eq!(body["prediction"], 1000.0);
    assert_eq!(body["prediction_formatted"], "1,000.00");
    assert_eq!(body["scenarios"]["optimistic"], 1050.0);
    assert_eq!(body["scenarios"]["base"], 1000.0);
    assert_eq!(body["scenarios"]["pessimistic"], 950.0);
    assert_eq!(body["scenarios"]["uncertainty_mape"], 6.5);
    assert_eq!(body["metrics"]["train_r2"], 0.9);

    let historical = body["historical"].as_array().unwrap();
    assert_eq!(historical.len(), 2);
    assert_eq!(historical[0]["year"], 2023);
    assert_eq!(historical[0]["sales"], 500.0);
    assert_eq!(historical[1]["year"], 2022);
    assert_eq!(historical[1]["sales_formatted"], "400.00");
}

#[tokio::test]
async fn predict_tree_ensemble_uses_latest_features() {
    let (_dir, config) = fixture();
    let (status, body) = post(
        loaded_router(&config),
        "/api/predict",
        json!({"model": "Random Forest", "year": 2030, "quarter": 3}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prediction"], 400.0);
    assert_eq!(body["historical"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn predict_sequential_forecast() {
    let (_dir, config) = fixture();
    let (status, body) = post(
        loaded_router(&config),
        "/api/predict",
        json!({"model": "ARIMA(1,1,1)", "year": 2025, "quarter": 2}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "timeseries");
    assert_eq!(body["prediction"], 115.0);
    assert_eq!(body["scenarios"]["optimistic"], 125.0);
    assert_eq!(body["historical"][0]["year"], 2024);
}

#[tokio::test]
async fn forecaster_needing_exogenous_input_is_a_400_with_note() {
    let (_dir, config) = fixture();
    let (status, body) = post(
        loaded_router(&config),
        "/api/predict",
        json!({"model": "SARIMAX(1,1,1)(1,1,1,4)", "year": 2025, "quarter": 1}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Time series prediction failed");
    assert_eq!(body["note"], "This model may require exogenous variables");
}

#[tokio::test]
async fn unknown_model_is_structured_not_found() {
    let (_dir, config) = fixture();
    let (status, body) = post(
        loaded_router(&config),
        "/api/predict",
        json!({"model": "Prophet", "year": 2025, "quarter": 1}),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Model not found");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn missing_artifact_is_a_500_with_error_body() {
    let (_dir, config) = fixture();
    let (status, body) = post(
        loaded_router(&config),
        "/api/predict",
        json!({"model": "Broken", "year": 2025, "quarter": 1}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Artifact missing"));
}

#[tokio::test]
async fn malformed_requests_are_400() {
    let (_dir, config) = fixture();
    let (status, body) = post(loaded_router(&config), "/api/predict", json!({"model": "Ridge (α=1.0)"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

}

#[tokio::test]
async fn quarters_without_history_still_predict() {
    let (_dir, config) = fixture();
    for quarter in [0, 5, -1] {
        let (status, body) = post(
            loaded_router(&config),
            "/api/predict",
            json!({"model": "Ridge (α=1.0)", "year": 2025, "quarter": quarter}),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "quarter {}", quarter);
        assert_eq!(body["quarter"], quarter);
        assert_eq!(body["prediction"], 1000.0);
        assert_eq!(body["historical"], json!([]));
    }

    let (status, body) = post(
        loaded_router(&config),
        "/api/compare",
        json!({"models": ["Ridge (α=1.0)"], "year": 2025, "quarter": 5}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["historical"], json!([]));
}

#[tokio::test]
async fn compare_keeps_partial_failures_and_ranks_by_r2() {
    let (_dir, config) = fixture();
    let (status, body) = post(
        loaded_router(&config),
        "/api/compare",
        json!({
            "models": ["ARIMA(1,1,1)", "Broken", "Ridge (α=1.0)", "Nope", "SARIMAX(1,1,1)(1,1,1,4)", "Random Forest"],
            "year": 2025,
            "quarter": 1
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 6);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 6);
    let failed: Vec<&Value> = results.iter().filter(|r| r.get("error").is_some()).collect();
    assert_eq!(failed.len(), 3);
    assert_eq!(results.iter().filter(|r| r.get("prediction").is_some()).count(), 3);

    let order: Vec<&str> = results.iter().map(|r| r["model"].as_str().unwrap()).collect();
    assert_eq!(
        order,
        vec!["Ridge (α=1.0)", "Random Forest", "ARIMA(1,1,1)", "Broken", "Nope", "SARIMAX(1,1,1)(1,1,1,4)"]
    );
    assert_eq!(body["historical"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn models_are_categorized_by_r2() {
    let (_dir, config) = fixture();
    let (status, body) = get(loaded_router(&config), "/api/models").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 6);
    assert_eq!(body["categories"]["recommended"], json!(["Broken", "Ridge (α=1.0)"]));
    assert_eq!(body["categories"]["advanced_ml"], json!(["Random Forest"]));
    assert_eq!(
        body["categories"]["time_series"],
        json!(["SARIMAX(1,1,1)(1,1,1,4)", "ARIMA(1,1,1)"])
    );
    assert_eq!(body["categories"]["experimental"], json!(["Unscored"]));

    let ml: Vec<&str> = body["models"]["ml"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(ml, vec!["Broken", "Ridge (α=1.0)", "Random Forest", "Unscored"]);
    assert_eq!(body["models"]["ts"][0]["type"], "timeseries");
}

#[tokio::test]
async fn model_info_and_not_found() {
    let (_dir, config) = fixture();
    let (status, body) = get(loaded_router(&config), "/api/model/Random%20Forest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Random Forest");
    assert_eq!(body["type"], "ml");
    assert_eq!(body["filename"], "ml_Random_Forest.json");
    assert_eq!(body["metrics"]["test_mae"], 40.0);

    let (status, body) = get(loaded_router(&config), "/api/model/Nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Model not found");
}

#[tokio::test]
async fn stats_pick_best_per_family() {
    let (_dir, config) = fixture();
    let (status, body) = get(loaded_router(&config), "/api/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_models"], 6);
    assert_eq!(body["ml_models"], 4);
    assert_eq!(body["ts_models"], 2);
    assert_eq!(body["best_overall"]["name"], "Broken");
    assert_eq!(body["best_ml"]["type"], "ML");
    assert_eq!(body["best_ts"]["name"], "SARIMAX(1,1,1)(1,1,1,4)");
    assert_eq!(body["best_ts"]["type"], "Time Series");
    assert_eq!(body["best_ts"]["mape"], 999.0);
}
