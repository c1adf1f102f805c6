use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use tracing::{info, warn};

use crate::registry::Family;

pub const PREDICTIONS_TOTAL: &str = "loancast_predictions_total";
pub const PREDICTION_DURATION: &str = "loancast_prediction_duration_seconds";
pub const ARTIFACT_LOADS_TOTAL: &str = "loancast_artifact_loads_total";

/// Renders the Prometheus exposition text; empty when no recorder is installed.
#[derive(Clone, Default)]
pub struct MetricsHandle {
    inner: Option<PrometheusHandle>,
}

impl MetricsHandle {
    pub fn render(&self) -> String {
        self.inner.as_ref().map(|h| h.render()).unwrap_or_default()
    }
}

/// Installs the process-wide recorder. Failure leaves metrics as no-ops.
pub fn install_recorder() -> MetricsHandle {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            ::metrics::describe_counter!(PREDICTIONS_TOTAL, "Predictions served, by model and outcome");
            ::metrics::describe_histogram!(
                PREDICTION_DURATION,
                ::metrics::Unit::Seconds,
                "Artifact load plus inference time"
            );
            ::metrics::describe_counter!(ARTIFACT_LOADS_TOTAL, "Artifact reads from disk, by outcome");
            info!("Prometheus recorder installed");
            MetricsHandle { inner: Some(handle) }
        }
        Err(e) => {
            warn!("Metrics recorder not installed: {}", e);
            MetricsHandle::default()
        }
    }
}

pub fn record_prediction(model: &str, family: Family, outcome: &'static str, elapsed: Duration) {
    ::metrics::counter!(
        PREDICTIONS_TOTAL,
        "model" => model.to_string(),
        "family" => family.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!(PREDICTION_DURATION, "family" => family.as_str()).record(elapsed.as_secs_f64());
}

pub fn record_artifact_load(outcome: &'static str) {
    ::metrics::counter!(ARTIFACT_LOADS_TOTAL, "outcome" => outcome).increment(1);
}
