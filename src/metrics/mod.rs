pub mod collector;

pub use collector::{install_recorder, record_artifact_load, record_prediction, MetricsHandle};
