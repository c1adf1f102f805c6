pub mod artifact;
pub mod comparison;
pub mod engine;
pub mod models;
pub mod predictor;
pub mod scenario;

pub use artifact::ArtifactLoader;
pub use comparison::{Comparison, ComparisonItem};
pub use engine::{ModelPrediction, PredictionEngine, PredictionResult};
pub use models::{FittedModel, Forecaster, Regressor};
pub use predictor::PredictionDispatcher;
pub use scenario::ScenarioBand;
