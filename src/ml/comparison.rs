use super::engine::ModelPrediction;
use crate::data::HistoricalPoint;
use crate::error::ServeError;
use crate::registry::R2_SENTINEL;

/// Outcome for one requested model; a failure never affects its siblings.
#[derive(Debug)]
pub enum ComparisonItem {
    Success(ModelPrediction),
    Failure { model: String, error: ServeError },
}

impl ComparisonItem {
    pub fn from_result(model: &str, result: Result<ModelPrediction, ServeError>) -> Self {
        match result {
            Ok(prediction) => ComparisonItem::Success(prediction),
            Err(error) => ComparisonItem::Failure {
                model: model.to_string(),
                error,
            },
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ComparisonItem::Success(p) => &p.model_name,
            ComparisonItem::Failure { model, .. } => model,
        }
    }

    /// Ranking key; failures carry no metrics and rank with unscored models.
    pub fn test_r2(&self) -> f64 {
        match self {
            ComparisonItem::Success(p) => p.metrics.test_r2(),
            ComparisonItem::Failure { .. } => R2_SENTINEL,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ComparisonItem::Success(_))
    }
}

#[derive(Debug)]
pub struct Comparison {
    pub year: i32,
    pub quarter: i32,
    pub results: Vec<ComparisonItem>,
    pub historical: Vec<HistoricalPoint>,
}

/// Stable sort by `test_r2`, best first; ties keep request order.
pub fn rank(items: &mut [ComparisonItem]) {
    items.sort_by(|a, b| b.test_r2().total_cmp(&a.test_r2()));
}
