use serde::Deserialize;
use statrs::statistics::Statistics;

use super::{ensure_finite, ensure_width, Regressor};
use crate::error::ModelError;

/// One node of a flattened binary regression tree; node 0 is the root.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

fn validate_nodes(nodes: &[TreeNode], n_features: usize) -> Result<(), ModelError> {
    if nodes.is_empty() {
        return Err(ModelError::Invalid("tree has no nodes".to_string()));
    }
    for (i, node) in nodes.iter().enumerate() {
        match *node {
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if feature >= n_features {
                    return Err(ModelError::Invalid(format!(
                        "node {} splits on feature {} of {}",
                        i, feature, n_features
                    )));
                }
                // children always follow their parent, which rules out cycles
                if left <= i || right <= i || left >= nodes.len() || right >= nodes.len() {
                    return Err(ModelError::Invalid(format!(
                        "node {} has out-of-order children {} and {}",
                        i, left, right
                    )));
                }
                ensure_finite("threshold", &[threshold])?;
            }
            TreeNode::Leaf { value } => ensure_finite("leaf value", &[value])?,
        }
    }
    Ok(())
}

fn evaluate(nodes: &[TreeNode], features: &[f64]) -> f64 {
    let mut index = 0;
    loop {
        match nodes[index] {
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                index = if features[feature] <= threshold { left } else { right };
            }
            TreeNode::Leaf { value } => return value,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTree {
    pub n_features: usize,
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub(super) fn validated(self) -> Result<Self, ModelError> {
        validate_nodes(&self.nodes, self.n_features)?;
        Ok(self)
    }
}

impl Regressor for DecisionTree {
    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        ensure_width(self.n_features, features)?;
        Ok(vec![evaluate(&self.nodes, features)])
    }
}

/// How per-tree outputs combine into one prediction.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Aggregation {
    /// Bagged forests.
    Mean,
    /// Gradient boosting: `base_score + learning_rate * sum(trees)`.
    Boosted { base_score: f64, learning_rate: f64 },
    /// AdaBoost.R2.
    WeightedMedian { weights: Vec<f64> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeEnsemble {
    pub n_features: usize,
    pub trees: Vec<Vec<TreeNode>>,
    pub aggregation: Aggregation,
}

impl TreeEnsemble {
    pub(super) fn validated(self) -> Result<Self, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("ensemble has no trees".to_string()));
        }
        for nodes in &self.trees {
            validate_nodes(nodes, self.n_features)?;
        }
        match &self.aggregation {
            Aggregation::Mean => {}
            Aggregation::Boosted {
                base_score,
                learning_rate,
            } => ensure_finite("boosting parameters", &[*base_score, *learning_rate])?,
            Aggregation::WeightedMedian { weights } => {
                if weights.len() != self.trees.len() {
                    return Err(ModelError::Invalid(format!(
                        "{} estimator weights for {} trees",
                        weights.len(),
                        self.trees.len()
                    )));
                }
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(ModelError::Invalid("negative estimator weight".to_string()));
                }
            }
        }
        Ok(self)
    }
}

impl Regressor for TreeEnsemble {
    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        ensure_width(self.n_features, features)?;
        let outputs: Vec<f64> = self.trees.iter().map(|t| evaluate(t, features)).collect();

        let value = match &self.aggregation {
            Aggregation::Mean => outputs.mean(),
            Aggregation::Boosted {
                base_score,
                learning_rate,
            } => base_score + learning_rate * outputs.iter().sum::<f64>(),
            Aggregation::WeightedMedian { weights } => weighted_median(&outputs, weights),
        };
        Ok(vec![value])
    }
}

/// Smallest output whose cumulative weight reaches half the total.
fn weighted_median(outputs: &[f64], weights: &[f64]) -> f64 {
    let mut order: Vec<usize> = (0..outputs.len()).collect();
    order.sort_by(|&a, &b| outputs[a].total_cmp(&outputs[b]));

    let half = weights.iter().sum::<f64>() / 2.0;
    let mut cumulative = 0.0;
    for &i in &order {
        cumulative += weights[i];
        if cumulative >= half {
            return outputs[i];
        }
    }
    outputs[order[order.len() - 1]]
}
