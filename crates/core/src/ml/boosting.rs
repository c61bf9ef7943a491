use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use super::{check_row, check_training_input, ModelError, Regressor};

/// Squared-loss gradient boosting over shallow regression trees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub params: TreeParams,
    pub base_prediction: f64,
    pub trees: Vec<RegressionTree>,
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            params: TreeParams { max_depth: 3, ..TreeParams::default() },
            base_prediction: 0.0,
            trees: Vec::new(),
        }
    }
}

impl Regressor for GradientBoosting {
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[f64]) -> Result<(), ModelError> {
        let width = check_training_input(rows, labels)?;
        let indices: Vec<usize> = (0..rows.len()).collect();

        self.base_prediction = labels.iter().sum::<f64>() / labels.len() as f64;
        let mut current = vec![self.base_prediction; labels.len()];
        self.trees = Vec::with_capacity(self.n_estimators);

        for _ in 0..self.n_estimators {
            // negative gradient of squared loss
            let residuals: Vec<f64> =
                labels.iter().zip(&current).map(|(label, prediction)| label - prediction).collect();
            let tree = RegressionTree::grow(rows, &residuals, &indices, width, self.params);
            for (prediction, row) in current.iter_mut().zip(rows) {
                *prediction += self.learning_rate * tree.predict(row)?;
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict(&self, row: &[f64]) -> Result<f64, ModelError> {
        let Some(first) = self.trees.first() else {
            return Err(ModelError::NotFitted);
        };
        check_row(row, first.width)?;
        let mut prediction = self.base_prediction;
        for tree in &self.trees {
            prediction += self.learning_rate * tree.predict(row)?;
        }
        Ok(prediction)
    }
}
