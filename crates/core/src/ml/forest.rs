use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use super::{check_row, check_training_input, ModelError, Regressor};

/// Bagged regression trees averaged at prediction time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_trees: usize,
    pub params: TreeParams,
    pub seed: u64,
    pub trees: Vec<RegressionTree>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::with_seed(42)
    }
}

impl RandomForest {
    pub const DEFAULT_TREES: usize = 100;
    pub const DEFAULT_MAX_DEPTH: usize = 10;

    pub fn with_seed(seed: u64) -> Self {
        Self {
            n_trees: Self::DEFAULT_TREES,
            params: TreeParams { max_depth: Self::DEFAULT_MAX_DEPTH, ..TreeParams::default() },
            seed,
            trees: Vec::new(),
        }
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[f64]) -> Result<(), ModelError> {
        let width = check_training_input(rows, labels)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let n = rows.len();

        self.trees = (0..self.n_trees.max(1))
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::grow(rows, labels, &sample, width, self.params)
            })
            .collect();
        Ok(())
    }

    fn predict(&self, row: &[f64]) -> Result<f64, ModelError> {
        let Some(first) = self.trees.first() else {
            return Err(ModelError::NotFitted);
        };
        check_row(row, first.width)?;
        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.predict(row)?;
        }
        Ok(total / self.trees.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::RandomForest;
    use crate::ml::{ModelError, Regressor};

    fn dataset() -> (Vec<Vec<f64>>, Vec<f64>) {
        let rows: Vec<Vec<f64>> =
            (0..40).map(|i| vec![f64::from(i) / 40.0, f64::from((i * 7) % 11) / 11.0]).collect();
        let labels = rows.iter().map(|r| 50.0 * r[0] - 10.0 * r[1]).collect();
        (rows, labels)
    }

    #[test]
    fn same_seed_same_forest() {
        let (rows, labels) = dataset();
        let mut first = RandomForest::with_seed(11);
        let mut second = RandomForest::with_seed(11);
        first.fit(&rows, &labels).expect("fit");
        second.fit(&rows, &labels).expect("fit");

        assert_eq!(first, second);
        assert_eq!(first.trees.len(), RandomForest::DEFAULT_TREES);
    }

    #[test]
    fn predictions_stay_within_label_range() {
        let (rows, labels) = dataset();
        let mut forest = RandomForest::with_seed(3);
        forest.fit(&rows, &labels).expect("fit");

        let min = labels.iter().copied().fold(f64::INFINITY, f64::min);
        let max = labels.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for row in &rows {
            let prediction = forest.predict(row).expect("predict");
            assert!(prediction >= min && prediction <= max);
        }
    }

    #[test]
    fn unfitted_forest_refuses_to_predict() {
        assert_eq!(RandomForest::default().predict(&[0.0, 0.0]), Err(ModelError::NotFitted));
    }
}
