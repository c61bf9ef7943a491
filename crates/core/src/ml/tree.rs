//! CART regression tree shared by the forest and boosting families.

use serde::{Deserialize, Serialize};

use super::{check_row, ModelError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self { max_depth: 10, min_samples_split: 2, min_samples_leaf: 1 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub width: usize,
    pub root: TreeNode,
}

impl RegressionTree {
    /// Grow a tree over `indices` (duplicates allowed, for bootstrap samples).
    pub fn grow(
        rows: &[Vec<f64>],
        labels: &[f64],
        indices: &[usize],
        width: usize,
        params: TreeParams,
    ) -> Self {
        let root = build(rows, labels, indices.to_vec(), params, 0, width);
        Self { width, root }
    }

    pub fn predict(&self, row: &[f64]) -> Result<f64, ModelError> {
        check_row(row, self.width)?;
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return Ok(*value),
                TreeNode::Split { feature, threshold, left, right } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn depth_of(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        depth_of(&self.root)
    }
}

fn mean_of(labels: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|i| labels[*i]).sum::<f64>() / indices.len() as f64
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    cost: f64,
}

fn build(
    rows: &[Vec<f64>],
    labels: &[f64],
    indices: Vec<usize>,
    params: TreeParams,
    depth: usize,
    width: usize,
) -> TreeNode {
    let value = mean_of(labels, &indices);
    if depth >= params.max_depth || indices.len() < params.min_samples_split.max(2) {
        return TreeNode::Leaf { value };
    }

    let Some(best) = best_split(rows, labels, &indices, params, width) else {
        return TreeNode::Leaf { value };
    };

    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.iter().partition(|i| rows[**i][best.feature] <= best.threshold);
    if left.is_empty() || right.is_empty() {
        return TreeNode::Leaf { value };
    }

    TreeNode::Split {
        feature: best.feature,
        threshold: best.threshold,
        left: Box::new(build(rows, labels, left, params, depth + 1, width)),
        right: Box::new(build(rows, labels, right, params, depth + 1, width)),
    }
}

/// Exhaustive search for the split minimising summed squared error.
fn best_split(
    rows: &[Vec<f64>],
    labels: &[f64],
    indices: &[usize],
    params: TreeParams,
    width: usize,
) -> Option<BestSplit> {
    let n = indices.len();
    let total_sum: f64 = indices.iter().map(|i| labels[*i]).sum();
    let total_sq: f64 = indices.iter().map(|i| labels[*i] * labels[*i]).sum();
    let parent_cost = total_sq - total_sum * total_sum / n as f64;
    let min_leaf = params.min_samples_leaf.max(1);

    let mut best: Option<BestSplit> = None;
    let mut order = indices.to_vec();
    for feature in 0..width {
        order.sort_by(|a, b| rows[*a][feature].total_cmp(&rows[*b][feature]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for position in 0..n - 1 {
            let label = labels[order[position]];
            left_sum += label;
            left_sq += label * label;

            let current = rows[order[position]][feature];
            let next = rows[order[position + 1]][feature];
            if current == next {
                continue;
            }
            let left_n = position + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let cost = (left_sq - left_sum * left_sum / left_n as f64)
                + (right_sq - right_sum * right_sum / right_n as f64);

            if best.as_ref().map_or(true, |b| cost < b.cost - 1e-12) {
                best = Some(BestSplit { feature, threshold: (current + next) / 2.0, cost });
            }
        }
    }

    best.filter(|split| split.cost < parent_cost - 1e-12)
}

#[cfg(test)]
mod tests {
    use super::{RegressionTree, TreeNode, TreeParams};

    #[test]
    fn splits_a_step_function() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i)]).collect();
        let labels: Vec<f64> = (0..10).map(|i| if i < 5 { 1.0 } else { 9.0 }).collect();
        let indices: Vec<usize> = (0..10).collect();

        let tree = RegressionTree::grow(&rows, &labels, &indices, 1, TreeParams::default());

        match &tree.root {
            TreeNode::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert_eq!(*threshold, 4.5);
            }
            TreeNode::Leaf { .. } => panic!("expected a split"),
        }
        assert_eq!(tree.predict(&[2.0]).expect("predict"), 1.0);
        assert_eq!(tree.predict(&[7.0]).expect("predict"), 9.0);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn depth_limit_is_respected() {
        let rows: Vec<Vec<f64>> = (0..64).map(|i| vec![f64::from(i)]).collect();
        let labels: Vec<f64> = (0..64).map(|i| f64::from(i * i)).collect();
        let indices: Vec<usize> = (0..64).collect();
        let params = TreeParams { max_depth: 3, ..TreeParams::default() };

        let tree = RegressionTree::grow(&rows, &labels, &indices, 1, params);
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn constant_labels_produce_a_leaf() {
        let rows: Vec<Vec<f64>> = (0..5).map(|i| vec![f64::from(i)]).collect();
        let labels = vec![3.0; 5];
        let tree = RegressionTree::grow(&rows, &labels, &[0, 1, 2, 3, 4], 1, TreeParams::default());
        assert_eq!(tree.root, TreeNode::Leaf { value: 3.0 });
    }
}
