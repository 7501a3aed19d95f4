//! Regression tree (CART, squared-error criterion)
//!
//! Nodes live in a flat arena so that deep trees serialize without nesting.

use crate::error::{PredictorError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: usize,
        right: usize,
        n_samples: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for RegressionTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Best split found for one node
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    /// Reduction in the sum of squared errors
    gain: f64,
}

impl RegressionTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PredictorError::shape_mismatch(n_samples, y.len()));
        }
        if n_samples == 0 {
            return Err(PredictorError::InvalidInput(
                "Cannot fit a tree on zero samples".to_string(),
            ));
        }

        self.n_features = x.ncols();
        self.nodes.clear();

        let mut importances = vec![0.0; self.n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        self.build(x, y, indices, 0, &mut importances);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|imp| *imp /= total);
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    /// Grow the subtree for `indices` and return its node id.
    fn build(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        importances: &mut [f64],
    ) -> usize {
        let n_samples = indices.len();
        let (sum, sq_sum) = indices
            .iter()
            .fold((0.0, 0.0), |(s, sq), &i| (s + y[i], sq + y[i] * y[i]));
        let mean = sum / n_samples as f64;
        let first = y[indices[0]];
        let is_pure = indices.iter().all(|&i| (y[i] - first).abs() < 1e-10);

        let stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure;

        let split = if stop {
            None
        } else {
            self.best_split(x, y, &indices, sum, sq_sum)
        };

        let Some(split) = split else {
            self.nodes.push(TreeNode::Leaf {
                value: mean,
                n_samples,
            });
            return self.nodes.len() - 1;
        };

        importances[split.feature_idx] += split.gain;

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[[i, split.feature_idx]] <= split.threshold);

        let node_id = self.nodes.len();
        // Placeholder, patched once both children exist
        self.nodes.push(TreeNode::Leaf {
            value: mean,
            n_samples,
        });
        let left = self.build(x, y, left_idx, depth + 1, importances);
        let right = self.build(x, y, right_idx, depth + 1, importances);
        self.nodes[node_id] = TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
            n_samples,
        };
        node_id
    }

    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        total_sum: f64,
        total_sq: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.min_samples_leaf;
        let parent_sse = total_sq - total_sum * total_sum / n as f64;

        (0..self.n_features)
            .into_par_iter()
            .filter_map(|feature_idx| {
                let mut order: Vec<(f64, f64)> =
                    indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                order.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut left_sum = 0.0;
                let mut left_sq = 0.0;
                let mut best: Option<(f64, f64)> = None;

                for k in 0..n - 1 {
                    let (xv, yv) = order[k];
                    left_sum += yv;
                    left_sq += yv * yv;

                    let n_left = k + 1;
                    let n_right = n - n_left;
                    if n_left < min_leaf || n_right < min_leaf || xv >= order[k + 1].0 {
                        continue;
                    }

                    let right_sum = total_sum - left_sum;
                    let right_sq = total_sq - left_sq;
                    let child_sse = (left_sq - left_sum * left_sum / n_left as f64)
                        + (right_sq - right_sum * right_sum / n_right as f64);
                    let gain = parent_sse - child_sse;

                    if best.map_or(true, |(g, _)| gain > g) {
                        best = Some((gain, (xv + order[k + 1].0) / 2.0));
                    }
                }

                best.filter(|(gain, _)| *gain > 0.0)
                    .map(|(gain, threshold)| SplitCandidate {
                        feature_idx,
                        threshold,
                        gain,
                    })
            })
            .collect::<Vec<_>>()
            .into_iter()
            // lowest feature index wins ties
            .fold(None, |acc: Option<SplitCandidate>, cand| match acc {
                Some(a) if a.gain > cand.gain || (a.gain == cand.gain && a.feature_idx < cand.feature_idx) => Some(a),
                _ => Some(cand),
            })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.nodes.is_empty() {
            return Err(PredictorError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PredictorError::Shape {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        // Node 0 is always the root
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn get_depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        self.depth_of(0)
    }

    fn depth_of(&self, node: usize) -> usize {
        match &self.nodes[node] {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + self.depth_of(*left).max(self.depth_of(*right)),
        }
    }

    pub fn get_n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regressor_fits_step() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![10.0, 10.0, 10.0, 30.0, 30.0, 30.0];

        let mut tree = RegressionTree::new();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
        assert_eq!(tree.get_depth(), 2);
        assert_eq!(tree.get_n_leaves(), 2);

        let unseen = tree.predict(&array![[3.4], [3.6]]).unwrap();
        assert_eq!(unseen[0], 10.0);
        assert_eq!(unseen[1], 30.0);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

        let mut tree = RegressionTree::new().with_max_depth(Some(2));
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 3);
        assert!(tree.get_n_leaves() <= 4);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = RegressionTree::new();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = RegressionTree::new();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(PredictorError::ModelNotFitted)));
    }
}
