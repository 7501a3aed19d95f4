//! Random forest regressor
//!
//! Bagged regression trees grown in parallel. Each tree draws its bootstrap
//! sample from its own ChaCha stream seeded with `random_state + tree_idx`,
//! so a fit is reproducible regardless of thread scheduling.

use super::decision_tree::RegressionTree;
use crate::config::RandomForestParams;
use crate::error::{PredictorError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<RegressionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
    pub random_state: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
            random_state: 42,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn from_params(params: &RandomForestParams, random_state: u64) -> Self {
        Self::new(params.n_estimators)
            .with_max_depth(params.max_depth)
            .with_min_samples_split(params.min_samples_split)
            .with_min_samples_leaf(params.min_samples_leaf)
            .with_random_state(random_state)
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PredictorError::shape_mismatch(n_samples, y.len()));
        }
        if n_samples == 0 || self.n_estimators == 0 {
            return Err(PredictorError::InvalidInput(
                "Random forest needs at least one sample and one tree".to_string(),
            ));
        }

        self.n_features = x.ncols();
        let base_seed = self.random_state;

        let trees: Vec<RegressionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<RegressionTree> {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples)
                        .map(|_| (rng.next_u64() % n_samples as u64) as usize)
                        .collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);

                let mut tree = RegressionTree::new()
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf);
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.compute_feature_importances();
        Ok(())
    }

    fn compute_feature_importances(&mut self) {
        let mut total = Array1::<f64>::zeros(self.n_features);
        for importances in self.trees.iter().filter_map(|t| t.feature_importances()) {
            total += importances;
        }
        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        self.feature_importances = Some(total);
    }

    /// Mean of the per-tree predictions.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let per_tree = self.tree_predictions(x)?;
        per_tree
            .mean_axis(Axis(0))
            .ok_or(PredictorError::ModelNotFitted)
    }

    /// One row per tree, one column per sample.
    pub fn tree_predictions(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(PredictorError::ModelNotFitted);
        }

        let rows: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        let mut out = Array2::<f64>::zeros((rows.len(), x.nrows()));
        for (mut dst, src) in out.rows_mut().into_iter().zip(rows.iter()) {
            dst.assign(src);
        }
        Ok(out)
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}
