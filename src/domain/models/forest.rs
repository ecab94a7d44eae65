//! Random forest regressor: bootstrap-bagged trees with per-tree feature
//! subsets, averaged at prediction time.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::tree::{RegressionTree, TreeParams};
use super::{ModelKind, Regressor, Trainer, check_training_set};
use crate::domain::error::TrainingError;

#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub tree: TreeParams,
    pub bootstrap: bool,
    /// Fraction of feature columns each tree may split on, in (0, 1].
    pub max_features: f64,
}

impl Default for ForestParams {
    fn default() -> Self {
        ForestParams {
            n_trees: 100,
            tree: TreeParams::default(),
            bootstrap: true,
            max_features: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForestTrainer {
    pub params: ForestParams,
    pub seed: u64,
}

#[derive(Debug)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl Regressor for RandomForest {
    fn predict(&self, features: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        sum / self.trees.len() as f64
    }
}

/// Number of columns to draw from `width` for a fraction in (0, 1].
pub(crate) fn subset_size(width: usize, fraction: f64) -> usize {
    ((width as f64 * fraction).ceil() as usize).clamp(1, width)
}

impl Trainer for RandomForestTrainer {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn fit(&self, x: &[&[f64]], y: &[f64]) -> Result<Box<dyn Regressor>, TrainingError> {
        let width = check_training_set(self.kind(), x, y)?;
        if self.params.n_trees == 0 {
            return Err(TrainingError::new(self.kind(), "n_trees must be positive"));
        }
        let n = x.len();
        let k = subset_size(width, self.params.max_features);

        let trees: Vec<RegressionTree> = (0..self.params.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(t as u64));
                let samples: Vec<usize> = if self.params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                let mut features = if k == width {
                    (0..width).collect()
                } else {
                    index::sample(&mut rng, width, k).into_vec()
                };
                features.sort_unstable();
                RegressionTree::fit(x, y, &samples, &features, &self.params.tree)
            })
            .collect();

        Ok(Box::new(RandomForest { trees }))
    }
}
