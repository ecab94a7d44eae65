//! Gradient boosting with squared loss. Each round fits a shallow tree to the
//! current residuals on a row and column subsample, then adds it scaled by
//! the learning rate.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;

use super::forest::subset_size;
use super::tree::{RegressionTree, TreeParams};
use super::{ModelKind, Regressor, Trainer, check_training_set};
use crate::domain::error::TrainingError;

#[derive(Debug, Clone, PartialEq)]
pub struct BoostingParams {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub tree: TreeParams,
    /// Row fraction drawn without replacement per round.
    pub subsample: f64,
    /// Column fraction drawn per round.
    pub colsample: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        BoostingParams {
            n_rounds: 100,
            learning_rate: 0.1,
            tree: TreeParams {
                max_depth: 5,
                min_samples_split: 2,
                min_samples_leaf: 1,
            },
            subsample: 0.8,
            colsample: 0.8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GradientBoostingTrainer {
    pub params: BoostingParams,
    pub seed: u64,
}

#[derive(Debug)]
pub struct GradientBoosting {
    base: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl Regressor for GradientBoosting {
    fn predict(&self, features: &[f64]) -> f64 {
        self.trees.iter().fold(self.base, |acc, tree| {
            acc + self.learning_rate * tree.predict(features)
        })
    }
}

impl Trainer for GradientBoostingTrainer {
    fn kind(&self) -> ModelKind {
        ModelKind::GradientBoosting
    }

    fn fit(&self, x: &[&[f64]], y: &[f64]) -> Result<Box<dyn Regressor>, TrainingError> {
        let width = check_training_set(self.kind(), x, y)?;
        let n = x.len();
        let params = &self.params;

        let base = y.iter().sum::<f64>() / n as f64;
        let mut fitted = vec![base; n];
        let mut residuals = vec![0.0; n];
        let rows_per_round = subset_size(n, params.subsample);
        let cols_per_round = subset_size(width, params.colsample);
        let mut trees = Vec::with_capacity(params.n_rounds);

        for round in 0..params.n_rounds {
            for ((r, target), f) in residuals.iter_mut().zip(y).zip(&fitted) {
                *r = target - f;
            }
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(round as u64));
            let mut samples = index::sample(&mut rng, n, rows_per_round).into_vec();
            samples.sort_unstable();
            let mut features = index::sample(&mut rng, width, cols_per_round).into_vec();
            features.sort_unstable();

            let tree = RegressionTree::fit(x, &residuals, &samples, &features, &params.tree);
            for (f, row) in fitted.iter_mut().zip(x) {
                *f += params.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        if !base.is_finite() || fitted.iter().any(|v| !v.is_finite()) {
            return Err(TrainingError::new(self.kind(), "boosting diverged"));
        }

        Ok(Box::new(GradientBoosting {
            base,
            learning_rate: params.learning_rate,
            trees,
        }))
    }
}
