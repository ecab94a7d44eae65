//! Model families trained on (feature row -> next close) pairs.
//!
//! Each family implements [`Trainer`]; a fitted model is an opaque
//! [`Regressor`]. One retrain step produces a [`TrainedSlot`] per family whose
//! outcome is either the fitted model or the [`TrainingError`] that stopped it.

pub mod boosting;
pub mod forest;
pub mod linear;
pub mod tree;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::ensemble::ModelPrediction;
use crate::domain::error::TrainingError;

use boosting::{BoostingParams, GradientBoostingTrainer};
use forest::{ForestParams, RandomForestTrainer};
use linear::{LinearParams, LinearRegressionTrainer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Bagged randomized regression trees.
    RandomForest,
    /// Sequentially boosted shallow trees.
    GradientBoosting,
    /// Least-squares linear fit.
    LinearRegression,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
        ModelKind::LinearRegression,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
            ModelKind::LinearRegression => "linear_regression",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fitted model. Immutable once produced.
pub trait Regressor: Send + Sync + fmt::Debug {
    fn predict(&self, features: &[f64]) -> f64;
}

pub trait Trainer: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn fit(&self, x: &[&[f64]], y: &[f64]) -> Result<Box<dyn Regressor>, TrainingError>;
}

#[derive(Debug)]
pub struct TrainedSlot {
    pub kind: ModelKind,
    pub outcome: Result<Box<dyn Regressor>, TrainingError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub random_forest: bool,
    pub gradient_boosting: bool,
    pub linear_regression: bool,
    pub seed: u64,
    pub forest: ForestParams,
    pub boosting: BoostingParams,
    pub linear: LinearParams,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            random_forest: true,
            gradient_boosting: true,
            linear_regression: true,
            seed: 42,
            forest: ForestParams::default(),
            boosting: BoostingParams::default(),
            linear: LinearParams::default(),
        }
    }
}

impl ModelConfig {
    pub fn is_enabled(&self, kind: ModelKind) -> bool {
        match kind {
            ModelKind::RandomForest => self.random_forest,
            ModelKind::GradientBoosting => self.gradient_boosting,
            ModelKind::LinearRegression => self.linear_regression,
        }
    }
}

/// Trainers for every enabled family, in [`ModelKind::ALL`] order.
pub fn default_trainers(config: &ModelConfig) -> Vec<Box<dyn Trainer>> {
    ModelKind::ALL
        .iter()
        .filter(|kind| config.is_enabled(**kind))
        .map(|kind| -> Box<dyn Trainer> {
            match kind {
                ModelKind::RandomForest => Box::new(RandomForestTrainer {
                    params: config.forest.clone(),
                    seed: config.seed,
                }),
                ModelKind::GradientBoosting => Box::new(GradientBoostingTrainer {
                    params: config.boosting.clone(),
                    seed: config.seed,
                }),
                ModelKind::LinearRegression => Box::new(LinearRegressionTrainer {
                    params: config.linear.clone(),
                }),
            }
        })
        .collect()
}

/// Fit every trainer on the same pairs. Families train concurrently and
/// independently; slots come back in trainer order.
pub fn train_models(trainers: &[Box<dyn Trainer>], x: &[&[f64]], y: &[f64]) -> Vec<TrainedSlot> {
    trainers
        .par_iter()
        .map(|trainer| TrainedSlot {
            kind: trainer.kind(),
            outcome: trainer.fit(x, y),
        })
        .collect()
}

/// One-step prediction from each slot. Failed slots carry their training
/// error forward; a non-finite output is reported as a failure too.
pub fn predict_one_step(slots: &[TrainedSlot], x_latest: &[f64]) -> Vec<ModelPrediction> {
    slots
        .iter()
        .map(|slot| {
            let outcome = match &slot.outcome {
                Ok(model) => {
                    let value = model.predict(x_latest);
                    if value.is_finite() {
                        Ok(value)
                    } else {
                        Err(TrainingError::new(slot.kind, "non-finite prediction"))
                    }
                }
                Err(err) => Err(err.clone()),
            };
            ModelPrediction {
                model: slot.kind,
                outcome,
            }
        })
        .collect()
}

/// Shared shape checks for a training set. Returns the feature width.
pub(crate) fn check_training_set(
    kind: ModelKind,
    x: &[&[f64]],
    y: &[f64],
) -> Result<usize, TrainingError> {
    if x.is_empty() {
        return Err(TrainingError::new(kind, "empty training set"));
    }
    if x.len() != y.len() {
        return Err(TrainingError::new(
            kind,
            format!("{} rows but {} targets", x.len(), y.len()),
        ));
    }
    let width = x[0].len();
    if width == 0 {
        return Err(TrainingError::new(kind, "rows have no features"));
    }
    if x.iter().any(|row| row.len() != width) {
        return Err(TrainingError::new(kind, "ragged feature rows"));
    }
    if y.iter().any(|v| !v.is_finite()) || x.iter().any(|row| row.iter().any(|v| !v.is_finite())) {
        return Err(TrainingError::new(kind, "non-finite training values"));
    }
    Ok(width)
}
