//! Ensemble combiner: unweighted mean over the models that produced a value.

use crate::domain::error::TrainingError;
use crate::domain::models::ModelKind;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelPrediction {
    pub model: ModelKind,
    pub outcome: Result<f64, TrainingError>,
}

impl ModelPrediction {
    pub fn value(&self) -> Option<f64> {
        self.outcome.as_ref().ok().copied()
    }
}

/// Mean of the successful predictions, or `None` when every model failed.
pub fn ensemble(predictions: &[ModelPrediction]) -> Option<f64> {
    let (sum, count) = predictions
        .iter()
        .filter_map(ModelPrediction::value)
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ok(model: ModelKind, v: f64) -> ModelPrediction {
        ModelPrediction {
            model,
            outcome: Ok(v),
        }
    }

    fn failed(model: ModelKind) -> ModelPrediction {
        ModelPrediction {
            model,
            outcome: Err(TrainingError::new(model, "boom")),
        }
    }

    #[test]
    fn mean_of_all_successes() {
        let preds = [
            ok(ModelKind::RandomForest, 100.0),
            ok(ModelKind::GradientBoosting, 102.0),
            ok(ModelKind::LinearRegression, 104.0),
        ];
        assert_abs_diff_eq!(ensemble(&preds).unwrap(), 102.0);
    }

    #[test]
    fn failures_are_excluded() {
        let preds = [
            ok(ModelKind::RandomForest, 100.0),
            failed(ModelKind::GradientBoosting),
            ok(ModelKind::LinearRegression, 110.0),
        ];
        assert_abs_diff_eq!(ensemble(&preds).unwrap(), 105.0);
    }

    #[test]
    fn none_when_all_fail() {
        let preds = [
            failed(ModelKind::RandomForest),
            failed(ModelKind::LinearRegression),
        ];
        assert_eq!(ensemble(&preds), None);
        assert_eq!(ensemble(&[]), None);
    }
}
