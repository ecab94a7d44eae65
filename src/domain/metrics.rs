//! Accuracy metrics over paired (actual, predicted) series.

use serde::Serialize;

use crate::domain::error::ClosecastError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Mean absolute percentage error, in percent.
    pub mape: f64,
    pub r_squared: f64,
    /// Fraction of consecutive pairs whose direction was called correctly.
    pub directional_accuracy: f64,
}

/// Confusion counts for up/down calls. A move is "up" only when strictly
/// positive; flat counts as down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectionalBreakdown {
    pub correct_up: usize,
    pub correct_down: usize,
    pub false_up: usize,
    pub false_down: usize,
}

impl DirectionalBreakdown {
    pub fn total(&self) -> usize {
        self.correct_up + self.correct_down + self.false_up + self.false_down
    }

    pub fn correct(&self) -> usize {
        self.correct_up + self.correct_down
    }
}

fn check_pairs(actuals: &[f64], predictions: &[f64]) -> Result<(), ClosecastError> {
    if actuals.len() != predictions.len() {
        return Err(ClosecastError::LengthMismatch {
            actuals: actuals.len(),
            predictions: predictions.len(),
        });
    }
    if actuals.is_empty() {
        return Err(ClosecastError::EmptySeries);
    }
    Ok(())
}

pub fn compute_metrics(
    actuals: &[f64],
    predictions: &[f64],
) -> Result<AccuracyMetrics, ClosecastError> {
    check_pairs(actuals, predictions)?;
    if let Some(index) = actuals.iter().position(|a| *a == 0.0) {
        return Err(ClosecastError::DivisionByZeroMetric { index });
    }

    let n = actuals.len() as f64;
    let errors: Vec<f64> = actuals
        .iter()
        .zip(predictions)
        .map(|(a, p)| a - p)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let ss_res: f64 = errors.iter().map(|e| e * e).sum();
    let rmse = (ss_res / n).sqrt();
    let mape = errors
        .iter()
        .zip(actuals)
        .map(|(e, a)| (e / a).abs())
        .sum::<f64>()
        / n
        * 100.0;

    let mean = actuals.iter().sum::<f64>() / n;
    let ss_tot: f64 = actuals.iter().map(|a| (a - mean).powi(2)).sum();
    let r_squared = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    let breakdown = directional_breakdown(actuals, predictions)?;
    let directional_accuracy = if breakdown.total() == 0 {
        0.0
    } else {
        breakdown.correct() as f64 / breakdown.total() as f64
    };

    Ok(AccuracyMetrics {
        mae,
        rmse,
        mape,
        r_squared,
        directional_accuracy,
    })
}

/// Compare the sign of each consecutive change in `predictions` with the
/// matching change in `actuals`.
pub fn directional_breakdown(
    actuals: &[f64],
    predictions: &[f64],
) -> Result<DirectionalBreakdown, ClosecastError> {
    check_pairs(actuals, predictions)?;
    let mut out = DirectionalBreakdown::default();
    for (a, p) in actuals.windows(2).zip(predictions.windows(2)) {
        let actual_up = a[1] - a[0] > 0.0;
        let predicted_up = p[1] - p[0] > 0.0;
        match (predicted_up, actual_up) {
            (true, true) => out.correct_up += 1,
            (false, false) => out.correct_down += 1,
            (true, false) => out.false_up += 1,
            (false, true) => out.false_down += 1,
        }
    }
    Ok(out)
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    let rounded = (value * scale).round() / scale;
    // Avoid "-0.0" in serialized output.
    if rounded == 0.0 { 0.0 } else { rounded }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn hand_computed_example() {
        let m = compute_metrics(&[100.0, 102.0, 101.0], &[100.0, 101.0, 103.0]).unwrap();
        assert_abs_diff_eq!(m.mae, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.directional_accuracy, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(m.rmse, (5.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        let mape = (1.0 / 102.0 + 2.0 / 101.0) / 3.0 * 100.0;
        assert_abs_diff_eq!(m.mape, mape, epsilon = 1e-12);
    }

    #[test]
    fn perfect_predictions() {
        let a = [10.0, 11.0, 12.5, 12.0];
        let m = compute_metrics(&a, &a).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mape, 0.0);
        assert_eq!(m.r_squared, 1.0);
        assert_eq!(m.directional_accuracy, 1.0);
    }

    #[test]
    fn r_squared_of_mean_predictor_is_zero() {
        let a = [1.0, 2.0, 3.0];
        let m = compute_metrics(&a, &[2.0, 2.0, 2.0]).unwrap();
        assert_abs_diff_eq!(m.r_squared, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn constant_actuals() {
        let a = [5.0, 5.0];
        assert_eq!(compute_metrics(&a, &a).unwrap().r_squared, 1.0);
        assert_eq!(compute_metrics(&a, &[4.0, 6.0]).unwrap().r_squared, 0.0);
    }

    #[test]
    fn single_point_has_zero_directional_accuracy() {
        let m = compute_metrics(&[50.0], &[51.0]).unwrap();
        assert_eq!(m.directional_accuracy, 0.0);
        assert_abs_diff_eq!(m.mae, 1.0);
    }

    #[test]
    fn zero_actual_fails_mape() {
        match compute_metrics(&[1.0, 0.0, 2.0], &[1.0, 1.0, 1.0]) {
            Err(ClosecastError::DivisionByZeroMetric { index }) => assert_eq!(index, 1),
            other => panic!("expected DivisionByZeroMetric, got {:?}", other),
        }
    }

    #[test]
    fn shape_errors() {
        assert!(matches!(
            compute_metrics(&[], &[]),
            Err(ClosecastError::EmptySeries)
        ));
        assert!(matches!(
            compute_metrics(&[1.0], &[1.0, 2.0]),
            Err(ClosecastError::LengthMismatch {
                actuals: 1,
                predictions: 2
            })
        ));
    }

    #[test]
    fn breakdown_counts() {
        // actual: up, down, flat, up ; predicted: up, up, down, down
        let actuals = [10.0, 11.0, 10.5, 10.5, 11.0];
        let preds = [10.0, 10.2, 10.4, 10.1, 10.0];
        let b = directional_breakdown(&actuals, &preds).unwrap();
        assert_eq!(
            b,
            DirectionalBreakdown {
                correct_up: 1,
                correct_down: 1,
                false_up: 1,
                false_down: 1,
            }
        );
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(-0.0001, 2), 0.0);
        assert_eq!(round_to(2.5, 0), 3.0);
    }
}
