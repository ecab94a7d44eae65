//! Ordinary least squares on standardized features.
//!
//! Lag and moving-average columns are close to collinear, so the normal
//! equations carry a small ridge term scaled by the row count. The solve is a
//! Cholesky factorisation; a non-positive pivot is reported as a training
//! failure rather than a panic.

use super::{ModelKind, Regressor, Trainer, check_training_set};
use crate::domain::error::TrainingError;

#[derive(Debug, Clone, PartialEq)]
pub struct LinearParams {
    /// Ridge penalty per training row, applied in standardized units.
    pub ridge: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        LinearParams { ridge: 1e-6 }
    }
}

#[derive(Debug, Clone)]
pub struct LinearRegressionTrainer {
    pub params: LinearParams,
}

#[derive(Debug, Clone)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl Regressor for LinearModel {
    fn predict(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, v)| c * v)
                .sum::<f64>()
    }
}

impl Trainer for LinearRegressionTrainer {
    fn kind(&self) -> ModelKind {
        ModelKind::LinearRegression
    }

    fn fit(&self, x: &[&[f64]], y: &[f64]) -> Result<Box<dyn Regressor>, TrainingError> {
        let width = check_training_set(self.kind(), x, y)?;
        let n = x.len() as f64;

        let means: Vec<f64> = (0..width)
            .map(|j| x.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        // Constant columns get scale 0 and drop out of the solve.
        let scales: Vec<f64> = (0..width)
            .map(|j| {
                let var = x.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / n;
                let sd = var.sqrt();
                if sd > 1e-12 { sd } else { 0.0 }
            })
            .collect();
        let y_mean = y.iter().sum::<f64>() / n;

        let standardize = |row: &[f64], j: usize| -> f64 {
            if scales[j] == 0.0 {
                0.0
            } else {
                (row[j] - means[j]) / scales[j]
            }
        };

        let lambda = self.params.ridge * n;
        let mut gram = vec![vec![0.0; width]; width];
        let mut rhs = vec![0.0; width];
        let mut z = vec![0.0; width];
        for (row, target) in x.iter().zip(y) {
            for (j, zj) in z.iter_mut().enumerate() {
                *zj = standardize(row, j);
            }
            let centered = target - y_mean;
            for a in 0..width {
                rhs[a] += z[a] * centered;
                for b in 0..=a {
                    gram[a][b] += z[a] * z[b];
                }
            }
        }
        for a in 0..width {
            for b in 0..a {
                gram[b][a] = gram[a][b];
            }
            gram[a][a] += if scales[a] == 0.0 { 1.0 } else { lambda };
        }

        let beta = cholesky_solve(gram, &rhs)
            .ok_or_else(|| TrainingError::new(self.kind(), "normal equations are singular"))?;

        let coefficients: Vec<f64> = beta
            .iter()
            .zip(&scales)
            .map(|(b, s)| if *s == 0.0 { 0.0 } else { b / s })
            .collect();
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&means)
                .map(|(c, m)| c * m)
                .sum::<f64>();

        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(TrainingError::new(self.kind(), "non-finite coefficients"));
        }
        Ok(Box::new(LinearModel {
            intercept,
            coefficients,
        }))
    }
}

/// Solve `a * x = b` for symmetric positive definite `a`.
fn cholesky_solve(mut a: Vec<Vec<f64>>, b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    for j in 0..n {
        let diag = a[j][j];
        let mut d = diag;
        for k in 0..j {
            d -= a[j][k] * a[j][k];
        }
        if d.is_nan() || d <= 1e-12 * diag.abs().max(1.0) {
            return None;
        }
        let d = d.sqrt();
        a[j][j] = d;
        for i in (j + 1)..n {
            let mut s = a[i][j];
            for k in 0..j {
                s -= a[i][k] * a[j][k];
            }
            a[i][j] = s / d;
        }
    }

    let mut fwd = vec![0.0; n];
    for i in 0..n {
        let s: f64 = (0..i).map(|k| a[i][k] * fwd[k]).sum();
        fwd[i] = (b[i] - s) / a[i][i];
    }
    let mut out = vec![0.0; n];
    for i in (0..n).rev() {
        let s: f64 = ((i + 1)..n).map(|k| a[k][i] * out[k]).sum();
        out[i] = (fwd[i] - s) / a[i][i];
    }
    Some(out)
}
