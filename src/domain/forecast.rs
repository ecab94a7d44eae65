//! Multi-day forecasts by recursive one-step prediction.
//!
//! Each step shifts the lag block of the feature vector by one day and puts the
//! newest close in `lag_1`: the real close of the latest bar first, then the
//! model's own earlier predictions. Every other feature (moving averages,
//! volatility, momentum, volume) keeps its value from the latest real bar.
//! Errors therefore compound with the horizon; treat anything past the first
//! step as a rough projection.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::ensemble::{ModelPrediction, ensemble};
use crate::domain::error::{ClosecastError, TrainingError};
use crate::domain::features::{FeatureRow, build_features};
use crate::domain::models::{ModelKind, Regressor, default_trainers, train_models};
use crate::domain::price_bar::PriceBar;
use crate::domain::walk_forward::{EvaluationConfig, training_set};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub last_date: NaiveDate,
    pub last_close: f64,
    pub horizon: usize,
    pub per_model: BTreeMap<ModelKind, Vec<f64>>,
    pub ensemble: Vec<f64>,
    pub failures: Vec<String>,
}

/// Predict `horizon` closes after `latest`, feeding each prediction back as
/// the newest lag. `lags` is the size of the leading lag block.
pub fn forecast_recursive(
    model: &dyn Regressor,
    latest: &FeatureRow,
    lags: usize,
    horizon: usize,
) -> Vec<f64> {
    let mut features = latest.values.clone();
    let lags = lags.min(features.len());
    let mut out = Vec::with_capacity(horizon);

    for step in 0..horizon {
        if step > 0 && lags > 0 {
            let newest = if step == 1 {
                latest.close
            } else {
                out[step - 2]
            };
            features.copy_within(0..lags - 1, 1);
            features[0] = newest;
        }
        out.push(model.predict(&features));
    }
    out
}

/// Fit every enabled family on all of `bars` and project `horizon` closes
/// past the last bar.
pub fn forecast_ahead(
    bars: &[PriceBar],
    config: &EvaluationConfig,
    horizon: usize,
) -> Result<Forecast, ClosecastError> {
    let table = build_features(bars, &config.features)?;
    let last = bars.len() - 1;
    let latest = table.row(last).ok_or_else(|| ClosecastError::InsufficientData {
        bars: bars.len(),
        minimum: config.features.min_bars(),
    })?;

    let (x, y) = training_set(&table, bars, last);
    let trainers = default_trainers(&config.models);
    let slots = train_models(&trainers, &x, &y);
    info!(samples = y.len(), horizon, "trained forecast models");

    let mut per_model = BTreeMap::new();
    let mut failures: Vec<TrainingError> = Vec::new();
    for slot in &slots {
        match &slot.outcome {
            Ok(model) => {
                let path = forecast_recursive(model.as_ref(), latest, config.features.lags, horizon);
                if path.iter().all(|v| v.is_finite()) {
                    per_model.insert(slot.kind, path);
                } else {
                    failures.push(TrainingError::new(slot.kind, "non-finite forecast"));
                }
            }
            Err(err) => failures.push(err.clone()),
        }
    }
    for failure in &failures {
        warn!(%failure, "model excluded from forecast");
    }
    if per_model.is_empty() {
        return Err(ClosecastError::AllModelsFailed {
            index: last,
            failures,
        });
    }

    let ensemble_path = (0..horizon)
        .filter_map(|step| {
            let at_step: Vec<ModelPrediction> = per_model
                .iter()
                .map(|(kind, path)| ModelPrediction {
                    model: *kind,
                    outcome: Ok(path[step]),
                })
                .collect();
            ensemble(&at_step)
        })
        .collect();

    Ok(Forecast {
        last_date: bars[last].date,
        last_close: bars[last].close,
        horizon,
        per_model,
        ensemble: ensemble_path,
        failures: failures.iter().map(|f| f.to_string()).collect(),
    })
}
