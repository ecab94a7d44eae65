//! Evaluation report assembled from a walk-forward outcome.
//!
//! Numbers are rounded once, here: prices and currency to 2 places,
//! percentages to 2 places, ratios to 4 places. Maps are ordered so the JSON
//! rendering of a report is stable.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::error::ClosecastError;
use crate::domain::metrics::{
    AccuracyMetrics, DirectionalBreakdown, compute_metrics, directional_breakdown, round_to,
};
use crate::domain::models::ModelKind;
use crate::domain::simulator::{SimulationResult, TradingConfig, simulate};
use crate::domain::walk_forward::{PredictionRecord, RetrainEvent, SkippedDay, WalkForwardOutcome};

pub const ENSEMBLE_KEY: &str = "ensemble";
pub const BASELINE_KEY: &str = "naive_previous_close";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelReport {
    /// Days on which this model produced a prediction.
    pub days: usize,
    pub metrics: AccuracyMetrics,
    pub directional: DirectionalBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestBy {
    pub mape: String,
    pub mae: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub ticker: String,
    pub test_period: TestPeriod,
    pub models: BTreeMap<String, ModelReport>,
    pub baseline: ModelReport,
    pub trading: Option<SimulationResult>,
    pub best_model: String,
    pub best_by: BestBy,
    pub predictions: Vec<PredictionRecord>,
    pub retrains: Vec<RetrainEvent>,
    pub skipped_days: Vec<SkippedDay>,
}

fn score(actuals: &[f64], predictions: &[f64]) -> Result<ModelReport, ClosecastError> {
    Ok(ModelReport {
        days: actuals.len(),
        metrics: compute_metrics(actuals, predictions)?,
        directional: directional_breakdown(actuals, predictions)?,
    })
}

fn lowest_by(models: &BTreeMap<String, ModelReport>, key: impl Fn(&AccuracyMetrics) -> f64) -> String {
    models
        .iter()
        .min_by(|a, b| key(&a.1.metrics).total_cmp(&key(&b.1.metrics)))
        .map(|(name, _)| name.clone())
        .unwrap_or_default()
}

pub fn build_report(
    ticker: &str,
    outcome: &WalkForwardOutcome,
    trading: &TradingConfig,
) -> Result<EvaluationReport, ClosecastError> {
    let records = &outcome.records;
    let (first, last) = match (records.first(), records.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(ClosecastError::EmptySeries),
    };

    let actuals: Vec<f64> = records.iter().map(|r| r.actual_close).collect();
    let ensemble: Vec<f64> = records.iter().map(|r| r.ensemble_prediction).collect();
    let previous: Vec<f64> = records.iter().map(|r| r.previous_close).collect();

    let mut models = BTreeMap::new();
    for kind in ModelKind::ALL {
        let (a, p): (Vec<f64>, Vec<f64>) = records
            .iter()
            .filter_map(|r| r.predictions.get(&kind).map(|p| (r.actual_close, *p)))
            .unzip();
        if !a.is_empty() {
            models.insert(kind.name().to_string(), score(&a, &p)?);
        }
    }
    models.insert(ENSEMBLE_KEY.to_string(), score(&actuals, &ensemble)?);
    let baseline = score(&actuals, &previous)?;

    let trading = if records.len() >= 2 {
        Some(simulate(&ensemble, &actuals, trading)?)
    } else {
        None
    };

    let best_by = BestBy {
        mape: lowest_by(&models, |m| m.mape),
        mae: lowest_by(&models, |m| m.mae),
    };

    let report = EvaluationReport {
        ticker: ticker.to_string(),
        test_period: TestPeriod {
            start_date: first.date,
            end_date: last.date,
            days: records.len(),
        },
        models,
        baseline,
        trading,
        best_model: best_by.mape.clone(),
        best_by,
        predictions: records.clone(),
        retrains: outcome.retrains.clone(),
        skipped_days: outcome.skipped.clone(),
    };
    Ok(report.rounded())
}

fn money(v: f64) -> f64 {
    round_to(v, 2)
}

fn percent(v: f64) -> f64 {
    round_to(v, 2)
}

fn ratio(v: f64) -> f64 {
    round_to(v, 4)
}

impl ModelReport {
    fn rounded(mut self) -> Self {
        let m = &mut self.metrics;
        m.mae = money(m.mae);
        m.rmse = money(m.rmse);
        m.mape = percent(m.mape);
        m.r_squared = ratio(m.r_squared);
        m.directional_accuracy = ratio(m.directional_accuracy);
        self
    }
}

impl EvaluationReport {
    fn rounded(mut self) -> Self {
        self.models = self
            .models
            .into_iter()
            .map(|(name, report)| (name, report.rounded()))
            .collect();
        self.baseline = self.baseline.rounded();

        if let Some(t) = self.trading.as_mut() {
            t.initial_capital = money(t.initial_capital);
            t.final_value = money(t.final_value);
            t.total_return = percent(t.total_return);
            t.buy_hold_return = percent(t.buy_hold_return);
            t.outperformance = percent(t.outperformance);
            t.sharpe_ratio = ratio(t.sharpe_ratio);
            t.max_drawdown = percent(t.max_drawdown);
            t.portfolio_curve.iter_mut().for_each(|v| *v = money(*v));
            for trade in &mut t.trades {
                trade.price = money(trade.price);
                trade.shares = ratio(trade.shares);
            }
        }

        for record in &mut self.predictions {
            record.actual_close = money(record.actual_close);
            record.previous_close = money(record.previous_close);
            record.ensemble_prediction = money(record.ensemble_prediction);
            record.predictions.values_mut().for_each(|v| *v = money(*v));
        }
        self
    }
}
