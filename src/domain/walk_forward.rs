//! Walk-forward controller.
//!
//! For every test index `i` the session predicts the close at `i + 1` from the
//! feature row of `i`. Models are refit on a fixed cadence, and each fit only
//! sees pairs whose target is at or before `i - 1`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::ensemble::ensemble;
use crate::domain::error::{ClosecastError, TrainingError};
use crate::domain::features::{FeatureConfig, FeatureRow, FeatureTable, build_features};
use crate::domain::models::{
    ModelConfig, ModelKind, TrainedSlot, Trainer, default_trainers, predict_one_step, train_models,
};
use crate::domain::price_bar::{PriceBar, ensure_strictly_increasing};
use crate::domain::simulator::TradingConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationConfig {
    /// Length of the held-out period, in bars.
    pub test_days: usize,
    /// Days between refits.
    pub retrain_frequency: usize,
    /// Bars that must precede the test period.
    pub min_train_days: usize,
    pub features: FeatureConfig,
    pub trading: TradingConfig,
    pub models: ModelConfig,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            test_days: 60,
            retrain_frequency: 5,
            min_train_days: 250,
            features: FeatureConfig::default(),
            trading: TradingConfig::default(),
            models: ModelConfig::default(),
        }
    }
}

impl EvaluationConfig {
    /// Bars a provider must deliver for a run to be possible.
    pub fn required_bars(&self) -> usize {
        self.min_history() + self.test_days
    }

    fn min_history(&self) -> usize {
        // Training needs at least one complete feature row with a target.
        self.min_train_days.max(self.features.min_bars() + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    /// Date of the predicted close.
    pub date: NaiveDate,
    /// Date of the feature row the prediction was made from.
    pub feature_date: NaiveDate,
    pub actual_close: f64,
    pub previous_close: f64,
    pub predictions: BTreeMap<ModelKind, f64>,
    pub ensemble_prediction: f64,
    /// Newest bar date seen by the active models during training.
    pub trained_through: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrainEvent {
    pub index: usize,
    pub date: NaiveDate,
    pub samples: usize,
    pub trained_through: NaiveDate,
    pub failures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDay {
    pub date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct WalkForwardOutcome {
    pub test_start: usize,
    pub records: Vec<PredictionRecord>,
    pub retrains: Vec<RetrainEvent>,
    pub skipped: Vec<SkippedDay>,
}

/// Training pairs for bars `first..end`: each row is paired with the next
/// bar's close. Rows at or after `end` are never read.
pub(crate) fn training_set<'a>(
    table: &'a FeatureTable,
    bars: &[PriceBar],
    end: usize,
) -> (Vec<&'a [f64]>, Vec<f64>) {
    table
        .rows_between(table.first_index, end)
        .iter()
        .map(|row| (row.values.as_slice(), bars[row.index + 1].close))
        .unzip()
}

/// Feature row of bar `i`, built only from `bars[..=i]`.
pub(crate) fn feature_row_at(
    bars: &[PriceBar],
    i: usize,
    features: &FeatureConfig,
) -> Result<FeatureRow, ClosecastError> {
    let minimum = features.min_bars();
    let visible = bars.get(..=i).unwrap_or(bars);
    let table = build_features(visible, features)?;
    table
        .rows
        .into_iter()
        .find(|row| row.index == i)
        .ok_or(ClosecastError::InsufficientData {
            bars: visible.len(),
            minimum,
        })
}

/// Owns the trainers for one evaluation request. Fitted models live only for
/// the duration of [`WalkForwardSession::run`].
pub struct WalkForwardSession {
    config: EvaluationConfig,
    trainers: Vec<Box<dyn Trainer>>,
}

impl WalkForwardSession {
    pub fn new(config: EvaluationConfig) -> Self {
        let trainers = default_trainers(&config.models);
        Self { config, trainers }
    }

    pub fn with_trainers(config: EvaluationConfig, trainers: Vec<Box<dyn Trainer>>) -> Self {
        Self { config, trainers }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// First test index for a series of `bar_count` bars.
    pub fn test_start(&self, bar_count: usize) -> Result<usize, ClosecastError> {
        let available = bar_count.saturating_sub(self.config.test_days);
        let minimum = self.config.min_history();
        if available < minimum {
            return Err(ClosecastError::InsufficientHistory { available, minimum });
        }
        Ok(available)
    }

    /// Run the test loop. Feature tables are rebuilt from `bars[..i]` for
    /// every refit and from `bars[..=i]` for every prediction, so gap filling
    /// never reaches past the bars a step may see.
    pub fn run(&self, bars: &[PriceBar]) -> Result<WalkForwardOutcome, ClosecastError> {
        let frequency = self.config.retrain_frequency;
        if frequency == 0 {
            return Err(ClosecastError::config_invalid(
                "evaluation",
                "retrain_frequency",
                "retrain_frequency must be positive",
            ));
        }
        ensure_strictly_increasing(bars)?;
        let test_start = self.test_start(bars.len())?;
        let last = bars.len() - 2;
        let features = &self.config.features;

        info!(
            bars = bars.len(),
            test_start,
            test_days = self.config.test_days,
            retrain_frequency = frequency,
            "starting walk-forward run"
        );

        let mut slots: Vec<TrainedSlot> = Vec::new();
        let mut trained_through = bars[test_start - 1].date;
        let mut records = Vec::with_capacity(bars.len() - test_start);
        let mut retrains = Vec::new();
        let mut skipped = Vec::new();

        for i in test_start..=last {
            if (i - test_start) % frequency == 0 {
                let history = &bars[..i];
                let table = build_features(history, features)?;
                let (x, y) = training_set(&table, history, i - 1);
                slots = train_models(&self.trainers, &x, &y);
                trained_through = bars[i - 1].date;

                let failures: Vec<&TrainingError> =
                    slots.iter().filter_map(|s| s.outcome.as_ref().err()).collect();
                for failure in &failures {
                    warn!(index = i, %failure, "model excluded for this retrain cycle");
                }
                if failures.len() == slots.len() {
                    return Err(ClosecastError::AllModelsFailed {
                        index: i,
                        failures: failures.into_iter().cloned().collect(),
                    });
                }
                info!(
                    index = i,
                    date = %bars[i].date,
                    samples = y.len(),
                    models = slots.len() - failures.len(),
                    "retrained"
                );
                retrains.push(RetrainEvent {
                    index: i,
                    date: bars[i].date,
                    samples: y.len(),
                    trained_through,
                    failures: failures.iter().map(|f| f.to_string()).collect(),
                });
            }

            let row = feature_row_at(bars, i, features)?;
            let predictions = predict_one_step(&slots, &row.values);
            let target = &bars[i + 1];

            let Some(ensemble_prediction) = ensemble(&predictions) else {
                warn!(index = i, date = %target.date, "no usable prediction, skipping day");
                skipped.push(SkippedDay {
                    date: target.date,
                    reason: "no model produced a finite prediction".to_string(),
                });
                continue;
            };

            let per_model: BTreeMap<ModelKind, f64> = predictions
                .iter()
                .filter_map(|p| p.value().map(|v| (p.model, v)))
                .collect();
            debug!(
                date = %target.date,
                actual = target.close,
                ensemble = ensemble_prediction,
                "prediction"
            );
            records.push(PredictionRecord {
                date: target.date,
                feature_date: row.date,
                actual_close: target.close,
                previous_close: row.close,
                predictions: per_model,
                ensemble_prediction,
                trained_through,
            });
        }

        info!(
            records = records.len(),
            retrains = retrains.len(),
            skipped = skipped.len(),
            "walk-forward run complete"
        );

        Ok(WalkForwardOutcome {
            test_start,
            records,
            retrains,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Regressor;
    use chrono::Duration;
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn small_features() -> FeatureConfig {
        FeatureConfig {
            lags: 3,
            ma_windows: vec![3],
            volatility_windows: vec![3],
            momentum_horizons: vec![1],
            volume_windows: vec![3],
        }
    }

    fn bars(n: usize) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                PriceBar {
                    date: start + Duration::days(i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000 + (i as i64 % 5) * 10,
                }
            })
            .collect()
    }

    fn config(test_days: usize, retrain_frequency: usize, min_train_days: usize) -> EvaluationConfig {
        EvaluationConfig {
            test_days,
            retrain_frequency,
            min_train_days,
            features: small_features(),
            ..EvaluationConfig::default()
        }
    }

    #[derive(Debug)]
    struct LastLag;

    impl Regressor for LastLag {
        fn predict(&self, features: &[f64]) -> f64 {
            features[0] + 1.0
        }
    }

    /// Records the number of samples of every fit.
    struct Spy {
        kind: ModelKind,
        fits: Arc<AtomicUsize>,
        max_samples: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Trainer for Spy {
        fn kind(&self) -> ModelKind {
            self.kind
        }

        fn fit(&self, x: &[&[f64]], _y: &[f64]) -> Result<Box<dyn Regressor>, TrainingError> {
            self.fits.fetch_add(1, Ordering::SeqCst);
            self.max_samples.fetch_max(x.len(), Ordering::SeqCst);
            if self.fail {
                Err(TrainingError::new(self.kind, "forced"))
            } else {
                Ok(Box::new(LastLag))
            }
        }
    }

    fn spy(kind: ModelKind, fail: bool) -> (Box<dyn Trainer>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let fits = Arc::new(AtomicUsize::new(0));
        let max_samples = Arc::new(AtomicUsize::new(0));
        let trainer = Spy {
            kind,
            fits: Arc::clone(&fits),
            max_samples: Arc::clone(&max_samples),
            fail,
        };
        (Box::new(trainer), fits, max_samples)
    }

    #[test]
    fn emits_one_record_per_predictable_day() {
        let (t, _, _) = spy(ModelKind::LinearRegression, false);
        let session = WalkForwardSession::with_trainers(config(10, 3, 20), vec![t]);
        let outcome = session.run(&bars(40)).unwrap();
        assert_eq!(outcome.test_start, 30);
        assert_eq!(outcome.records.len(), 9);
        assert!(outcome.records.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn retrains_on_cadence() {
        let (t, fits, _) = spy(ModelKind::LinearRegression, false);
        let session = WalkForwardSession::with_trainers(config(10, 3, 20), vec![t]);
        let outcome = session.run(&bars(40)).unwrap();
        // Test indices 30..=38, refit at 30, 33, 36.
        assert_eq!(fits.load(Ordering::SeqCst), 3);
        let at: Vec<usize> = outcome.retrains.iter().map(|r| r.index).collect();
        assert_eq!(at, vec![30, 33, 36]);
    }

    #[test]
    fn training_never_sees_the_test_row() {
        let (t, _, max_samples) = spy(ModelKind::LinearRegression, false);
        let session = WalkForwardSession::with_trainers(config(10, 1, 20), vec![t]);
        let outcome = session.run(&bars(40)).unwrap();
        for record in &outcome.records {
            assert!(record.trained_through < record.feature_date);
            assert!(record.feature_date < record.date);
        }
        // Last refit at index 38: rows 3..37 -> 34 samples.
        assert_eq!(max_samples.load(Ordering::SeqCst), 34);
    }

    #[test]
    fn training_set_pairs_rows_with_next_close() {
        let data = bars(12);
        let table = build_features(&data, &small_features()).unwrap();
        let (x, y) = training_set(&table, &data, 7);
        assert_eq!(x.len(), 4);
        assert_eq!(y, vec![104.0, 105.0, 106.0, 107.0]);
    }

    #[test]
    fn failed_family_is_excluded() {
        let (ok, _, _) = spy(ModelKind::LinearRegression, false);
        let (bad, _, _) = spy(ModelKind::RandomForest, true);
        let session = WalkForwardSession::with_trainers(config(10, 5, 20), vec![bad, ok]);
        let outcome = session.run(&bars(40)).unwrap();
        assert_eq!(outcome.records.len(), 9);
        for record in &outcome.records {
            assert_eq!(record.predictions.len(), 1);
            assert!(record.predictions.contains_key(&ModelKind::LinearRegression));
        }
        assert_eq!(outcome.retrains[0].failures.len(), 1);
    }

    #[test]
    fn all_families_failing_aborts() {
        let (a, _, _) = spy(ModelKind::LinearRegression, true);
        let (b, _, _) = spy(ModelKind::RandomForest, true);
        let session = WalkForwardSession::with_trainers(config(10, 5, 20), vec![a, b]);
        match session.run(&bars(40)) {
            Err(ClosecastError::AllModelsFailed { index, failures }) => {
                assert_eq!(index, 30);
                assert_eq!(failures.len(), 2);
            }
            other => panic!("expected AllModelsFailed, got {:?}", other.map(|o| o.records.len())),
        }
    }

    /// Keeps every training matrix it is handed.
    struct Recorder {
        seen: Arc<Mutex<Vec<Vec<Vec<f64>>>>>,
    }

    impl Trainer for Recorder {
        fn kind(&self) -> ModelKind {
            ModelKind::LinearRegression
        }

        fn fit(&self, x: &[&[f64]], _y: &[f64]) -> Result<Box<dyn Regressor>, TrainingError> {
            let rows = x.iter().map(|r| r.to_vec()).collect();
            self.seen.lock().unwrap().push(rows);
            Ok(Box::new(LastLag))
        }
    }

    #[test]
    fn leading_gap_is_not_filled_from_later_bars() {
        // Volume is zero until bar 35, so the volume ratio is undefined for
        // every row the first refit may see.
        let mut data = bars(40);
        for bar in data.iter_mut().take(35) {
            bar.volume = 0;
        }
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Recorder {
            seen: Arc::clone(&seen),
        };
        let session =
            WalkForwardSession::with_trainers(config(10, 10, 20), vec![Box::new(recorder)]);
        session.run(&data).unwrap();

        let seen = seen.lock().unwrap();
        let first_fit = &seen[0];
        let visible = build_features(&data[..30], &small_features()).unwrap();
        let (expected, _) = training_set(&visible, &data[..30], 29);
        assert_eq!(first_fit.len(), expected.len());
        for (row, want) in first_fit.iter().zip(&expected) {
            assert_eq!(row.as_slice(), *want);
            assert_eq!(row[6], 0.0);
        }
    }

    #[test]
    fn feature_row_needs_a_full_window() {
        let data = bars(12);
        match feature_row_at(&data, 2, &small_features()) {
            Err(ClosecastError::InsufficientData { bars, minimum }) => {
                assert_eq!(bars, 3);
                assert_eq!(minimum, 4);
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
        let row = feature_row_at(&data, 8, &small_features()).unwrap();
        assert_eq!(row.index, 8);
        assert_eq!(row.close, 108.0);
        // A bar past the series has no row.
        assert!(matches!(
            feature_row_at(&data, 20, &small_features()),
            Err(ClosecastError::InsufficientData { bars: 12, .. })
        ));
    }

    #[test]
    fn zero_retrain_frequency_is_rejected() {
        let (t, fits, _) = spy(ModelKind::LinearRegression, false);
        let session = WalkForwardSession::with_trainers(config(10, 0, 20), vec![t]);
        match session.run(&bars(40)) {
            Err(ClosecastError::ConfigInvalid { key, .. }) => assert_eq!(key, "retrain_frequency"),
            other => panic!("expected ConfigInvalid, got {:?}", other.map(|o| o.records.len())),
        }
        assert_eq!(fits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn history_boundary() {
        let session = WalkForwardSession::new(config(10, 5, 20));
        assert_eq!(session.test_start(30).unwrap(), 20);
        assert!(matches!(
            session.test_start(29),
            Err(ClosecastError::InsufficientHistory {
                available: 19,
                minimum: 20
            })
        ));
    }
}
