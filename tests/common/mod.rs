#![allow(dead_code)]

use chrono::NaiveDate;
use closecast::domain::error::ClosecastError;
use closecast::domain::models::boosting::BoostingParams;
use closecast::domain::models::forest::ForestParams;
use closecast::domain::models::tree::TreeParams;
pub use closecast::domain::price_bar::PriceBar;
use closecast::domain::walk_forward::EvaluationConfig;
use closecast::ports::history_port::HistoryPort;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::Cell;
use std::collections::HashMap;

pub struct MockHistoryPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
    pub requested: Cell<Option<usize>>,
}

impl MockHistoryPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            requested: Cell::new(None),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl HistoryPort for MockHistoryPort {
    fn get_history(&self, ticker: &str, min_days: usize) -> Result<Vec<PriceBar>, ClosecastError> {
        self.requested.set(Some(min_days));
        if let Some(reason) = self.errors.get(ticker) {
            return Err(ClosecastError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(ticker).cloned().unwrap_or_default())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Linear trend with a slow oscillation and small seeded noise on top. The
/// noise-free part follows a fixed linear recurrence, so a lag-based linear
/// model can track it while the previous close lags behind every turn.
pub fn generate_bars(count: usize, start_price: f64) -> Vec<PriceBar> {
    let start = date(2023, 1, 2);
    let mut rng = StdRng::seed_from_u64(17);
    (0..count)
        .map(|i| {
            let t = i as f64;
            let noise: f64 = rng.gen_range(-0.5..0.5);
            let close = start_price + 0.3 * t + 3.0 * (0.4 * t).sin() + noise;
            PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 100_000 + ((i % 7) as i64) * 5_000,
            }
        })
        .collect()
}

/// Default feature set with small tree ensembles so tests stay quick.
pub fn fast_config(test_days: usize, retrain_frequency: usize) -> EvaluationConfig {
    let mut config = EvaluationConfig {
        test_days,
        retrain_frequency,
        ..EvaluationConfig::default()
    };
    config.models.forest = ForestParams {
        n_trees: 20,
        tree: TreeParams {
            max_depth: 6,
            ..TreeParams::default()
        },
        ..ForestParams::default()
    };
    config.models.boosting = BoostingParams {
        n_rounds: 30,
        ..BoostingParams::default()
    };
    config
}

/// Only the linear family enabled.
pub fn linear_only(test_days: usize, retrain_frequency: usize) -> EvaluationConfig {
    let mut config = fast_config(test_days, retrain_frequency);
    config.models.random_forest = false;
    config.models.gradient_boosting = false;
    config
}

pub fn write_csv(dir: &std::path::Path, ticker: &str, bars: &[PriceBar]) {
    let mut out = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    std::fs::write(dir.join(format!("{}.csv", ticker)), out).unwrap();
}
