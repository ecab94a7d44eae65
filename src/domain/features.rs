//! Feature builder: fixed-length numeric vectors from trailing price windows.
//!
//! Every row carries, in order:
//! - lagged closes `lag_1..lag_L`
//! - simple moving averages of close (`ma_w`)
//! - rolling sample standard deviation of close (`std_w`)
//! - percentage return over a horizon (`return_hd`)
//! - volume over its rolling mean (`volume_ratio_w`)
//!
//! Every computed value for bar `i` only reads bars `0..=i`. Rows start at the
//! first index where every window is complete, so the longest window plus one
//! bar is the minimum input. Undefined values (zero denominators) are filled
//! forward, then backward, then with zero. The backward fill of a leading gap
//! reads the first defined value of the table, so a table is only as causal as
//! the slice it was built from: the walk-forward loop builds tables from the
//! bars each step may see.

use chrono::NaiveDate;

use crate::domain::error::ClosecastError;
use crate::domain::price_bar::{PriceBar, ensure_strictly_increasing};

/// Dimensionality of [`FeatureConfig::default`].
pub const DEFAULT_FEATURE_COUNT: usize = 42;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub lags: usize,
    pub ma_windows: Vec<usize>,
    pub volatility_windows: Vec<usize>,
    pub momentum_horizons: Vec<usize>,
    pub volume_windows: Vec<usize>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            lags: 30,
            ma_windows: vec![5, 10, 20, 30],
            volatility_windows: vec![5, 10, 20],
            momentum_horizons: vec![1, 5, 20],
            volume_windows: vec![5, 20],
        }
    }
}

impl FeatureConfig {
    pub fn dimension(&self) -> usize {
        self.lags
            + self.ma_windows.len()
            + self.volatility_windows.len()
            + self.momentum_horizons.len()
            + self.volume_windows.len()
    }

    /// Number of bars of history a row needs behind it.
    pub fn longest_window(&self) -> usize {
        self.ma_windows
            .iter()
            .chain(&self.volatility_windows)
            .chain(&self.momentum_horizons)
            .chain(&self.volume_windows)
            .copied()
            .fold(self.lags, usize::max)
    }

    pub fn min_bars(&self) -> usize {
        self.longest_window() + 1
    }

    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.dimension());
        names.extend((1..=self.lags).map(|k| format!("lag_{k}")));
        names.extend(self.ma_windows.iter().map(|w| format!("ma_{w}")));
        names.extend(self.volatility_windows.iter().map(|w| format!("std_{w}")));
        names.extend(self.momentum_horizons.iter().map(|h| format!("return_{h}d")));
        names.extend(self.volume_windows.iter().map(|w| format!("volume_ratio_{w}")));
        names
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// Index of the bar this row describes.
    pub index: usize,
    pub date: NaiveDate,
    pub close: f64,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub names: Vec<String>,
    pub rows: Vec<FeatureRow>,
    /// Bar index of `rows[0]`.
    pub first_index: usize,
}

impl FeatureTable {
    pub fn dimension(&self) -> usize {
        self.names.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row built for bar `index`, if that bar has one.
    pub fn row(&self, index: usize) -> Option<&FeatureRow> {
        index
            .checked_sub(self.first_index)
            .and_then(|offset| self.rows.get(offset))
    }

    /// Rows for bars in `start..end` (clamped to the table).
    pub fn rows_between(&self, start: usize, end: usize) -> &[FeatureRow] {
        let lo = start.saturating_sub(self.first_index).min(self.rows.len());
        let hi = end.saturating_sub(self.first_index).min(self.rows.len());
        if lo >= hi { &[] } else { &self.rows[lo..hi] }
    }
}

pub fn build_features(
    bars: &[PriceBar],
    config: &FeatureConfig,
) -> Result<FeatureTable, ClosecastError> {
    let minimum = config.min_bars();
    if bars.len() < minimum {
        return Err(ClosecastError::InsufficientData {
            bars: bars.len(),
            minimum,
        });
    }
    ensure_strictly_increasing(bars)?;

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();
    let first = config.longest_window();
    let indices = first..bars.len();

    let mut columns: Vec<Vec<Option<f64>>> = Vec::with_capacity(config.dimension());
    for k in 1..=config.lags {
        columns.push(indices.clone().map(|i| Some(closes[i - k])).collect());
    }
    for &w in &config.ma_windows {
        columns.push(indices.clone().map(|i| mean(window(&closes, i, w))).collect());
    }
    for &w in &config.volatility_windows {
        columns.push(
            indices
                .clone()
                .map(|i| sample_stddev(window(&closes, i, w)))
                .collect(),
        );
    }
    for &h in &config.momentum_horizons {
        columns.push(
            indices
                .clone()
                .map(|i| ratio(closes[i], closes[i - h]).map(|r| r - 1.0))
                .collect(),
        );
    }
    for &w in &config.volume_windows {
        columns.push(
            indices
                .clone()
                .map(|i| mean(window(&volumes, i, w)).and_then(|avg| ratio(volumes[i], avg)))
                .collect(),
        );
    }

    let columns: Vec<Vec<f64>> = columns.into_iter().map(fill_gaps).collect();
    let dimension = config.dimension();

    let rows = indices
        .enumerate()
        .map(|(offset, i)| {
            let values: Vec<f64> = columns.iter().map(|col| col[offset]).collect();
            assert_eq!(values.len(), dimension, "feature row width drifted");
            FeatureRow {
                index: i,
                date: bars[i].date,
                close: closes[i],
                values,
            }
        })
        .collect();

    Ok(FeatureTable {
        names: config.names(),
        rows,
        first_index: first,
    })
}

/// Trailing window of `len` values ending at (and including) `end`.
fn window(values: &[f64], end: usize, len: usize) -> &[f64] {
    &values[end + 1 - len..=end]
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    finite(values.iter().sum::<f64>() / values.len() as f64)
}

fn sample_stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let avg = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (n - 1.0);
    finite(variance.sqrt())
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        finite(numerator / denominator)
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Forward fill, then backward fill, then zero.
fn fill_gaps(column: Vec<Option<f64>>) -> Vec<f64> {
    let mut filled = column;
    let mut last = None;
    for slot in filled.iter_mut() {
        match slot {
            Some(v) => last = Some(*v),
            None => *slot = last,
        }
    }
    let mut next = None;
    for slot in filled.iter_mut().rev() {
        match slot {
            Some(v) => next = Some(*v),
            None => *slot = next,
        }
    }
    filled.into_iter().map(|v| v.unwrap_or(0.0)).collect()
}
