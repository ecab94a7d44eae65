//! Daily price bar representation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::error::ClosecastError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Fail with `UnorderedDates` at the first bar whose date does not strictly
/// follow its predecessor.
pub fn ensure_strictly_increasing(bars: &[PriceBar]) -> Result<(), ClosecastError> {
    match bars.windows(2).position(|w| w[1].date <= w[0].date) {
        Some(pos) => Err(ClosecastError::UnorderedDates { index: pos + 1 }),
        None => Ok(()),
    }
}
