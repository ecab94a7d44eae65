//! Price history provider port.

use crate::domain::error::ClosecastError;
use crate::domain::price_bar::PriceBar;

pub trait HistoryPort {
    /// Daily bars for `ticker` in ascending date order. `min_days` is the
    /// number of bars the caller needs; providers may return more. An empty
    /// result is not an error at this layer.
    fn get_history(&self, ticker: &str, min_days: usize) -> Result<Vec<PriceBar>, ClosecastError>;
}
