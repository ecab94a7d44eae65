//! CSV file history adapter.
//!
//! Reads `<TICKER>.csv` from a base directory with the header
//! `date,open,high,low,close,volume` and ISO dates.

use crate::domain::error::ClosecastError;
use crate::domain::price_bar::PriceBar;
use crate::ports::history_port::HistoryPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }
}

fn field<'r>(record: &'r csv::StringRecord, idx: usize, name: &str) -> Result<&'r str, ClosecastError> {
    record.get(idx).ok_or_else(|| ClosecastError::DataSource {
        reason: format!("missing {} column", name),
    })
}

fn number<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
) -> Result<T, ClosecastError>
where
    T::Err: std::fmt::Display,
{
    field(record, idx, name)?
        .trim()
        .parse()
        .map_err(|e: T::Err| ClosecastError::DataSource {
            reason: format!("invalid {} value: {}", name, e),
        })
}

impl HistoryPort for CsvAdapter {
    fn get_history(&self, ticker: &str, _min_days: usize) -> Result<Vec<PriceBar>, ClosecastError> {
        let path = self.csv_path(ticker);
        if !path.exists() {
            return Err(ClosecastError::NoData {
                ticker: ticker.to_string(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|e| ClosecastError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| ClosecastError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = field(&record, 0, "date")?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                ClosecastError::DataSource {
                    reason: format!("invalid date format: {}", e),
                }
            })?;

            bars.push(PriceBar {
                date,
                open: number(&record, 1, "open")?,
                high: number(&record, 2, "high")?,
                low: number(&record, 3, "low")?,
                close: number(&record, 4, "close")?,
                volume: number(&record, 5, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}
