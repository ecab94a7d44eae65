//! Domain error types.

use crate::domain::models::ModelKind;

/// One model family failed to fit (or to produce a usable prediction).
///
/// Never fatal on its own: the failing slot is excluded from the ensemble for
/// the affected retrain cycle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{model} failed: {reason}")]
pub struct TrainingError {
    pub model: ModelKind,
    pub reason: String,
}

impl TrainingError {
    pub fn new(model: ModelKind, reason: impl Into<String>) -> Self {
        Self {
            model,
            reason: reason.into(),
        }
    }
}

/// Top-level error type for closecast.
#[derive(Debug, thiserror::Error)]
pub enum ClosecastError {
    #[error("insufficient data: have {bars} bars, need {minimum}")]
    InsufficientData { bars: usize, minimum: usize },

    #[error("insufficient history: {available} days before the test period, need {minimum}")]
    InsufficientHistory { available: usize, minimum: usize },

    #[error("all model families failed to train at index {index} ({} failures)", .failures.len())]
    AllModelsFailed {
        index: usize,
        failures: Vec<TrainingError>,
    },

    #[error("MAPE undefined: actual value at position {index} is zero")]
    DivisionByZeroMetric { index: usize },

    #[error("empty series")]
    EmptySeries,

    #[error("length mismatch: {actuals} actuals vs {predictions} predictions")]
    LengthMismatch { actuals: usize, predictions: usize },

    #[error("too few predictions: have {count}, need {minimum}")]
    TooFewPredictions { count: usize, minimum: usize },

    #[error("bar dates not strictly increasing at index {index}")]
    UnorderedDates { index: usize },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClosecastError {
    pub(crate) fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        ClosecastError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&ClosecastError> for std::process::ExitCode {
    fn from(err: &ClosecastError) -> Self {
        let code: u8 = match err {
            ClosecastError::Io(_) | ClosecastError::Serialization(_) => 1,
            ClosecastError::ConfigParse { .. } | ClosecastError::ConfigInvalid { .. } => 2,
            ClosecastError::NoData { .. }
            | ClosecastError::DataSource { .. }
            | ClosecastError::UnorderedDates { .. } => 3,
            ClosecastError::AllModelsFailed { .. } => 4,
            ClosecastError::InsufficientData { .. }
            | ClosecastError::InsufficientHistory { .. } => 5,
            ClosecastError::DivisionByZeroMetric { .. }
            | ClosecastError::EmptySeries
            | ClosecastError::LengthMismatch { .. }
            | ClosecastError::TooFewPredictions { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
