//! Evaluation entry point: fetch history, run the walk-forward session and
//! assemble the report.

use tracing::info;

use crate::domain::config_validation::validate_evaluation_config;
use crate::domain::error::ClosecastError;
use crate::domain::price_bar::PriceBar;
use crate::domain::report::{EvaluationReport, build_report};
use crate::domain::walk_forward::{EvaluationConfig, WalkForwardSession};
use crate::ports::history_port::HistoryPort;

/// Evaluate `ticker` end to end. Provider failures and empty histories abort
/// the run; no partial report is produced.
pub fn evaluate_ticker(
    ticker: &str,
    history: &dyn HistoryPort,
    config: &EvaluationConfig,
) -> Result<EvaluationReport, ClosecastError> {
    validate_evaluation_config(config)?;
    let bars = history.get_history(ticker, config.required_bars())?;
    if bars.is_empty() {
        return Err(ClosecastError::NoData {
            ticker: ticker.to_string(),
        });
    }
    info!(ticker, bars = bars.len(), "loaded price history");

    let session = WalkForwardSession::new(config.clone());
    evaluate_bars(ticker, &bars, &session)
}

/// Run an existing session over already-loaded bars.
pub fn evaluate_bars(
    ticker: &str,
    bars: &[PriceBar],
    session: &WalkForwardSession,
) -> Result<EvaluationReport, ClosecastError> {
    let outcome = session.run(bars)?;
    let report = build_report(ticker, &outcome, &session.config().trading)?;
    info!(
        ticker,
        best_model = %report.best_model,
        days = report.test_period.days,
        "evaluation complete"
    );
    Ok(report)
}
