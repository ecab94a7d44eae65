//! Long/flat trading overlay driven by consecutive ensemble forecasts.
//!
//! At step `k` the predicted return is `(pred[k+1] - pred[k]) / pred[k]`.
//! Above `threshold` while flat, all cash buys shares at `actual[k]`; below
//! `-threshold` while long, everything is sold at `actual[k]`. The portfolio
//! is then marked at `actual[k+1]`. Any open position is closed at the last
//! actual price.

use serde::Serialize;

use crate::domain::error::ClosecastError;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TradingConfig {
    /// Minimum predicted return (as a fraction) that triggers a trade.
    pub threshold: f64,
    pub initial_capital: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            threshold: 0.005,
            initial_capital: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeEvent {
    pub step: usize,
    pub action: TradeAction,
    pub price: f64,
    pub shares: f64,
    /// True for the final liquidation of an open position.
    pub forced: bool,
}

/// Book state after marking at step `k`.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub cash: f64,
    pub shares: f64,
    pub mark_price: f64,
}

impl Holding {
    pub fn value(&self) -> f64 {
        self.cash + self.shares * self.mark_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub initial_capital: f64,
    pub final_value: f64,
    /// Percent.
    pub total_return: f64,
    /// Percent.
    pub buy_hold_return: f64,
    pub outperformance: f64,
    pub sharpe_ratio: f64,
    /// Percent, zero or negative.
    pub max_drawdown: f64,
    pub num_trades: usize,
    pub portfolio_curve: Vec<f64>,
    pub trades: Vec<TradeEvent>,
    #[serde(skip)]
    pub holdings: Vec<Holding>,
}

struct Book {
    cash: f64,
    shares: f64,
}

impl Book {
    fn value_at(&self, price: f64) -> f64 {
        self.cash + self.shares * price
    }
}

pub fn simulate(
    predictions: &[f64],
    actuals: &[f64],
    config: &TradingConfig,
) -> Result<SimulationResult, ClosecastError> {
    if predictions.len() != actuals.len() {
        return Err(ClosecastError::LengthMismatch {
            actuals: actuals.len(),
            predictions: predictions.len(),
        });
    }
    let n = actuals.len();
    if n < 2 {
        return Err(ClosecastError::TooFewPredictions {
            count: n,
            minimum: 2,
        });
    }

    let mut book = Book {
        cash: config.initial_capital,
        shares: 0.0,
    };
    let mut curve = Vec::with_capacity(n);
    let mut holdings = Vec::with_capacity(n - 1);
    let mut trades = Vec::new();
    curve.push(config.initial_capital);

    for k in 0..n - 1 {
        let price = actuals[k];
        let predicted_return = if predictions[k] != 0.0 {
            (predictions[k + 1] - predictions[k]) / predictions[k]
        } else {
            0.0
        };

        if predicted_return > config.threshold && book.shares == 0.0 && price > 0.0 {
            let shares = book.cash / price;
            book.shares = shares;
            book.cash = 0.0;
            trades.push(TradeEvent {
                step: k,
                action: TradeAction::Buy,
                price,
                shares,
                forced: false,
            });
        } else if predicted_return < -config.threshold && book.shares > 0.0 {
            let shares = book.shares;
            book.cash += shares * price;
            book.shares = 0.0;
            trades.push(TradeEvent {
                step: k,
                action: TradeAction::Sell,
                price,
                shares,
                forced: false,
            });
        }

        let mark = actuals[k + 1];
        curve.push(book.value_at(mark));
        holdings.push(Holding {
            cash: book.cash,
            shares: book.shares,
            mark_price: mark,
        });
    }
    let num_trades = trades.len();

    let last_price = actuals[n - 1];
    if book.shares > 0.0 {
        let shares = book.shares;
        book.cash += shares * last_price;
        book.shares = 0.0;
        trades.push(TradeEvent {
            step: n - 1,
            action: TradeAction::Sell,
            price: last_price,
            shares,
            forced: true,
        });
    }

    let final_value = book.cash;
    let total_return = (final_value / config.initial_capital - 1.0) * 100.0;
    let buy_hold_return = if actuals[0] != 0.0 {
        (last_price / actuals[0] - 1.0) * 100.0
    } else {
        0.0
    };

    Ok(SimulationResult {
        initial_capital: config.initial_capital,
        final_value,
        total_return,
        buy_hold_return,
        outperformance: total_return - buy_hold_return,
        sharpe_ratio: compute_sharpe(&curve),
        max_drawdown: compute_max_drawdown(&curve),
        num_trades,
        portfolio_curve: curve,
        trades,
        holdings,
    })
}

/// Annualised Sharpe ratio of the step returns of `curve`, zero when the
/// returns have no dispersion.
pub fn compute_sharpe(curve: &[f64]) -> f64 {
    if curve.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        mean / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

/// Deepest peak-to-trough decline of `curve`, as a negative percentage.
pub fn compute_max_drawdown(curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for &value in curve {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.min((value - peak) / peak);
        }
    }
    worst * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn config() -> TradingConfig {
        TradingConfig::default()
    }

    #[test]
    fn flat_forecast_never_trades() {
        let actuals = [100.0, 101.0, 99.0, 102.0];
        let preds = [100.0, 100.0, 100.0, 100.0];
        let r = simulate(&preds, &actuals, &config()).unwrap();
        assert_eq!(r.num_trades, 0);
        assert!(r.trades.is_empty());
        assert_eq!(r.portfolio_curve, vec![10_000.0; 4]);
        assert_eq!(r.final_value, 10_000.0);
        assert_eq!(r.sharpe_ratio, 0.0);
        assert_eq!(r.max_drawdown, 0.0);
        assert_abs_diff_eq!(r.buy_hold_return, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(r.outperformance, -2.0, epsilon = 1e-9);
    }

    #[test]
    fn buy_then_sell_on_signals() {
        let actuals = [100.0, 110.0, 120.0, 90.0];
        // +5%, +5%, -10%
        let preds = [100.0, 105.0, 110.25, 99.225];
        let r = simulate(&preds, &actuals, &config()).unwrap();

        assert_eq!(r.num_trades, 2);
        assert_eq!(r.trades[0].action, TradeAction::Buy);
        assert_eq!(r.trades[0].step, 0);
        assert_abs_diff_eq!(r.trades[0].shares, 100.0);
        assert_eq!(r.trades[1].action, TradeAction::Sell);
        assert_eq!(r.trades[1].step, 2);

        assert_abs_diff_eq!(r.portfolio_curve[0], 10_000.0);
        assert_abs_diff_eq!(r.portfolio_curve[1], 11_000.0);
        assert_abs_diff_eq!(r.portfolio_curve[2], 12_000.0);
        assert_abs_diff_eq!(r.portfolio_curve[3], 12_000.0);
        assert_abs_diff_eq!(r.final_value, 12_000.0);
        assert_abs_diff_eq!(r.total_return, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(r.buy_hold_return, -10.0, epsilon = 1e-9);
    }

    #[test]
    fn open_position_is_liquidated_at_last_price() {
        let actuals = [100.0, 105.0, 108.0];
        let preds = [100.0, 102.0, 104.0];
        let r = simulate(&preds, &actuals, &config()).unwrap();
        assert_eq!(r.num_trades, 1);
        assert_eq!(r.trades.len(), 2);
        let last = r.trades.last().unwrap();
        assert!(last.forced);
        assert_eq!(last.price, 108.0);
        assert_abs_diff_eq!(r.final_value, 10_800.0, epsilon = 1e-9);
    }

    #[test]
    fn drawdown_is_negative_percent() {
        let dd = compute_max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]);
        assert_abs_diff_eq!(dd, -25.0, epsilon = 1e-9);
        assert_eq!(compute_max_drawdown(&[100.0, 101.0, 102.0]), 0.0);
    }

    #[test]
    fn sharpe_zero_for_flat_curve() {
        assert_eq!(compute_sharpe(&[100.0, 100.0, 100.0]), 0.0);
        assert!(compute_sharpe(&[100.0, 101.0, 103.0, 104.0]) > 0.0);
    }

    #[test]
    fn too_few_points() {
        assert!(matches!(
            simulate(&[1.0], &[1.0], &config()),
            Err(ClosecastError::TooFewPredictions { count: 1, .. })
        ));
        assert!(matches!(
            simulate(&[1.0, 2.0], &[1.0], &config()),
            Err(ClosecastError::LengthMismatch { .. })
        ));
    }

    proptest! {
        #[test]
        fn curve_is_cash_plus_marked_shares(
            pairs in prop::collection::vec((50.0f64..150.0, 50.0f64..150.0), 2..60),
            threshold in 0.0f64..0.05,
        ) {
            let (actuals, preds): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
            let cfg = TradingConfig { threshold, initial_capital: 10_000.0 };
            let r = simulate(&preds, &actuals, &cfg).unwrap();

            prop_assert_eq!(r.portfolio_curve.len(), actuals.len());
            prop_assert_eq!(r.portfolio_curve[0], 10_000.0);
            for (k, holding) in r.holdings.iter().enumerate() {
                prop_assert_eq!(holding.mark_price, actuals[k + 1]);
                let expected = holding.value();
                prop_assert!((r.portfolio_curve[k + 1] - expected).abs() < 1e-6);
                // Always fully in cash or fully in shares.
                prop_assert!(holding.cash == 0.0 || holding.shares == 0.0);
            }
            prop_assert!(r.final_value > 0.0);
        }
    }
}
