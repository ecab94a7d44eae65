//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::config_validation::validate_evaluation_config;
use crate::domain::error::ClosecastError;
use crate::domain::evaluation::evaluate_ticker;
use crate::domain::features::FeatureConfig;
use crate::domain::forecast::forecast_ahead;
use crate::domain::models::{ModelConfig, ModelKind};
use crate::domain::models::boosting::BoostingParams;
use crate::domain::models::forest::ForestParams;
use crate::domain::models::linear::LinearParams;
use crate::domain::models::tree::TreeParams;
use crate::domain::report::{BASELINE_KEY, EvaluationReport, ModelReport};
use crate::domain::simulator::TradingConfig;
use crate::domain::walk_forward::EvaluationConfig;
use crate::ports::config_port::ConfigPort;
use crate::ports::history_port::HistoryPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "closecast",
    about = "Walk-forward evaluation of next-day close prediction models"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a walk-forward evaluation and write a JSON report
    Evaluate {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory holding <TICKER>.csv files
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        ticker: String,
        /// Report path, `-` for stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        test_days: Option<usize>,
        #[arg(long)]
        retrain_frequency: Option<usize>,
    },
    /// Fit on the full history and project closes past the last bar
    Forecast {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        ticker: String,
        #[arg(long, default_value_t = 7)]
        days: usize,
    },
    /// Validate an evaluation configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Evaluate {
            config,
            data,
            ticker,
            output,
            test_days,
            retrain_frequency,
        } => run_evaluate(
            config.as_ref(),
            &data,
            &ticker,
            output.as_ref(),
            test_days,
            retrain_frequency,
        ),
        Command::Forecast {
            config,
            data,
            ticker,
            days,
        } => run_forecast(config.as_ref(), &data, &ticker, days),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Defaults when no file is given, otherwise the file's values over defaults.
fn resolve_config(config_path: Option<&PathBuf>) -> Result<EvaluationConfig, ExitCode> {
    let Some(path) = config_path else {
        return Ok(EvaluationConfig::default());
    };
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;
    build_evaluation_config(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn get_count(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, ClosecastError> {
    let value = config.get_int(section, key, default as i64);
    usize::try_from(value)
        .map_err(|_| ClosecastError::config_invalid(section, key, format!("{key} must not be negative")))
}

fn get_windows(
    config: &dyn ConfigPort,
    key: &str,
    default: &[usize],
) -> Result<Vec<usize>, ClosecastError> {
    match config.get_usize_list("features", key) {
        None => Ok(default.to_vec()),
        Some(Ok(windows)) => Ok(windows),
        Some(Err(token)) => Err(ClosecastError::config_invalid(
            "features",
            key,
            format!("'{token}' is not a window length"),
        )),
    }
}

fn build_tree_params(
    config: &dyn ConfigPort,
    section: &str,
    default: &TreeParams,
) -> Result<TreeParams, ClosecastError> {
    Ok(TreeParams {
        max_depth: get_count(config, section, "max_depth", default.max_depth)?,
        min_samples_split: get_count(config, section, "min_samples_split", default.min_samples_split)?,
        min_samples_leaf: get_count(config, section, "min_samples_leaf", default.min_samples_leaf)?,
    })
}

pub fn build_evaluation_config(config: &dyn ConfigPort) -> Result<EvaluationConfig, ClosecastError> {
    let defaults = EvaluationConfig::default();

    let fd = &defaults.features;
    let features = FeatureConfig {
        lags: get_count(config, "features", "lags", fd.lags)?,
        ma_windows: get_windows(config, "ma_windows", &fd.ma_windows)?,
        volatility_windows: get_windows(config, "volatility_windows", &fd.volatility_windows)?,
        momentum_horizons: get_windows(config, "momentum_horizons", &fd.momentum_horizons)?,
        volume_windows: get_windows(config, "volume_windows", &fd.volume_windows)?,
    };

    let td = &defaults.trading;
    let trading = TradingConfig {
        threshold: config.get_double("trading", "threshold", td.threshold),
        initial_capital: config.get_double("trading", "initial_capital", td.initial_capital),
    };

    let md = &defaults.models;
    let seed = config.get_int("models", "seed", md.seed as i64);
    let seed = u64::try_from(seed)
        .map_err(|_| ClosecastError::config_invalid("models", "seed", "seed must not be negative"))?;
    let models = ModelConfig {
        random_forest: config.get_bool("models", "random_forest", md.random_forest),
        gradient_boosting: config.get_bool("models", "gradient_boosting", md.gradient_boosting),
        linear_regression: config.get_bool("models", "linear_regression", md.linear_regression),
        seed,
        forest: ForestParams {
            n_trees: get_count(config, "forest", "n_trees", md.forest.n_trees)?,
            tree: build_tree_params(config, "forest", &md.forest.tree)?,
            bootstrap: config.get_bool("forest", "bootstrap", md.forest.bootstrap),
            max_features: config.get_double("forest", "max_features", md.forest.max_features),
        },
        boosting: BoostingParams {
            n_rounds: get_count(config, "boosting", "n_rounds", md.boosting.n_rounds)?,
            learning_rate: config.get_double("boosting", "learning_rate", md.boosting.learning_rate),
            tree: build_tree_params(config, "boosting", &md.boosting.tree)?,
            subsample: config.get_double("boosting", "subsample", md.boosting.subsample),
            colsample: config.get_double("boosting", "colsample", md.boosting.colsample),
        },
        linear: LinearParams {
            ridge: config.get_double("linear", "ridge", md.linear.ridge),
        },
    };

    Ok(EvaluationConfig {
        test_days: get_count(config, "evaluation", "test_days", defaults.test_days)?,
        retrain_frequency: get_count(
            config,
            "evaluation",
            "retrain_frequency",
            defaults.retrain_frequency,
        )?,
        min_train_days: get_count(config, "evaluation", "min_train_days", defaults.min_train_days)?,
        features,
        trading,
        models,
    })
}

fn run_evaluate(
    config_path: Option<&PathBuf>,
    data_dir: &Path,
    ticker: &str,
    output_path: Option<&PathBuf>,
    test_days: Option<usize>,
    retrain_frequency: Option<usize>,
) -> ExitCode {
    // Stage 1: Resolve config
    let mut config = match resolve_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Some(days) = test_days {
        config.test_days = days;
    }
    if let Some(freq) = retrain_frequency {
        config.retrain_frequency = freq;
    }

    // Stage 2: Validate
    if let Err(e) = validate_evaluation_config(&config) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    // Stage 3: Evaluate
    eprintln!(
        "Evaluating {}: {} test days, retrain every {} days, {} features",
        ticker,
        config.test_days,
        config.retrain_frequency,
        config.features.dimension()
    );
    let history = CsvAdapter::new(data_dir.to_path_buf());
    let report = match evaluate_ticker(ticker, &history, &config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 4: Console summary
    print_summary(&report);

    // Stage 5: Write report
    let output = output_path
        .cloned()
        .unwrap_or_else(|| PathBuf::from(format!("{}_evaluation.json", ticker)));
    let output = output.to_string_lossy();
    match JsonReportAdapter::new().write(&report, &output) {
        Ok(()) => {
            if output != "-" {
                eprintln!("\nReport written to: {}", output);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: failed to write report: {e}");
            (&e).into()
        }
    }
}

fn print_model_row(name: &str, report: &ModelReport) {
    let m = &report.metrics;
    eprintln!(
        "  {:<22} {:>9.2} {:>9.2} {:>8.2}% {:>8.4} {:>8.1}%",
        name,
        m.mae,
        m.rmse,
        m.mape,
        m.r_squared,
        m.directional_accuracy * 100.0
    );
}

fn print_summary(report: &EvaluationReport) {
    eprintln!("\n=== Evaluation: {} ===", report.ticker);
    eprintln!(
        "Test period:      {} to {} ({} predictions)",
        report.test_period.start_date, report.test_period.end_date, report.test_period.days
    );
    eprintln!(
        "\n  {:<22} {:>9} {:>9} {:>9} {:>8} {:>9}",
        "model", "MAE", "RMSE", "MAPE", "R2", "dir acc"
    );
    for (name, model) in &report.models {
        print_model_row(name, model);
    }
    print_model_row(BASELINE_KEY, &report.baseline);
    eprintln!("\nBest model:       {} (lowest MAPE)", report.best_model);
    if !report.skipped_days.is_empty() {
        eprintln!("Skipped days:     {}", report.skipped_days.len());
    }

    if let Some(t) = &report.trading {
        eprintln!("\n=== Trading Simulation (ensemble) ===");
        eprintln!("Final Value:      ${:.2}", t.final_value);
        eprintln!("Total Return:     {:.2}%", t.total_return);
        eprintln!("Buy & Hold:       {:.2}%", t.buy_hold_return);
        eprintln!("Outperformance:   {:.2}%", t.outperformance);
        eprintln!("Sharpe Ratio:     {:.2}", t.sharpe_ratio);
        eprintln!("Max Drawdown:     {:.2}%", t.max_drawdown);
        eprintln!("Total Trades:     {}", t.num_trades);
    }
}

fn run_forecast(config_path: Option<&PathBuf>, data_dir: &Path, ticker: &str, days: usize) -> ExitCode {
    let config = match resolve_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_evaluation_config(&config) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let history = CsvAdapter::new(data_dir.to_path_buf());
    let bars = match history.get_history(ticker, config.features.min_bars() + 1) {
        Ok(bars) if bars.is_empty() => {
            let e = ClosecastError::NoData {
                ticker: ticker.to_string(),
            };
            eprintln!("error: {e}");
            return (&e).into();
        }
        Ok(bars) => bars,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("Forecasting {} for {} days from {} bars", ticker, days, bars.len());
    let forecast = match forecast_ahead(&bars, &config, days) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!(
        "\nLast close {:.2} on {}",
        forecast.last_close, forecast.last_date
    );
    for (step, value) in forecast.ensemble.iter().enumerate() {
        let per_model: Vec<String> = forecast
            .per_model
            .iter()
            .map(|(kind, path)| format!("{}={:.2}", kind, path[step]))
            .collect();
        eprintln!("  day +{:<3} {:>10.2}  ({})", step + 1, value, per_model.join(", "));
    }
    eprintln!("\nMulti-day values feed predictions back as lags; error compounds with the horizon.");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match resolve_config(Some(config_path)) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if let Err(e) = validate_evaluation_config(&config) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    eprintln!("\nTest days:         {}", config.test_days);
    eprintln!("Retrain frequency: {}", config.retrain_frequency);
    eprintln!("Min train days:    {}", config.min_train_days);
    eprintln!("Features:          {}", config.features.dimension());
    let enabled: Vec<&str> = ModelKind::ALL
        .iter()
        .filter(|k| config.models.is_enabled(**k))
        .map(|k| k.name())
        .collect();
    eprintln!("Models:            {}", enabled.join(", "));
    eprintln!("\nEvaluation configuration is valid.");
    ExitCode::SUCCESS
}
