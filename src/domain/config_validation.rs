//! Configuration validation.
//!
//! Checks a fully built [`EvaluationConfig`] before any data is fetched. Each
//! error names the INI section and key the value comes from.

use crate::domain::error::ClosecastError;
use crate::domain::features::FeatureConfig;
use crate::domain::models::ModelConfig;
use crate::domain::simulator::TradingConfig;
use crate::domain::walk_forward::EvaluationConfig;

pub fn validate_evaluation_config(config: &EvaluationConfig) -> Result<(), ClosecastError> {
    validate_schedule(config)?;
    validate_features(&config.features)?;
    validate_trading(&config.trading)?;
    validate_models(&config.models)?;
    Ok(())
}

fn validate_schedule(config: &EvaluationConfig) -> Result<(), ClosecastError> {
    if config.test_days < 2 {
        return Err(ClosecastError::config_invalid(
            "evaluation",
            "test_days",
            "test_days must be at least 2",
        ));
    }
    if config.retrain_frequency == 0 {
        return Err(ClosecastError::config_invalid(
            "evaluation",
            "retrain_frequency",
            "retrain_frequency must be positive",
        ));
    }
    let floor = config.features.longest_window() + 1;
    if config.min_train_days <= floor {
        return Err(ClosecastError::config_invalid(
            "evaluation",
            "min_train_days",
            format!("min_train_days must exceed {floor} (longest feature window + 1)"),
        ));
    }
    Ok(())
}

fn validate_windows(key: &str, windows: &[usize]) -> Result<(), ClosecastError> {
    if windows.is_empty() {
        return Err(ClosecastError::config_invalid(
            "features",
            key,
            format!("{key} must list at least one window"),
        ));
    }
    if windows.contains(&0) {
        return Err(ClosecastError::config_invalid(
            "features",
            key,
            format!("{key} windows must be positive"),
        ));
    }
    Ok(())
}

fn validate_features(features: &FeatureConfig) -> Result<(), ClosecastError> {
    if features.lags == 0 {
        return Err(ClosecastError::config_invalid(
            "features",
            "lags",
            "lags must be positive",
        ));
    }
    validate_windows("ma_windows", &features.ma_windows)?;
    validate_windows("volatility_windows", &features.volatility_windows)?;
    validate_windows("momentum_horizons", &features.momentum_horizons)?;
    validate_windows("volume_windows", &features.volume_windows)?;
    Ok(())
}

fn validate_trading(trading: &TradingConfig) -> Result<(), ClosecastError> {
    if !(trading.initial_capital.is_finite() && trading.initial_capital > 0.0) {
        return Err(ClosecastError::config_invalid(
            "trading",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    if !(trading.threshold.is_finite() && trading.threshold >= 0.0) {
        return Err(ClosecastError::config_invalid(
            "trading",
            "threshold",
            "threshold must be non-negative",
        ));
    }
    Ok(())
}

fn fraction(section: &str, key: &str, value: f64) -> Result<(), ClosecastError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ClosecastError::config_invalid(
            section,
            key,
            format!("{key} must be in (0, 1], got {value}"),
        ))
    }
}

fn validate_models(models: &ModelConfig) -> Result<(), ClosecastError> {
    if !(models.random_forest || models.gradient_boosting || models.linear_regression) {
        return Err(ClosecastError::config_invalid(
            "models",
            "enabled",
            "at least one model family must be enabled",
        ));
    }

    if models.random_forest {
        let forest = &models.forest;
        if forest.n_trees == 0 {
            return Err(ClosecastError::config_invalid(
                "forest",
                "n_trees",
                "n_trees must be positive",
            ));
        }
        if forest.tree.max_depth == 0 {
            return Err(ClosecastError::config_invalid(
                "forest",
                "max_depth",
                "max_depth must be positive",
            ));
        }
        fraction("forest", "max_features", forest.max_features)?;
    }

    if models.gradient_boosting {
        let boosting = &models.boosting;
        if boosting.tree.max_depth == 0 {
            return Err(ClosecastError::config_invalid(
                "boosting",
                "max_depth",
                "max_depth must be positive",
            ));
        }
        fraction("boosting", "learning_rate", boosting.learning_rate)?;
        fraction("boosting", "subsample", boosting.subsample)?;
        fraction("boosting", "colsample", boosting.colsample)?;
    }

    if models.linear_regression && (models.linear.ridge.is_nan() || models.linear.ridge < 0.0) {
        return Err(ClosecastError::config_invalid(
            "linear",
            "ridge",
            "ridge must be non-negative",
        ));
    }
    Ok(())
}
