//! JSON report adapter implementing ReportPort.
//!
//! Output is pretty-printed with a trailing newline. `-` as the output path
//! writes to stdout.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::domain::error::ClosecastError;
use crate::domain::report::EvaluationReport;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(report: &EvaluationReport) -> Result<String, ClosecastError> {
        let mut out = serde_json::to_string_pretty(report)?;
        out.push('\n');
        Ok(out)
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &EvaluationReport, output_path: &str) -> Result<(), ClosecastError> {
        let json = Self::render(report)?;
        if output_path == "-" {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            return Ok(());
        }
        if let Some(parent) = Path::new(output_path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(output_path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::{AccuracyMetrics, DirectionalBreakdown};
    use crate::domain::report::{BestBy, ModelReport, TestPeriod};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn model_report(mape: f64) -> ModelReport {
        ModelReport {
            days: 2,
            metrics: AccuracyMetrics {
                mae: 1.5,
                rmse: 1.75,
                mape,
                r_squared: 0.9,
                directional_accuracy: 1.0,
            },
            directional: DirectionalBreakdown {
                correct_up: 1,
                ..DirectionalBreakdown::default()
            },
        }
    }

    fn sample_report() -> EvaluationReport {
        let mut models = BTreeMap::new();
        models.insert("linear_regression".to_string(), model_report(1.2));
        models.insert("ensemble".to_string(), model_report(1.4));
        EvaluationReport {
            ticker: "BHP".to_string(),
            test_period: TestPeriod {
                start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
                days: 2,
            },
            models,
            baseline: model_report(2.0),
            trading: None,
            best_model: "linear_regression".to_string(),
            best_by: BestBy {
                mape: "linear_regression".to_string(),
                mae: "linear_regression".to_string(),
            },
            predictions: vec![],
            retrains: vec![],
            skipped_days: vec![],
        }
    }

    #[test]
    fn render_is_valid_json_with_sorted_models() {
        let json = JsonReportAdapter::render(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["ticker"], "BHP");
        assert_eq!(value["test_period"]["start_date"], "2024-03-01");
        assert_eq!(value["best_model"], "linear_regression");
        assert_eq!(value["models"]["linear_regression"]["metrics"]["mape"], 1.2);
        assert!(value["trading"].is_null());
        let ensemble_at = json.find("\"ensemble\"").unwrap();
        let linear_at = json.find("\"linear_regression\":").unwrap();
        assert!(ensemble_at < linear_at);
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("bhp.json");
        let adapter = JsonReportAdapter::new();
        adapter
            .write(&sample_report(), path.to_str().unwrap())
            .unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, JsonReportAdapter::render(&sample_report()).unwrap());
    }
}
