//! Report sink port.

use crate::domain::error::ClosecastError;
use crate::domain::report::EvaluationReport;

/// Port for writing evaluation reports.
pub trait ReportPort {
    fn write(&self, report: &EvaluationReport, output_path: &str) -> Result<(), ClosecastError>;
}
