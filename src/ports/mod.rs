//! Port traits the evaluation engine depends on.

pub mod config_port;
pub mod history_port;
pub mod report_port;
