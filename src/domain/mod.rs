//! Core domain types and the evaluation engine.

pub mod price_bar;
pub mod features;
pub mod models;
pub mod ensemble;
pub mod walk_forward;
pub mod forecast;
pub mod metrics;
pub mod simulator;
pub mod report;
pub mod evaluation;
pub mod config_validation;
pub mod error;
