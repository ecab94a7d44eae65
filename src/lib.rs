//! closecast: walk-forward evaluation of next-day closing price models.
//!
//! Hexagonal architecture: the evaluation engine lives in [`domain`], port
//! traits in [`ports`], concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
