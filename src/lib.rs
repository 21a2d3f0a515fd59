//! Oraclegate - deterministic dual-oracle active acquisition with monitorability gates
//!
//! This library runs a budgeted, multi-round acquisition loop over an
//! ID-indexed item table answered by two independent oracles. Each round it
//! allocates query capacity, ranks candidates, refits per-oracle models, and
//! decides whether each oracle channel is usable at a capped false-positive
//! rate. Every decision is traced, every split is hash-derived from a seed
//! string, and seed sweeps are compared against a random baseline with a
//! bootstrap interval and a CVaR tail gate.

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod csv_output;
pub mod dataset;
pub mod decision_trace;
pub mod error;
pub mod events;
pub mod experiment;
pub mod gate;
pub mod json_output;
pub mod model;
pub mod operating_point;
pub mod policy;
pub mod robustness;
pub mod splitter;
pub mod synthetic;

pub use error::{OracleGateError, Result};
