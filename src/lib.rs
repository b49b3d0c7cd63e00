//! # Burn RTE
//!
//! Attend-compare-aggregate classifiers for recognizing textual entailment.
#![forbid(unsafe_code)]

/// Models
pub mod models;

/// Pipelines
pub mod pipelines;

/// Datasets
pub mod datasets;

/// Saving and restoring trained classifiers
pub mod checkpoint;

/// The execution handle threaded through construction, training and evaluation
pub mod session;

/// Utilities
pub mod utils;

/// CLI backends and utilities
pub mod cli;
