//! klinesim runner — backtest orchestration, sweeps, validation, metrics, reports.
//!
//! This crate builds on `klinesim-core` to provide:
//! - TOML run configuration
//! - Sample loading from strategy CSVs, with a synthetic fallback for development
//! - Single-backtest runner with provenance (config id, dataset hash) and metrics
//! - Parallel parameter sweeps ranked by a pluggable fitness metric
//! - Train/test validation of the sweep winner
//! - Text summaries and JSON/CSV artifacts

pub mod config;
pub mod data_loader;
pub mod fitness;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod sweep;
pub mod validation;

pub use config::{config_id, BacktestConfig, ConfigError, DataConfig, ValidationConfig};
pub use data_loader::{
    dataset_hash, load_samples, load_samples_csv, synthetic_samples, LoadError, LoadedSamples,
};
pub use fitness::FitnessMetric;
pub use metrics::PerformanceMetrics;
pub use runner::{
    run_backtest, run_backtest_from_data, run_from_config, BacktestResult, RunError,
    SCHEMA_VERSION,
};
pub use sweep::{ParamGrid, ParamSweep, SweepFailure, SweepResults};
pub use validation::{split_train_test, validate_sweep, ValidationError, ValidationReport};
