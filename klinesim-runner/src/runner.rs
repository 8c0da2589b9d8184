//! Backtest runner — wires together config, sample loading, engine, and metrics.
//!
//! Three entry points:
//! - `run_from_config()`: validates a `BacktestConfig`, loads its samples, then runs. Used by CLI.
//! - `run_backtest()`: in-memory samples, hashes them itself.
//! - `run_backtest_from_data()`: pre-loaded samples with a known dataset hash. Used by sweeps,
//!   which replay the same samples under many engine settings.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use klinesim_core::domain::PriceSample;
use klinesim_core::engine::{BacktestReport, EngineConfig, EngineError};

use crate::config::{config_id, BacktestConfig, ConfigError};
use crate::data_loader::{dataset_hash, load_samples, LoadError};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub config_id: String,
    pub dataset_hash: String,
    pub synthetic: bool,
    pub report: BacktestReport,
    pub metrics: PerformanceMetrics,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn config(&self) -> &EngineConfig {
        &self.report.config
    }
}

/// Run a single backtest from a `BacktestConfig` (loads or generates samples).
pub fn run_from_config(config: &BacktestConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let loaded = load_samples(&config.data)?;
    run_backtest_from_data(
        &config.engine,
        &loaded.samples,
        &loaded.dataset_hash,
        loaded.synthetic,
    )
}

/// Run a backtest over in-memory samples.
pub fn run_backtest(
    config: &EngineConfig,
    samples: &[PriceSample],
) -> Result<BacktestResult, RunError> {
    run_backtest_from_data(config, samples, &dataset_hash(samples), false)
}

/// Run a backtest with pre-loaded data — no I/O.
pub fn run_backtest_from_data(
    config: &EngineConfig,
    samples: &[PriceSample],
    dataset_hash: &str,
    synthetic: bool,
) -> Result<BacktestResult, RunError> {
    let report = klinesim_core::run_backtest(*config, samples)?;
    let metrics = PerformanceMetrics::compute(&report);

    info!(
        samples = report.sample_count,
        trades = report.trade_count,
        realized_pl = report.total_realized_pl,
        equity = report.final_equity,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        config_id: config_id(config),
        dataset_hash: dataset_hash.to_string(),
        synthetic,
        report,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::synthetic_samples;
    use klinesim_core::domain::Signals;

    #[test]
    fn run_backtest_attaches_provenance() {
        let samples = synthetic_samples(100, 3);
        let config = EngineConfig::default().with_initial_capital(1_000.0);
        let result = run_backtest(&config, &samples).unwrap();

        assert_eq!(result.schema_version, SCHEMA_VERSION);
        assert_eq!(result.config_id, config_id(&config));
        assert_eq!(result.dataset_hash, dataset_hash(&samples));
        assert!(!result.synthetic);
        assert_eq!(result.report.sample_count, 100);
        assert_eq!(result.metrics.trade_count, result.report.trade_count);
    }

    #[test]
    fn run_from_config_tags_synthetic() {
        let mut config = BacktestConfig::synthetic(200, 11);
        config.engine = config.engine.with_initial_capital(1_000.0);
        let result = run_from_config(&config).unwrap();
        assert!(result.synthetic);
        assert_eq!(result.report.sample_count, 200);
    }

    #[test]
    fn run_from_config_rejects_invalid_config() {
        let mut config = BacktestConfig::synthetic(10, 1);
        config.engine = config.engine.with_leverage(0.0);
        assert!(matches!(
            run_from_config(&config),
            Err(RunError::Config(ConfigError::Engine(_)))
        ));
    }

    #[test]
    fn engine_errors_propagate() {
        let samples = vec![PriceSample::hold(
            chrono::DateTime::from_timestamp(1_600_000_000, 0).unwrap(),
            f64::NAN,
        )];
        let err = run_backtest(&EngineConfig::default(), &samples).unwrap_err();
        assert!(matches!(
            err,
            RunError::Engine(EngineError::InvalidSample { index: 0, .. })
        ));
    }

    #[test]
    fn result_json_keeps_schema_version_default() {
        let samples = vec![PriceSample::new(
            chrono::DateTime::from_timestamp(1_600_000_000, 0).unwrap(),
            100.0,
            Signals::enter_long(),
        )];
        let result = run_backtest(&EngineConfig::default(), &samples).unwrap();
        let mut json = serde_json::to_value(&result).unwrap();
        json.as_object_mut().unwrap().remove("schema_version");
        let back: BacktestResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.schema_version, SCHEMA_VERSION);
        assert_eq!(back.config_id, result.config_id);
    }
}
