//! Train/test validation of a sweep winner.
//!
//! The sample sequence is cut into fixed-size windows; the leading
//! `train_windows` windows form the training set and everything after them
//! the test set. The grid is swept on the training set, the best
//! configuration is replayed on the test set, and it passes when its
//! test-set trade Sharpe exceeds `min_sharpe`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use klinesim_core::domain::PriceSample;
use klinesim_core::engine::EngineConfig;

use crate::config::ValidationConfig;
use crate::data_loader::{dataset_hash, LoadedSamples};
use crate::fitness::FitnessMetric;
use crate::runner::{run_backtest_from_data, BacktestResult, RunError};
use crate::sweep::{ParamGrid, ParamSweep};

/// Errors from train/test validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("need more than {needed} samples for a train/test split, got {available}")]
    InsufficientData { needed: usize, available: usize },
    #[error("no configuration completed on the training set ({failed} failed)")]
    NoSuccessfulRun { failed: usize },
    #[error("test run failed: {0}")]
    Run(#[from] RunError),
}

/// Outcome of validating the best training configuration on held-out samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub metric: FitnessMetric,
    pub min_sharpe: f64,
    pub train_samples: usize,
    pub test_samples: usize,
    /// Number of grid configurations that completed on the training set.
    pub train_runs: usize,
    pub train_best: BacktestResult,
    pub test: BacktestResult,
    pub passed: bool,
}

impl ValidationReport {
    pub fn config(&self) -> &EngineConfig {
        self.train_best.config()
    }
}

/// Chronological split: the first `window_size * train_windows` samples train,
/// the remainder tests. The test set must be non-empty.
pub fn split_train_test(
    samples: &[PriceSample],
    window_size: usize,
    train_windows: usize,
) -> Result<(&[PriceSample], &[PriceSample]), ValidationError> {
    let threshold = window_size.saturating_mul(train_windows);
    if threshold == 0 || samples.len() <= threshold {
        return Err(ValidationError::InsufficientData {
            needed: threshold,
            available: samples.len(),
        });
    }
    Ok(samples.split_at(threshold))
}

/// Sweep `grid` on the training set and test the winner on the held-out set.
pub fn validate_sweep(
    sweep: &ParamSweep,
    grid: &ParamGrid,
    base: &EngineConfig,
    data: &LoadedSamples,
    validation: &ValidationConfig,
    metric: FitnessMetric,
) -> Result<ValidationReport, ValidationError> {
    let (train, test) = split_train_test(
        &data.samples,
        validation.window_size,
        validation.train_windows,
    )?;

    let results = sweep.sweep(grid, base, train, &dataset_hash(train), data.synthetic);
    let train_best = results
        .best(metric)
        .cloned()
        .ok_or(ValidationError::NoSuccessfulRun {
            failed: results.failures().len(),
        })?;

    let test_result = run_backtest_from_data(
        train_best.config(),
        test,
        &dataset_hash(test),
        train_best.synthetic,
    )?;
    let passed = test_result.metrics.trade_sharpe > validation.min_sharpe;

    info!(
        metric = %metric,
        train_fitness = metric.extract(&train_best.metrics),
        test_sharpe = test_result.metrics.trade_sharpe,
        passed,
        "validation complete"
    );

    Ok(ValidationReport {
        metric,
        min_sharpe: validation.min_sharpe,
        train_samples: train.len(),
        test_samples: test.len(),
        train_runs: results.len(),
        train_best,
        test: test_result,
        passed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::synthetic_samples;

    #[test]
    fn split_uses_leading_windows_for_training() {
        let samples = synthetic_samples(720, 1);
        let (train, test) = split_train_test(&samples, 144, 3).unwrap();
        assert_eq!(train.len(), 432);
        assert_eq!(test.len(), 288);
        assert_eq!(train[431], samples[431]);
        assert_eq!(test[0], samples[432]);
    }

    #[test]
    fn split_requires_test_samples() {
        let samples = synthetic_samples(432, 1);
        assert!(matches!(
            split_train_test(&samples, 144, 3),
            Err(ValidationError::InsufficientData {
                needed: 432,
                available: 432
            })
        ));
    }

    #[test]
    fn split_rejects_empty_training_set() {
        let samples = synthetic_samples(10, 1);
        assert!(split_train_test(&samples, 0, 3).is_err());
        assert!(split_train_test(&samples, 5, 0).is_err());
    }
}
