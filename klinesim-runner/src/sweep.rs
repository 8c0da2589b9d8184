//! Parameter sweep utilities for grid search over engine settings.
//!
//! Each configuration replays the same samples on its own engine; nothing is
//! shared between runs, so parallel and sequential sweeps produce identical
//! results in identical order.

use rayon::prelude::*;
use tracing::{debug, info, warn};

use klinesim_core::domain::PriceSample;
use klinesim_core::engine::EngineConfig;

use crate::fitness::FitnessMetric;
use crate::runner::{run_backtest_from_data, BacktestResult, RunError};

/// Parameter grid specification.
///
/// Defines the values to sweep for each engine parameter. Initial capital is
/// taken from the base configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub stake_percents: Vec<f64>,
    pub leverages: Vec<f64>,
    pub max_pyramids: Vec<u32>,
    pub commission_rates: Vec<f64>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            stake_percents: vec![0.01, 0.025, 0.05, 0.1],
            leverages: vec![1.0, 2.0, 5.0, 10.0],
            max_pyramids: vec![1, 12],
            commission_rates: vec![0.075],
        }
    }
}

impl ParamGrid {
    /// Returns the total number of combinations in this grid, including invalid ones.
    pub fn size(&self) -> usize {
        self.stake_percents.len()
            * self.leverages.len()
            * self.max_pyramids.len()
            * self.commission_rates.len()
    }

    /// Generates all valid configurations in the grid.
    pub fn generate_configs(&self, base: &EngineConfig) -> Vec<EngineConfig> {
        let mut configs = Vec::with_capacity(self.size());

        for &stake_percent in &self.stake_percents {
            for &leverage in &self.leverages {
                for &max_pyramid in &self.max_pyramids {
                    for &commission_rate in &self.commission_rates {
                        let config = base
                            .with_stake_percent(stake_percent)
                            .with_leverage(leverage)
                            .with_max_pyramid(max_pyramid)
                            .with_commission_rate(commission_rate);

                        // Skip invalid combinations (e.g. commission * leverage >= 1)
                        match config.validate() {
                            Ok(()) => configs.push(config),
                            Err(e) => debug!(error = %e, "skipping grid point"),
                        }
                    }
                }
            }
        }

        configs
    }
}

/// Parameter sweep executor.
#[derive(Debug, Clone)]
pub struct ParamSweep {
    parallel: bool,
}

impl Default for ParamSweep {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamSweep {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Runs every configuration in `grid` over `samples`.
    ///
    /// Runs that fail (e.g. an account depleted mid-replay) are collected in
    /// [`SweepResults::failures`] rather than aborting the sweep.
    pub fn sweep(
        &self,
        grid: &ParamGrid,
        base: &EngineConfig,
        samples: &[PriceSample],
        dataset_hash: &str,
        synthetic: bool,
    ) -> SweepResults {
        let configs = grid.generate_configs(base);
        let run = |config: &EngineConfig| {
            run_backtest_from_data(config, samples, dataset_hash, synthetic)
                .map_err(|error| SweepFailure {
                    config: *config,
                    error,
                })
        };

        let outcomes: Vec<Result<BacktestResult, SweepFailure>> = if self.parallel {
            configs.par_iter().map(run).collect()
        } else {
            configs.iter().map(run).collect()
        };

        let results = SweepResults::from_outcomes(outcomes);
        info!(
            configs = configs.len(),
            succeeded = results.len(),
            failed = results.failures().len(),
            "sweep complete"
        );
        results
    }
}

/// A configuration whose run failed.
#[derive(Debug)]
pub struct SweepFailure {
    pub config: EngineConfig,
    pub error: RunError,
}

/// Results from a parameter sweep, in grid order.
#[derive(Debug, Default)]
pub struct SweepResults {
    results: Vec<BacktestResult>,
    failures: Vec<SweepFailure>,
}

impl SweepResults {
    fn from_outcomes(outcomes: Vec<Result<BacktestResult, SweepFailure>>) -> Self {
        let mut results = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(failure) => {
                    warn!(error = %failure.error, config = ?failure.config, "sweep run failed");
                    failures.push(failure);
                }
            }
        }
        Self { results, failures }
    }

    pub fn all(&self) -> &[BacktestResult] {
        &self.results
    }

    pub fn failures(&self) -> &[SweepFailure] {
        &self.failures
    }

    /// Number of successful runs.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Returns results sorted by `metric`, best first. Ties keep grid order.
    pub fn sorted_by(&self, metric: FitnessMetric) -> Vec<&BacktestResult> {
        let mut sorted: Vec<_> = self.results.iter().collect();
        sorted.sort_by(|a, b| metric.rank(&a.metrics, &b.metrics));
        sorted
    }

    /// Returns the top N results by `metric`.
    pub fn top_n(&self, metric: FitnessMetric, n: usize) -> Vec<&BacktestResult> {
        self.sorted_by(metric).into_iter().take(n).collect()
    }

    /// Returns the best result by `metric`.
    pub fn best(&self, metric: FitnessMetric) -> Option<&BacktestResult> {
        self.sorted_by(metric).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(leverages: Vec<f64>) -> ParamGrid {
        ParamGrid {
            stake_percents: vec![0.01, 0.05],
            leverages,
            max_pyramids: vec![1],
            commission_rates: vec![0.075],
        }
    }

    #[test]
    fn grid_size() {
        // 4 stakes × 4 leverages × 2 pyramids × 1 commission
        assert_eq!(ParamGrid::default().size(), 32);
        let configs = ParamGrid::default().generate_configs(&EngineConfig::default());
        assert_eq!(configs.len(), 32);
    }

    #[test]
    fn generate_configs_skips_invalid_combinations() {
        // 0.075 * 20 >= 1 and a zero leverage are both rejected.
        let configs = grid(vec![0.0, 5.0, 20.0]).generate_configs(&EngineConfig::default());
        assert_eq!(configs.len(), 2);
        assert!(configs.iter().all(|c| c.leverage == 5.0));
    }

    #[test]
    fn generate_configs_keeps_base_capital() {
        let base = EngineConfig::default().with_initial_capital(250.0);
        let configs = grid(vec![2.0]).generate_configs(&base);
        assert!(configs.iter().all(|c| c.initial_capital == 250.0));
    }

    #[test]
    fn empty_sample_sweep_succeeds() {
        let base = EngineConfig::default();
        let results = ParamSweep::new().sweep(&grid(vec![1.0, 2.0]), &base, &[], "", false);
        assert_eq!(results.len(), 4);
        assert!(results.failures().is_empty());
    }

    #[test]
    fn sorted_by_on_empty_results() {
        let results = SweepResults::default();
        assert!(results.sorted_by(FitnessMetric::TradeSharpe).is_empty());
        assert!(results.best(FitnessMetric::TradeSharpe).is_none());
    }
}
