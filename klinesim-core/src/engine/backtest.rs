//! BacktestEngine — owns the exchange and run state and drives the replay.

use crate::domain::{Position, PriceSample};
use crate::exchange::ExchangeSimulator;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::EngineConfig;
use super::state::{EngineState, TradeState};
use super::step::{step, EngineError, StepOutcome};

/// Replays price samples through a single-position exchange.
///
/// One engine per run: nothing is shared between instances.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: EngineConfig,
    exchange: ExchangeSimulator,
    state: EngineState,
}

impl BacktestEngine {
    /// Validates `config` before anything runs.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let exchange = ExchangeSimulator::new(config.leverage, config.commission_rate)?;
        Ok(Self {
            config,
            exchange,
            state: EngineState::new(config.initial_capital),
        })
    }

    /// Process the next sample.
    pub fn step(&mut self, sample: &PriceSample) -> Result<StepOutcome, EngineError> {
        let index = self.state.steps;
        step(
            &self.config,
            &mut self.exchange,
            &mut self.state,
            index,
            sample,
        )
    }

    /// Process every sample in order, stopping at the first error.
    pub fn replay(&mut self, samples: &[PriceSample]) -> Result<(), EngineError> {
        for sample in samples {
            self.step(sample)?;
        }
        debug!(
            samples = samples.len(),
            trades = self.state.trade_count,
            equity = self.state.total_equity,
            "replay complete"
        );
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn exchange(&self) -> &ExchangeSimulator {
        &self.exchange
    }

    pub fn trade_state(&self) -> TradeState {
        self.state.trade_state
    }

    pub fn total_equity(&self) -> f64 {
        self.state.total_equity
    }

    pub fn total_realized_pl(&self) -> f64 {
        self.state.total_realized_pl
    }

    pub fn trade_count(&self) -> usize {
        self.state.trade_count
    }

    pub fn history(&self) -> &[Position] {
        self.exchange.history()
    }

    /// Snapshot of the run so far.
    pub fn report(&self) -> BacktestReport {
        self.clone().into_report()
    }

    pub fn into_report(self) -> BacktestReport {
        let (open_position, history) = self.exchange.into_parts();
        BacktestReport {
            config: self.config,
            final_equity: self.state.total_equity,
            total_realized_pl: self.state.total_realized_pl,
            trade_count: self.state.trade_count,
            history,
            open_position,
            trade_pnls: self.state.trade_pnls,
            equity_curve: self.state.equity_curve,
            sample_count: self.state.steps,
            final_state: self.state.trade_state,
        }
    }
}

/// Result of a complete replay.
///
/// A position still open after the last sample is reported as
/// `open_position` and contributes nothing to the realized totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub config: EngineConfig,
    pub final_equity: f64,
    pub total_realized_pl: f64,
    pub trade_count: usize,
    /// Closed positions in close order.
    pub history: Vec<Position>,
    pub open_position: Option<Position>,
    /// Net P&L per closed trade, aligned with `history`.
    pub trade_pnls: Vec<f64>,
    /// Equity after each sample.
    pub equity_curve: Vec<f64>,
    pub sample_count: usize,
    pub final_state: TradeState,
}

impl BacktestReport {
    pub fn initial_capital(&self) -> f64 {
        self.config.initial_capital
    }
}

/// Run a full backtest over `samples` with a fresh engine.
pub fn run_backtest(
    config: EngineConfig,
    samples: &[PriceSample],
) -> Result<BacktestReport, EngineError> {
    let mut engine = BacktestEngine::new(config)?;
    engine.replay(samples)?;
    Ok(engine.into_report())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Signals;
    use crate::engine::config::ConfigError;
    use chrono::{DateTime, Utc};

    fn samples(rows: &[(f64, Signals)]) -> Vec<PriceSample> {
        rows.iter()
            .enumerate()
            .map(|(i, &(close, signals))| {
                let ts = DateTime::<Utc>::from_timestamp(1_600_000_000 + 300 * i as i64, 0)
                    .unwrap();
                PriceSample::new(ts, close, signals)
            })
            .collect()
    }

    #[test]
    fn new_rejects_invalid_config() {
        let err = BacktestEngine::new(EngineConfig::default().with_stake_percent(0.0)).unwrap_err();
        assert_eq!(err, EngineError::Config(ConfigError::StakePercent(0.0)));
    }

    #[test]
    fn empty_replay_keeps_initial_capital() {
        let report = run_backtest(EngineConfig::default(), &[]).unwrap();
        assert_eq!(report.final_equity, 1.0);
        assert_eq!(report.trade_count, 0);
        assert!(report.history.is_empty());
        assert_eq!(report.final_state, TradeState::NoPosition);
    }

    #[test]
    fn step_index_follows_sample_count() {
        let mut engine = BacktestEngine::new(EngineConfig::default()).unwrap();
        let data = samples(&[(100.0, Signals::default()), (-1.0, Signals::default())]);
        engine.step(&data[0]).unwrap();
        let err = engine.step(&data[1]).unwrap_err();
        assert_eq!(err, EngineError::InvalidSample { index: 1, price: -1.0 });
    }

    #[test]
    fn open_position_left_unrealized() {
        let data = samples(&[(100.0, Signals::enter_long()), (120.0, Signals::default())]);
        let report = run_backtest(EngineConfig::default(), &data).unwrap();

        assert_eq!(report.trade_count, 0);
        assert_eq!(report.total_realized_pl, 0.0);
        assert!(report.history.is_empty());
        let open = report.open_position.as_ref().unwrap();
        assert!(open.is_open());
        assert_eq!(report.final_state, TradeState::LongOpen);
        assert_eq!(report.equity_curve.len(), 2);
    }

    #[test]
    fn report_snapshot_does_not_consume_engine() {
        let data = samples(&[(100.0, Signals::enter_short()), (95.0, Signals::exit_short())]);
        let mut engine = BacktestEngine::new(EngineConfig::default()).unwrap();
        engine.replay(&data).unwrap();
        let snapshot = engine.report();
        assert_eq!(snapshot, engine.into_report());
    }

    #[test]
    fn report_serialization_roundtrip() {
        let data = samples(&[(100.0, Signals::enter_long()), (101.0, Signals::exit_long())]);
        let report = run_backtest(EngineConfig::default(), &data).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        let deser: BacktestReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.trade_count, deser.trade_count);
        assert_eq!(report.history.len(), deser.history.len());
        assert_eq!(report.final_state, deser.final_state);
        assert!((report.final_equity - deser.final_equity).abs() < 1e-12);
    }
}
