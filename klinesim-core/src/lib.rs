//! klinesim core — price samples, positions, exchange simulator, replay engine.
//!
//! This crate contains the simulation core of the backtester:
//! - Domain types (price samples with strategy signals, leveraged positions)
//! - Single-position exchange simulator with commission on close
//! - Backtest engine: order sizing, signal priority, open/flip/exit state machine,
//!   equity and realized P&L accounting

pub mod domain;
pub mod engine;
pub mod exchange;

pub use domain::{Direction, Position, PositionError, PriceSample, SignalAction, Signals};
pub use engine::{
    run_backtest, BacktestEngine, BacktestReport, ConfigError, EngineConfig, EngineError,
    StepOutcome, TradeState,
};
pub use exchange::{ExchangeError, ExchangeSimulator};
