//! Backtesting engine — sample-by-sample replay against a single-position exchange.
//!
//! Each step:
//! 1. Size an order from equity at the start of the step
//! 2. Resolve the sample's signals to one action (long > short > exit > hold)
//! 3. Dispatch `(state, action)` through the transition table
//! 4. Apply the open / flip / exit and update equity, trade count and realized P&L

pub mod backtest;
pub mod config;
pub mod state;
pub mod step;

pub use backtest::{run_backtest, BacktestEngine, BacktestReport};
pub use config::{order_contracts, ConfigError, EngineConfig};
pub use state::{transition, EngineState, TradeState, Transition};
pub use step::{step, EngineError, StepOutcome};
