//! The per-sample step: sizing, signal dispatch, equity accounting.

use crate::domain::{Direction, PriceSample};
use crate::exchange::{ExchangeError, ExchangeSimulator};
use thiserror::Error;
use tracing::{debug, info};

use super::config::{order_contracts, ConfigError, EngineConfig};
use super::state::{transition, EngineState, TradeState, Transition};

/// Errors from running the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),
    #[error("sample {index}: invalid close price {price}")]
    InvalidSample { index: usize, price: f64 },
    #[error("sample {index}: equity {equity} leaves no margin to open a position")]
    AccountDepleted { index: usize, equity: f64 },
}

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    Opened(Direction),
    /// Closed the previous position (realizing `net_pl`) and opened `to`.
    Flipped { to: Direction, net_pl: f64 },
    Exited { net_pl: f64 },
    /// Same-direction entry below the pyramid cap. Adding to a position is
    /// not simulated, so nothing changes.
    PyramidNotImplemented,
    /// Same-direction entry at the pyramid cap.
    PyramidCapped,
    Ignored,
}

/// Apply one sample to the run state.
///
/// All checks run before any mutation, so an `Err` leaves `state` and
/// `exchange` exactly as they were.
pub fn step(
    config: &EngineConfig,
    exchange: &mut ExchangeSimulator,
    state: &mut EngineState,
    index: usize,
    sample: &PriceSample,
) -> Result<StepOutcome, EngineError> {
    let price = sample.close;
    if !sample.is_valid() {
        return Err(EngineError::InvalidSample { index, price });
    }

    // Sized from equity at the start of the step, before any exit this step.
    let contracts = order_contracts(config, state.total_equity, price);
    let action = transition(state.trade_state, sample.action());

    if matches!(action, Transition::Open(_) | Transition::Flip(_))
        && !(contracts.is_finite() && contracts > 0.0)
    {
        return Err(EngineError::AccountDepleted {
            index,
            equity: state.total_equity,
        });
    }
    if matches!(action, Transition::Flip(_) | Transition::Exit)
        && exchange.open_position().is_none()
    {
        return Err(ExchangeError::NoOpenPosition.into());
    }

    let outcome = match action {
        Transition::Open(direction) => {
            open(config, exchange, state, direction, contracts, price)?;
            debug!(index, ?direction, contracts, price, "opened position");
            StepOutcome::Opened(direction)
        }
        Transition::Flip(direction) => {
            let net_pl = exit(exchange, state, price)?;
            open(config, exchange, state, direction, contracts, price)?;
            debug!(index, to = ?direction, net_pl, price, "flipped position");
            StepOutcome::Flipped {
                to: direction,
                net_pl,
            }
        }
        Transition::Exit => {
            let net_pl = exit(exchange, state, price)?;
            debug!(index, net_pl, price, "closed position");
            StepOutcome::Exited { net_pl }
        }
        Transition::Pyramid if state.pyramid_size < config.max_pyramid => {
            info!(
                index,
                pyramid_size = state.pyramid_size,
                max_pyramid = config.max_pyramid,
                "pyramiding orders not implemented, entry ignored"
            );
            StepOutcome::PyramidNotImplemented
        }
        Transition::Pyramid => StepOutcome::PyramidCapped,
        Transition::Ignore => StepOutcome::Ignored,
    };

    state.steps += 1;
    state.equity_curve.push(state.total_equity);
    Ok(outcome)
}

fn open(
    config: &EngineConfig,
    exchange: &mut ExchangeSimulator,
    state: &mut EngineState,
    direction: Direction,
    contracts: f64,
    price: f64,
) -> Result<(), EngineError> {
    exchange.open(direction, contracts, price)?;
    state.pyramid_size = 1;
    // Stake deducted from equity as it stands now, after any exit this step.
    state.total_equity -= config.stake_percent * state.total_equity;
    state.trade_state = TradeState::holding(direction);
    Ok(())
}

fn exit(
    exchange: &mut ExchangeSimulator,
    state: &mut EngineState,
    price: f64,
) -> Result<f64, EngineError> {
    let net_pl = exchange.close(price)?;
    state.total_realized_pl += net_pl;
    state.total_equity += net_pl;
    state.trade_count += 1;
    state.trade_pnls.push(net_pl);
    state.pyramid_size = 0;
    state.trade_state = TradeState::NoPosition;
    Ok(net_pl)
}
