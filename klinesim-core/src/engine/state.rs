//! Trade state machine and the mutable per-run state.

use crate::domain::{Direction, SignalAction};
use serde::{Deserialize, Serialize};

/// Which position, if any, the engine currently holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeState {
    #[default]
    NoPosition,
    LongOpen,
    ShortOpen,
}

impl TradeState {
    pub fn holding(direction: Direction) -> Self {
        match direction {
            Direction::Long => TradeState::LongOpen,
            Direction::Short => TradeState::ShortOpen,
        }
    }

    pub fn direction(self) -> Option<Direction> {
        match self {
            TradeState::NoPosition => None,
            TradeState::LongOpen => Some(Direction::Long),
            TradeState::ShortOpen => Some(Direction::Short),
        }
    }
}

/// What a sample's action does in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Open a fresh position from flat.
    Open(Direction),
    /// Close the open position, then open the opposite one.
    Flip(Direction),
    /// Close the open position and go flat.
    Exit,
    /// Entry signal in the direction already held.
    Pyramid,
    Ignore,
}

/// The transition table, one arm per `(state, action)` pair.
pub fn transition(state: TradeState, action: SignalAction) -> Transition {
    use SignalAction::*;
    use TradeState::*;

    match (state, action) {
        (NoPosition, EnterLong) => Transition::Open(Direction::Long),
        (NoPosition, EnterShort) => Transition::Open(Direction::Short),
        (LongOpen, EnterLong) | (ShortOpen, EnterShort) => Transition::Pyramid,
        (LongOpen, EnterShort) => Transition::Flip(Direction::Short),
        (ShortOpen, EnterLong) => Transition::Flip(Direction::Long),
        (LongOpen, Exit) | (ShortOpen, Exit) => Transition::Exit,
        (NoPosition, Exit) | (_, Hold) => Transition::Ignore,
    }
}

/// Mutable state that evolves sample-by-sample during a replay.
///
/// Only the engine's step function mutates it.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub trade_state: TradeState,
    pub total_equity: f64,
    /// Sum of net P&L over closed trades.
    pub total_realized_pl: f64,
    /// Incremented once per close.
    pub trade_count: usize,
    pub pyramid_size: u32,
    /// Samples processed so far.
    pub steps: usize,
    /// Equity after each processed sample.
    pub equity_curve: Vec<f64>,
    /// Net P&L of each close, in close order.
    pub trade_pnls: Vec<f64>,
}

impl EngineState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            trade_state: TradeState::NoPosition,
            total_equity: initial_capital,
            total_realized_pl: 0.0,
            trade_count: 0,
            pyramid_size: 0,
            steps: 0,
            equity_curve: Vec::new(),
            trade_pnls: Vec::new(),
        }
    }
}
