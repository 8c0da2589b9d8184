//! Position — a single leveraged trade, immutable once closed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

/// Errors from creating or closing a position.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    #[error("position already closed")]
    AlreadyClosed,
    #[error("invalid price {0}: must be finite and positive")]
    InvalidPrice(f64),
    #[error("invalid contract size {0}: must be finite and positive")]
    InvalidContracts(f64),
    #[error("invalid leverage {0}: must be finite and positive")]
    InvalidLeverage(f64),
}

/// A leveraged position in one instrument.
///
/// A position without an exit price is open. The exit price is set exactly once
/// by [`Position::close`]; after that nothing about the position can change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    direction: Direction,
    contracts: f64,
    entry_price: f64,
    leverage: f64,
    exit_price: Option<f64>,
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl Position {
    /// Only the exchange simulator opens positions.
    pub(crate) fn open(
        direction: Direction,
        contracts: f64,
        entry_price: f64,
        leverage: f64,
    ) -> Result<Self, PositionError> {
        if !is_positive(contracts) {
            return Err(PositionError::InvalidContracts(contracts));
        }
        if !is_positive(entry_price) {
            return Err(PositionError::InvalidPrice(entry_price));
        }
        if !is_positive(leverage) {
            return Err(PositionError::InvalidLeverage(leverage));
        }
        Ok(Self {
            direction,
            contracts,
            entry_price,
            leverage,
            exit_price: None,
        })
    }

    /// Close at `exit_price` and return the realized P&L.
    ///
    /// `realized = leverage * (1 - |exit / entry|)`. The formula ignores
    /// direction: long and short positions realize the same amount for the
    /// same price move.
    pub fn close(&mut self, exit_price: f64) -> Result<f64, PositionError> {
        if self.exit_price.is_some() {
            return Err(PositionError::AlreadyClosed);
        }
        if !is_positive(exit_price) {
            return Err(PositionError::InvalidPrice(exit_price));
        }
        self.exit_price = Some(exit_price);
        Ok(self.realized_for(exit_price))
    }

    /// Realized P&L of a closed position, `None` while open.
    pub fn realized_pl(&self) -> Option<f64> {
        self.exit_price.map(|exit| self.realized_for(exit))
    }

    fn realized_for(&self, exit_price: f64) -> f64 {
        self.leverage * (1.0 - (exit_price / self.entry_price).abs())
    }

    pub fn is_open(&self) -> bool {
        self.exit_price.is_none()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn contracts(&self) -> f64 {
        self.contracts
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn exit_price(&self) -> Option<f64> {
        self.exit_price
    }

    pub fn leverage(&self) -> f64 {
        self.leverage
    }
}
