//! Single-position exchange simulator.
//!
//! Holds at most one open [`Position`] and an append-only history of closed
//! ones. The simulator does not guard against opening over an open position:
//! the replaced position is dropped without entering history. Callers must
//! close before opening again.

use crate::domain::{Direction, Position, PositionError};
use thiserror::Error;
use tracing::warn;

/// Errors from exchange operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExchangeError {
    #[error("no open position to close")]
    NoOpenPosition,
    #[error("invalid leverage {0}: must be finite and positive")]
    InvalidLeverage(f64),
    #[error("invalid commission rate {0}: must be in [0, 1)")]
    InvalidCommission(f64),
    #[error("position error: {0}")]
    Position(#[from] PositionError),
}

/// Simulated exchange for one instrument.
#[derive(Debug, Clone)]
pub struct ExchangeSimulator {
    open_position: Option<Position>,
    history: Vec<Position>,
    leverage: f64,
    commission_rate: f64,
}

impl ExchangeSimulator {
    pub fn new(leverage: f64, commission_rate: f64) -> Result<Self, ExchangeError> {
        if !(leverage.is_finite() && leverage > 0.0) {
            return Err(ExchangeError::InvalidLeverage(leverage));
        }
        if !(0.0..1.0).contains(&commission_rate) {
            return Err(ExchangeError::InvalidCommission(commission_rate));
        }
        Ok(Self {
            open_position: None,
            history: Vec::new(),
            leverage,
            commission_rate,
        })
    }

    /// Open a position at `price`, replacing any position already open.
    pub fn open(
        &mut self,
        direction: Direction,
        contracts: f64,
        price: f64,
    ) -> Result<(), ExchangeError> {
        let position = Position::open(direction, contracts, price, self.leverage)?;
        if let Some(replaced) = self.open_position.replace(position) {
            warn!(
                direction = ?replaced.direction(),
                entry_price = replaced.entry_price(),
                "open position replaced without being closed; it is not recorded in history"
            );
        }
        Ok(())
    }

    /// Close the open position at `price`.
    ///
    /// Returns the P&L net of commission: `gross * (1 - commission_rate)`.
    /// The closed position is appended to history. On error the position
    /// stays open.
    pub fn close(&mut self, price: f64) -> Result<f64, ExchangeError> {
        let mut position = self
            .open_position
            .take()
            .ok_or(ExchangeError::NoOpenPosition)?;
        match position.close(price) {
            Ok(gross) => {
                self.history.push(position);
                Ok(gross * (1.0 - self.commission_rate))
            }
            Err(e) => {
                self.open_position = Some(position);
                Err(e.into())
            }
        }
    }

    pub fn open_position(&self) -> Option<&Position> {
        self.open_position.as_ref()
    }

    /// Closed positions in close order.
    pub fn history(&self) -> &[Position] {
        &self.history
    }

    pub fn leverage(&self) -> f64 {
        self.leverage
    }

    pub fn commission_rate(&self) -> f64 {
        self.commission_rate
    }

    /// Consume the simulator, returning the open position (if any) and the history.
    pub fn into_parts(self) -> (Option<Position>, Vec<Position>) {
        (self.open_position, self.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frictionless() -> ExchangeSimulator {
        ExchangeSimulator::new(5.0, 0.0).unwrap()
    }

    #[test]
    fn close_without_open_fails() {
        let mut ex = frictionless();
        assert_eq!(ex.close(100.0), Err(ExchangeError::NoOpenPosition));
        assert!(ex.history().is_empty());
    }

    #[test]
    fn open_then_close_records_history() {
        let mut ex = frictionless();
        ex.open(Direction::Long, 10.0, 100.0).unwrap();
        assert!(ex.open_position().is_some());

        let net = ex.close(110.0).unwrap();
        assert!((net - (-0.5)).abs() < 1e-12);
        assert!(ex.open_position().is_none());
        assert_eq!(ex.history().len(), 1);
        assert_eq!(ex.history()[0].exit_price(), Some(110.0));
    }

    #[test]
    fn commission_taken_on_gross_pl() {
        let mut ex = ExchangeSimulator::new(5.0, 0.075).unwrap();
        ex.open(Direction::Short, 10.0, 100.0).unwrap();
        let net = ex.close(90.0).unwrap();
        // gross = 5 * (1 - 0.9) = 0.5
        assert!((net - 0.5 * 0.925).abs() < 1e-12);
    }

    #[test]
    fn second_close_fails() {
        let mut ex = frictionless();
        ex.open(Direction::Long, 1.0, 100.0).unwrap();
        ex.close(100.0).unwrap();
        assert_eq!(ex.close(100.0), Err(ExchangeError::NoOpenPosition));
        assert_eq!(ex.history().len(), 1);
    }

    /// Opening over an open position is unsupported usage: the replaced
    /// position is dropped and never reaches history.
    #[test]
    fn reopen_discards_open_position() {
        let mut ex = frictionless();
        ex.open(Direction::Long, 1.0, 100.0).unwrap();
        ex.open(Direction::Short, 2.0, 105.0).unwrap();

        let open = ex.open_position().unwrap();
        assert_eq!(open.direction(), Direction::Short);
        assert_eq!(open.entry_price(), 105.0);
        assert!(ex.history().is_empty());

        ex.close(105.0).unwrap();
        assert_eq!(ex.history().len(), 1);
        assert_eq!(ex.history()[0].direction(), Direction::Short);
    }

    #[test]
    fn invalid_close_price_keeps_position_open() {
        let mut ex = frictionless();
        ex.open(Direction::Long, 1.0, 100.0).unwrap();
        assert!(matches!(
            ex.close(-1.0),
            Err(ExchangeError::Position(PositionError::InvalidPrice(_)))
        ));
        assert!(ex.open_position().is_some());
        assert!(ex.history().is_empty());
    }

    #[test]
    fn failed_close_can_be_retried() {
        let mut ex = frictionless();
        ex.open(Direction::Short, 3.0, 100.0).unwrap();
        assert!(ex.close(f64::NAN).is_err());

        let open = ex.open_position().unwrap();
        assert!(open.is_open());
        assert_eq!(open.contracts(), 3.0);

        let net = ex.close(90.0).unwrap();
        assert!((net - 0.5).abs() < 1e-12);
        assert!(ex.open_position().is_none());
        assert_eq!(ex.history().len(), 1);
        assert_eq!(ex.history()[0].entry_price(), 100.0);
        assert_eq!(ex.history()[0].exit_price(), Some(90.0));
    }

    #[test]
    fn open_rejects_non_positive_contracts() {
        let mut ex = frictionless();
        assert!(matches!(
            ex.open(Direction::Long, 0.0, 100.0),
            Err(ExchangeError::Position(PositionError::InvalidContracts(_)))
        ));
        assert!(ex.open_position().is_none());
    }

    #[test]
    fn construction_validates_parameters() {
        assert!(matches!(
            ExchangeSimulator::new(0.0, 0.1),
            Err(ExchangeError::InvalidLeverage(_))
        ));
        assert!(matches!(
            ExchangeSimulator::new(5.0, 1.0),
            Err(ExchangeError::InvalidCommission(_))
        ));
        assert!(matches!(
            ExchangeSimulator::new(5.0, -0.01),
            Err(ExchangeError::InvalidCommission(_))
        ));
    }
}
