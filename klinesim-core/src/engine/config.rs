//! Engine configuration and eager validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors, raised before any sample is processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("max_pyramid must be at least 1")]
    ZeroPyramid,
    #[error("stake_percent {0} must be in (0, 1]")]
    StakePercent(f64),
    #[error("initial_capital {0} must be finite and positive")]
    InitialCapital(f64),
    #[error("leverage {0} must be finite and positive")]
    Leverage(f64),
    #[error("commission_rate {0} must be in [0, 1)")]
    CommissionRate(f64),
    #[error(
        "commission_rate * leverage = {0} must be below 1, otherwise every order size is non-positive"
    )]
    CommissionExceedsMargin(f64),
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Cap on same-direction entries. Pyramiding itself is not simulated.
    pub max_pyramid: u32,
    /// Fraction of current equity staked as margin per entry.
    pub stake_percent: f64,
    pub initial_capital: f64,
    pub leverage: f64,
    /// Fraction of gross P&L taken by the exchange on close.
    pub commission_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pyramid: 1,
            stake_percent: 0.05,
            initial_capital: 1.0,
            leverage: 5.0,
            commission_rate: 0.075,
        }
    }
}

impl EngineConfig {
    pub fn with_max_pyramid(mut self, max_pyramid: u32) -> Self {
        self.max_pyramid = max_pyramid;
        self
    }

    pub fn with_stake_percent(mut self, stake_percent: f64) -> Self {
        self.stake_percent = stake_percent;
        self
    }

    pub fn with_initial_capital(mut self, initial_capital: f64) -> Self {
        self.initial_capital = initial_capital;
        self
    }

    pub fn with_leverage(mut self, leverage: f64) -> Self {
        self.leverage = leverage;
        self
    }

    pub fn with_commission_rate(mut self, commission_rate: f64) -> Self {
        self.commission_rate = commission_rate;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pyramid == 0 {
            return Err(ConfigError::ZeroPyramid);
        }
        if !(self.stake_percent > 0.0 && self.stake_percent <= 1.0) {
            return Err(ConfigError::StakePercent(self.stake_percent));
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(ConfigError::InitialCapital(self.initial_capital));
        }
        if !(self.leverage.is_finite() && self.leverage > 0.0) {
            return Err(ConfigError::Leverage(self.leverage));
        }
        if !(0.0..1.0).contains(&self.commission_rate) {
            return Err(ConfigError::CommissionRate(self.commission_rate));
        }
        let margin_cost = self.commission_rate * self.leverage;
        if margin_cost >= 1.0 {
            return Err(ConfigError::CommissionExceedsMargin(margin_cost));
        }
        Ok(())
    }
}

/// Contract quantity for a new order at `price`, staking a fraction of `equity`.
///
/// The stake is converted to contracts with the commission cost of leverage
/// netted out up front.
pub fn order_contracts(config: &EngineConfig, equity: f64, price: f64) -> f64 {
    let order_size = config.stake_percent * equity;
    order_size * (1.0 - config.commission_rate * config.leverage) * price * config.leverage
}
