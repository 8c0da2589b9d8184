//! PriceSample — one tick of the replay: a close price plus the strategy's signals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four boolean signals emitted by the strategy layer for a sample.
///
/// Nothing ties the flags together: any combination may be set at once.
/// [`Signals::action`] resolves them to a single action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signals {
    pub enter_long: bool,
    pub enter_short: bool,
    pub exit_long: bool,
    pub exit_short: bool,
}

/// The single action selected from a sample's signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalAction {
    EnterLong,
    EnterShort,
    /// Either exit flag; long and short exits are not distinguished.
    Exit,
    Hold,
}

impl Signals {
    pub fn enter_long() -> Self {
        Self {
            enter_long: true,
            ..Self::default()
        }
    }

    pub fn enter_short() -> Self {
        Self {
            enter_short: true,
            ..Self::default()
        }
    }

    pub fn exit_long() -> Self {
        Self {
            exit_long: true,
            ..Self::default()
        }
    }

    pub fn exit_short() -> Self {
        Self {
            exit_short: true,
            ..Self::default()
        }
    }

    /// Resolve the flags in priority order: enter long, enter short, exit, hold.
    pub fn action(&self) -> SignalAction {
        if self.enter_long {
            SignalAction::EnterLong
        } else if self.enter_short {
            SignalAction::EnterShort
        } else if self.exit_long || self.exit_short {
            SignalAction::Exit
        } else {
            SignalAction::Hold
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.enter_long || self.enter_short || self.exit_long || self.exit_short)
    }
}

/// One simulated tick: a close price and the strategy's signals for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub signals: Signals,
}

impl PriceSample {
    pub fn new(timestamp: DateTime<Utc>, close: f64, signals: Signals) -> Self {
        Self {
            timestamp,
            close,
            signals,
        }
    }

    /// A sample with no signal set.
    pub fn hold(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self::new(timestamp, close, Signals::default())
    }

    pub fn action(&self) -> SignalAction {
        self.signals.action()
    }

    /// True if the close price is finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}
