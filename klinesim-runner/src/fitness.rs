//! Fitness function — configurable metric selector for ranking engine settings.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::metrics::PerformanceMetrics;
use serde::{Deserialize, Serialize};

/// Which metric to optimize/sort by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessMetric {
    #[default]
    TradeSharpe,
    StepSharpe,
    TotalReturn,
    RealizedPl,
    WinRate,
    ProfitFactor,
}

impl FitnessMetric {
    pub const ALL: [FitnessMetric; 6] = [
        Self::TradeSharpe,
        Self::StepSharpe,
        Self::TotalReturn,
        Self::RealizedPl,
        Self::WinRate,
        Self::ProfitFactor,
    ];

    /// Extract the relevant metric value from a PerformanceMetrics struct.
    pub fn extract(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::TradeSharpe => metrics.trade_sharpe,
            Self::StepSharpe => metrics.step_sharpe,
            Self::TotalReturn => metrics.total_return,
            Self::RealizedPl => metrics.realized_pl,
            Self::WinRate => metrics.win_rate,
            Self::ProfitFactor => metrics.profit_factor,
        }
    }

    /// Returns true if `a` is better than `b`. Higher is better for every
    /// metric; NaN is worse than any number.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        rank_key(a).total_cmp(&rank_key(b)).is_gt()
    }

    /// Total order over metric sets, best first.
    pub fn rank(&self, a: &PerformanceMetrics, b: &PerformanceMetrics) -> Ordering {
        let (x, y) = (self.extract(a), self.extract(b));
        if self.is_better(x, y) {
            Ordering::Less
        } else if self.is_better(y, x) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TradeSharpe => "trade_sharpe",
            Self::StepSharpe => "step_sharpe",
            Self::TotalReturn => "total_return",
            Self::RealizedPl => "realized_pl",
            Self::WinRate => "win_rate",
            Self::ProfitFactor => "profit_factor",
        }
    }
}

fn rank_key(value: f64) -> f64 {
    if value.is_nan() {
        f64::NEG_INFINITY
    } else {
        value
    }
}

impl fmt::Display for FitnessMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for FitnessMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|m| m.name() == normalized)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|m| m.name()).collect();
                format!("unknown fitness metric '{s}' (expected one of: {})", names.join(", "))
            })
    }
}
