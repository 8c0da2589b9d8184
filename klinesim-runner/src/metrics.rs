//! Performance metrics — pure functions over a finished replay.
//!
//! Every metric is a pure function: equity curve and/or per-trade net P&L in,
//! scalar out. Samples are klines of arbitrary interval, so nothing here is
//! annualised.

use klinesim_core::engine::BacktestReport;
use serde::{Deserialize, Serialize};

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    /// Mean over sample standard deviation of per-trade net P&L.
    pub trade_sharpe: f64,
    /// Mean over standard deviation of per-sample equity returns.
    pub step_sharpe: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub realized_pl: f64,
    pub final_equity: f64,
}

impl PerformanceMetrics {
    pub fn compute(report: &BacktestReport) -> Self {
        let curve = equity_with_start(report);
        Self {
            total_return: total_return(&curve),
            trade_sharpe: trade_sharpe(&report.trade_pnls),
            step_sharpe: step_sharpe(&curve),
            max_drawdown: max_drawdown(&curve),
            win_rate: win_rate(&report.trade_pnls),
            profit_factor: profit_factor(&report.trade_pnls),
            trade_count: report.trade_count,
            realized_pl: report.total_realized_pl,
            final_equity: report.final_equity,
        }
    }
}

/// The equity curve with the initial capital prepended.
fn equity_with_start(report: &BacktestReport) -> Vec<f64> {
    let mut curve = Vec::with_capacity(report.equity_curve.len() + 1);
    curve.push(report.initial_capital());
    curve.extend_from_slice(&report.equity_curve);
    curve
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&final_eq)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (final_eq - initial) / initial
        }
        _ => 0.0,
    }
}

/// Risk-adjusted return over closed trades: mean(net P&L) / std(net P&L).
///
/// Returns 0.0 with fewer than two trades or zero variance.
pub fn trade_sharpe(trade_pnls: &[f64]) -> f64 {
    if trade_pnls.len() < 2 {
        return 0.0;
    }
    let std = std_dev(trade_pnls);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(trade_pnls) / std
}

/// Risk-adjusted return over the equity curve: mean / std of step returns.
///
/// Returns 0.0 if variance is zero or fewer than two returns.
pub fn step_sharpe(equity_curve: &[f64]) -> f64 {
    let returns = step_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Win rate: fraction of trades with positive net P&L.
pub fn win_rate(trade_pnls: &[f64]) -> f64 {
    if trade_pnls.is_empty() {
        return 0.0;
    }
    let winners = trade_pnls.iter().filter(|&&pl| pl > 0.0).count();
    winners as f64 / trade_pnls.len() as f64
}

/// Profit factor: gross profits / gross losses.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(trade_pnls: &[f64]) -> f64 {
    if trade_pnls.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trade_pnls.iter().filter(|&&pl| pl > 0.0).sum();
    let gross_loss: f64 = trade_pnls
        .iter()
        .filter(|&&pl| pl < 0.0)
        .map(|pl| pl.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple returns between consecutive equity points; skips non-positive bases.
pub fn step_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1).
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_return_basic() {
        assert!((total_return(&[1.0, 1.2]) - 0.2).abs() < 1e-12);
        assert_eq!(total_return(&[1.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    #[test]
    fn trade_sharpe_known_values() {
        // mean 0.2, sample std 0.2
        let pnls = [0.0, 0.2, 0.4];
        assert!((trade_sharpe(&pnls) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn trade_sharpe_degenerate_cases() {
        assert_eq!(trade_sharpe(&[]), 0.0);
        assert_eq!(trade_sharpe(&[0.5]), 0.0);
        assert_eq!(trade_sharpe(&[0.1, 0.1, 0.1]), 0.0);
    }

    #[test]
    fn trade_sharpe_sign_follows_mean() {
        assert!(trade_sharpe(&[-0.3, -0.1, 0.05]) < 0.0);
        assert!(trade_sharpe(&[0.3, 0.1, -0.05]) > 0.0);
    }

    #[test]
    fn step_sharpe_flat_curve() {
        assert_eq!(step_sharpe(&[1.0, 1.0, 1.0, 1.0]), 0.0);
    }

    #[test]
    fn max_drawdown_basic() {
        let curve = [1.0, 1.2, 0.9, 1.1];
        assert!((max_drawdown(&curve) - (-0.25)).abs() < 1e-12);
        assert_eq!(max_drawdown(&[1.0, 1.1, 1.2]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn win_rate_and_profit_factor() {
        let pnls = [0.3, -0.1, 0.2, -0.1];
        assert!((win_rate(&pnls) - 0.5).abs() < 1e-12);
        assert!((profit_factor(&pnls) - 2.5).abs() < 1e-12);
        assert_eq!(profit_factor(&[0.1, 0.2]), 100.0);
        assert_eq!(profit_factor(&[]), 0.0);
    }

    #[test]
    fn step_returns_skip_non_positive_base() {
        let returns = step_returns(&[1.0, 0.0, 0.5, 1.0]);
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - (-1.0)).abs() < 1e-12);
        assert!((returns[1] - 1.0).abs() < 1e-12);
    }
}
