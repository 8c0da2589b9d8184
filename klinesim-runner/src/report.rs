//! Reporting and export — text summary, JSON and CSV artifacts.
//!
//! Provides:
//! - **Summary**: plain-text run report (positions, realized P&L, equity, Sharpe)
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: closed-trade tape and per-sample equity curve
//!
//! Persisted results carry a `schema_version`; newer versions are rejected on load.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use klinesim_core::domain::Position;

use crate::runner::{BacktestResult, SCHEMA_VERSION};

pub const RESULT_FILE: &str = "result.json";
pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity.csv";

// ─── Summary ────────────────────────────────────────────────────────

/// Human-readable report for a single run.
pub fn summary(result: &BacktestResult) -> String {
    let report = &result.report;
    let m = &result.metrics;
    let mut out = String::with_capacity(1024);

    let _ = writeln!(out, "Backtest {}", short_id(&result.config_id));
    if result.synthetic {
        let _ = writeln!(out, "  data            SYNTHETIC");
    }
    let _ = writeln!(out, "  dataset         {}", short_id(&result.dataset_hash));
    let _ = writeln!(out, "  samples         {}", report.sample_count);
    let _ = writeln!(
        out,
        "  engine          stake {:.2}%  leverage {}x  commission {:.3}  max pyramid {}",
        report.config.stake_percent * 100.0,
        report.config.leverage,
        report.config.commission_rate,
        report.config.max_pyramid
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Closed positions ({})", report.history.len());
    for (i, (position, net)) in report.history.iter().zip(&report.trade_pnls).enumerate() {
        let _ = writeln!(out, "  {:>4}  {}  net {:+.6}", i + 1, describe(position), net);
    }
    if let Some(open) = &report.open_position {
        let _ = writeln!(out, "Open position (unrealized)");
        let _ = writeln!(out, "        {}", describe(open));
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "  realized P&L    {:+.6}", report.total_realized_pl);
    let _ = writeln!(
        out,
        "  equity          {:.6} -> {:.6} ({:+.2}%)",
        report.initial_capital(),
        report.final_equity,
        m.total_return * 100.0
    );
    let _ = writeln!(out, "  trades          {}", report.trade_count);
    let _ = writeln!(out, "  trade Sharpe    {:.4}", m.trade_sharpe);
    let _ = writeln!(out, "  step Sharpe     {:.4}", m.step_sharpe);
    let _ = writeln!(out, "  max drawdown    {:.2}%", m.max_drawdown * 100.0);
    let _ = writeln!(out, "  win rate        {:.1}%", m.win_rate * 100.0);
    let _ = writeln!(out, "  profit factor   {:.2}", m.profit_factor);
    out
}

fn describe(position: &Position) -> String {
    let exit = position
        .exit_price()
        .map(|p| format!("{p:.2}"))
        .unwrap_or_else(|| "-".into());
    format!(
        "{:<5}  {:.4} contracts  entry {:.2}  exit {}",
        format!("{:?}", position.direction()),
        position.contracts(),
        position.entry_price(),
        exit
    )
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

pub fn write_result_json(path: &Path, result: &BacktestResult) -> Result<()> {
    let json = export_json(result)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export closed trades as CSV.
///
/// Columns: trade, direction, contracts, entry_price, exit_price, leverage,
/// gross_pl, net_pl
pub fn export_trades_csv(result: &BacktestResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "trade",
        "direction",
        "contracts",
        "entry_price",
        "exit_price",
        "leverage",
        "gross_pl",
        "net_pl",
    ])?;

    let report = &result.report;
    for (i, (p, net)) in report.history.iter().zip(&report.trade_pnls).enumerate() {
        wtr.write_record([
            &i.to_string(),
            &format!("{:?}", p.direction()),
            &format!("{:.6}", p.contracts()),
            &format!("{:.6}", p.entry_price()),
            &p.exit_price().map(|x| format!("{x:.6}")).unwrap_or_default(),
            &format!("{}", p.leverage()),
            &p.realized_pl().map(|x| format!("{x:.8}")).unwrap_or_default(),
            &format!("{net:.8}"),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the equity curve as CSV with sample_index and equity columns.
pub fn export_equity_csv(equity_curve: &[f64]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["sample_index", "equity"])?;
    for (i, eq) in equity_curve.iter().enumerate() {
        wtr.write_record([&i.to_string(), &format!("{eq:.8}")])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn write_trades_csv(path: &Path, result: &BacktestResult) -> Result<()> {
    let csv = export_trades_csv(result)?;
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single run.
///
/// Creates `{config_id[..12]}_{dataset_hash[..12]}/` under `output_dir`
/// containing `result.json`, `trades.csv` and `equity.csv`. Re-running the same
/// configuration on the same data overwrites the same directory.
///
/// Returns the path to the created directory.
pub fn save_artifacts(output_dir: &Path, result: &BacktestResult) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}",
        short_id(&result.config_id),
        short_id(&result.dataset_hash)
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    write_result_json(&run_dir.join(RESULT_FILE), result)?;
    write_trades_csv(&run_dir.join(TRADES_FILE), result)?;

    let equity_path = run_dir.join(EQUITY_FILE);
    let equity_csv = export_equity_csv(&result.report.equity_curve)?;
    std::fs::write(&equity_path, equity_csv)
        .with_context(|| format!("failed to write {}", equity_path.display()))?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join(RESULT_FILE);
    let json =
        std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
