//! klinesim CLI — replay strategy signals through the leveraged exchange simulator.
//!
//! Commands:
//! - `run` — execute a single backtest from a TOML config, a strategy CSV, or synthetic samples
//! - `sweep` — grid-search engine parameters, optionally validating the winner on held-out samples
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use klinesim_core::engine::EngineConfig;
use klinesim_runner::report::{save_artifacts, summary};
use klinesim_runner::{
    load_samples, run_from_config, validate_sweep, BacktestConfig, DataConfig, FitnessMetric,
    ParamGrid, ParamSweep,
};

#[derive(Parser)]
#[command(
    name = "klinesim",
    about = "klinesim — leveraged single-position backtest simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay one engine configuration over a sample sequence.
    Run {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        engine: EngineArgs,

        /// Write result.json, trades.csv and equity.csv under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Print the full result as JSON instead of the text summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Grid-search engine parameters over a sample sequence.
    Sweep {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        engine: EngineArgs,

        /// Stake fractions to try (comma separated).
        #[arg(long, value_delimiter = ',', default_values_t = ParamGrid::default().stake_percents)]
        stakes: Vec<f64>,

        /// Leverages to try (comma separated).
        #[arg(long, value_delimiter = ',', default_values_t = ParamGrid::default().leverages)]
        leverages: Vec<f64>,

        /// Pyramid caps to try (comma separated).
        #[arg(long, value_delimiter = ',', default_values_t = ParamGrid::default().max_pyramids)]
        pyramids: Vec<u32>,

        /// Commission rates to try (comma separated).
        #[arg(long, value_delimiter = ',', default_values_t = ParamGrid::default().commission_rates)]
        commissions: Vec<f64>,

        /// Ranking metric: trade_sharpe, step_sharpe, total_return, realized_pl, win_rate, profit_factor.
        #[arg(long, default_value_t = FitnessMetric::default())]
        fitness: FitnessMetric,

        /// Number of ranked configurations to print.
        #[arg(long, default_value_t = 5)]
        top: usize,

        /// Run configurations one at a time instead of in parallel.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Sweep on the leading windows only and test the winner on the rest.
        #[arg(long, default_value_t = false)]
        validate: bool,

        /// Save artifacts for the best configuration under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

/// Where samples come from. Exactly one is required.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Strategy CSV (timestamp,close,long,short,exitlong,exitshort).
    #[arg(long)]
    data: Option<PathBuf>,

    /// Generate this many synthetic samples.
    #[arg(long)]
    synthetic: Option<usize>,
}

/// Overrides applied on top of the config file (or the defaults).
#[derive(Args)]
struct EngineArgs {
    #[arg(long)]
    stake_percent: Option<f64>,
    #[arg(long)]
    leverage: Option<f64>,
    #[arg(long)]
    commission_rate: Option<f64>,
    #[arg(long)]
    max_pyramid: Option<u32>,
    #[arg(long)]
    initial_capital: Option<f64>,

    /// Seed for synthetic samples.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

impl EngineArgs {
    fn apply(&self, mut engine: EngineConfig) -> EngineConfig {
        if let Some(v) = self.stake_percent {
            engine = engine.with_stake_percent(v);
        }
        if let Some(v) = self.leverage {
            engine = engine.with_leverage(v);
        }
        if let Some(v) = self.commission_rate {
            engine = engine.with_commission_rate(v);
        }
        if let Some(v) = self.max_pyramid {
            engine = engine.with_max_pyramid(v);
        }
        if let Some(v) = self.initial_capital {
            engine = engine.with_initial_capital(v);
        }
        engine
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            source,
            engine,
            output_dir,
            json,
        } => run_cmd(&source, &engine, output_dir, json),
        Commands::Sweep {
            source,
            engine,
            stakes,
            leverages,
            pyramids,
            commissions,
            fitness,
            top,
            sequential,
            validate,
            output_dir,
        } => {
            let grid = ParamGrid {
                stake_percents: stakes,
                leverages,
                max_pyramids: pyramids,
                commission_rates: commissions,
            };
            let opts = SweepOpts {
                fitness,
                top,
                sequential,
                validate,
                output_dir,
            };
            sweep_cmd(&source, &engine, &grid, &opts)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(source: &SourceArgs, engine: &EngineArgs) -> Result<BacktestConfig> {
    let mut config = if let Some(path) = &source.config {
        BacktestConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?
    } else {
        let data = match (&source.data, source.synthetic) {
            (Some(path), _) => DataConfig {
                path: Some(path.clone()),
                ..DataConfig::default()
            },
            (None, Some(len)) => DataConfig {
                synthetic: true,
                synthetic_len: len,
                seed: engine.seed,
                ..DataConfig::default()
            },
            (None, None) => DataConfig::default(),
        };
        BacktestConfig {
            engine: EngineConfig::default(),
            data,
            validation: None,
        }
    };
    config.engine = engine.apply(config.engine);
    config.validate()?;
    debug!(?config, "resolved configuration");
    Ok(config)
}

fn run_cmd(
    source: &SourceArgs,
    engine: &EngineArgs,
    output_dir: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let config = build_config(source, engine)?;
    let result = run_from_config(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", summary(&result));
    }

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&dir, &result)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

struct SweepOpts {
    fitness: FitnessMetric,
    top: usize,
    sequential: bool,
    validate: bool,
    output_dir: Option<PathBuf>,
}

fn sweep_cmd(
    source: &SourceArgs,
    engine: &EngineArgs,
    grid: &ParamGrid,
    opts: &SweepOpts,
) -> Result<()> {
    let config = build_config(source, engine)?;
    let loaded = load_samples(&config.data)?;
    let sweep = ParamSweep::new().with_parallelism(!opts.sequential);

    if opts.validate {
        let validation = config.validation.clone().unwrap_or_default();
        let report = validate_sweep(
            &sweep,
            grid,
            &config.engine,
            &loaded,
            &validation,
            opts.fitness,
        )?;

        println!(
            "Training: {} samples, {} configurations, best {} = {:.4}",
            report.train_samples,
            report.train_runs,
            report.metric,
            report.metric.extract(&report.train_best.metrics)
        );
        println!("Validation report ({} samples):", report.test_samples);
        print!("{}", summary(&report.test));
        println!(
            "Validation {}: trade Sharpe {:.4} vs threshold {}",
            if report.passed { "PASSED" } else { "FAILED" },
            report.test.metrics.trade_sharpe,
            report.min_sharpe
        );
        if let Some(dir) = &opts.output_dir {
            let run_dir = save_artifacts(dir, &report.test)?;
            println!("Artifacts saved to: {}", run_dir.display());
        }
        return Ok(());
    }

    let results = sweep.sweep(
        grid,
        &config.engine,
        &loaded.samples,
        &loaded.dataset_hash,
        loaded.synthetic,
    );

    println!(
        "{} configurations ({} failed), ranked by {}",
        results.len() + results.failures().len(),
        results.failures().len(),
        opts.fitness
    );
    println!(
        "{:>4}  {:>7}  {:>8}  {:>7}  {:>10}  {:>7}  {:>12}",
        "rank", "stake", "leverage", "pyramid", "commission", "trades", opts.fitness
    );
    for (rank, result) in results.top_n(opts.fitness, opts.top).iter().enumerate() {
        let c = result.config();
        println!(
            "{:>4}  {:>7.4}  {:>8}  {:>7}  {:>10.4}  {:>7}  {:>12.4}",
            rank + 1,
            c.stake_percent,
            c.leverage,
            c.max_pyramid,
            c.commission_rate,
            result.report.trade_count,
            opts.fitness.extract(&result.metrics)
        );
    }
    for failure in results.failures() {
        println!(
            "  failed: stake {} leverage {}: {}",
            failure.config.stake_percent, failure.config.leverage, failure.error
        );
    }

    if let Some(best) = results.best(opts.fitness) {
        println!();
        print!("{}", summary(best));
        if let Some(dir) = &opts.output_dir {
            let run_dir = save_artifacts(dir, best)?;
            println!("Artifacts saved to: {}", run_dir.display());
        }
    }
    Ok(())
}
