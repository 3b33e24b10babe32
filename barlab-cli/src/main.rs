//! barlab CLI — run and check commands.
//!
//! Commands:
//! - `run` — replay CSV or synthetic bars under a TOML config, print a
//!   summary and optionally write artifacts
//! - `check` — validate a config file, optionally against a CSV file

mod obs;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use barlab_core::domain::BarSeries;
use barlab_core::strategy::SignalSource;
use barlab_runner::{
    export_json, load_csv, random_walk, run_from_config, save_artifacts, walk_forward,
    BacktestConfig, BacktestResult, SyntheticConfig, WalkForwardConfig,
};
use clap::{Args, Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "barlab", about = "barlab CLI — bar-replay backtesting engine")]
struct Cli {
    /// Log level when BARLAB_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log format: text or json.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DataArgs {
    /// CSV file with timestamp,open,high,low,close,volume columns.
    #[arg(long, conflicts_with = "synthetic")]
    data: Option<PathBuf>,

    /// Use seeded random-walk bars instead of a CSV file.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Number of synthetic bars.
    #[arg(long, default_value_t = 252)]
    bars: usize,

    /// Seed for synthetic bars.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest.
    Run {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        data: DataArgs,

        /// Write result.json, trades.csv and equity.csv here.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Print the full result as JSON instead of the summary.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Walk-forward window length in bars.
        #[arg(long, requires = "step")]
        window: Option<usize>,

        /// Walk-forward step in bars.
        #[arg(long, requires = "window")]
        step: Option<usize>,
    },
    /// Validate a config file.
    Check {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Also check the config against this CSV file.
        #[arg(long)]
        data: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    obs::init_tracing(&cli.log_level, obs::LogFormat::parse(&cli.log_format)?)?;

    match cli.command {
        Commands::Run {
            config,
            data,
            output_dir,
            json,
            window,
            step,
        } => {
            let config = load_config(config.as_deref())?;
            let series = load_series(&data)?;
            match (window, step) {
                (Some(window), Some(step)) => {
                    run_walk_forward_cmd(&series, &config, WalkForwardConfig { window, step })
                }
                _ => run_backtest_cmd(&series, &config, output_dir.as_deref(), json),
            }
        }
        Commands::Check { config, data } => run_check(&config, data.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<BacktestConfig> {
    let config = match path {
        Some(path) => BacktestConfig::load(path)?,
        None => BacktestConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn load_series(args: &DataArgs) -> Result<BarSeries> {
    match (&args.data, args.synthetic) {
        (Some(path), _) => {
            load_csv(path).with_context(|| format!("failed to load {}", path.display()))
        }
        (None, true) => {
            info!(bars = args.bars, seed = args.seed, "using synthetic bars");
            Ok(random_walk(&SyntheticConfig {
                bars: args.bars,
                seed: args.seed,
                ..SyntheticConfig::default()
            })?)
        }
        (None, false) => bail!("one of --data or --synthetic is required"),
    }
}

fn run_backtest_cmd(
    series: &BarSeries,
    config: &BacktestConfig,
    output_dir: Option<&Path>,
    json: bool,
) -> Result<()> {
    let result = run_from_config(series, config)?;

    if json {
        println!("{}", export_json(&result)?);
    } else {
        print_summary(&result);
    }

    if let Some(dir) = output_dir {
        let paths = save_artifacts(&result, dir)?;
        if !json {
            println!("Artifacts saved to: {}", paths.dir.display());
        }
    }
    Ok(())
}

fn run_walk_forward_cmd(
    series: &BarSeries,
    config: &BacktestConfig,
    layout: WalkForwardConfig,
) -> Result<()> {
    let windows = walk_forward(series, config, &layout)?;
    println!(
        "{:>4}  {:<25}  {:>7}  {:>10}  {:>8}  {:>8}",
        "#", "start", "trades", "return %", "sharpe", "max dd %"
    );
    for w in &windows {
        println!(
            "{:>4}  {:<25}  {:>7}  {:>10.2}  {:>8.3}  {:>8.2}",
            w.window_index,
            w.start_time.to_rfc3339(),
            w.result.num_trades,
            w.result.profit_loss_pct,
            w.result.metrics.sharpe_ratio,
            w.result.metrics.max_drawdown_pct,
        );
    }
    Ok(())
}

fn run_check(config_path: &Path, data: Option<&Path>) -> Result<()> {
    let config = load_config(Some(config_path))?;
    println!("Config OK:      {}", config_path.display());
    println!("Run ID:         {}", config.run_id());
    println!("Source:         {:?}", config.effective_source());
    for rule in &config.rules {
        println!("  {rule}");
    }

    if let Some(path) = data {
        let series = load_csv(path)?;
        config.run.validate_for(&series)?;
        config.build_source()?.prepare(&series)?;
        println!("Data OK:        {} ({} bars)", path.display(), series.len());
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Source:         {}", result.source);
    if let Some(run_id) = &result.run_id {
        println!("Run ID:         {}", &run_id[..run_id.len().min(16)]);
    }
    println!(
        "Bars:           {} of {}",
        result.bars_processed, result.bars_total
    );
    println!(
        "Signals:        {} buy / {} sell / {} hold",
        result.signal_stats.buy_signals,
        result.signal_stats.sell_signals,
        result.signal_stats.hold_signals
    );
    println!("Trades:         {}", result.num_trades);
    println!("Exposure:       {:.1}%", result.exposure * 100.0);
    println!();
    println!("--- Performance ---");
    println!("Initial:        {:.2}", result.initial_balance);
    println!("Final:          {:.2}", result.final_balance);
    println!(
        "Profit/Loss:    {:.2} ({:.2}%)",
        result.profit_loss, result.profit_loss_pct
    );
    println!("Ann. Return:    {:.2}%", m.annualized_return * 100.0);
    println!("Volatility:     {:.2}%", m.annualized_volatility * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe_ratio);
    println!("Sortino:        {:.3}", m.sortino_ratio);
    println!("Calmar:         {:.3}", m.calmar_ratio);
    println!(
        "Max Drawdown:   {:.2} ({:.2}%)",
        m.max_drawdown, m.max_drawdown_pct
    );
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Avg Trade:      {:.2}", m.avg_trade_pnl);
    println!("Largest Win:    {:.2}", m.largest_win);
    println!("Largest Loss:   {:.2}", m.largest_loss);
    println!("Max Consec Win: {}", m.max_consecutive_wins);
    println!("Max Consec Loss:{}", m.max_consecutive_losses);
    println!(
        "Costs:          {:.2} commission, {:.2} slippage",
        m.total_commission, m.total_slippage
    );
    if result.rejected_entries > 0 {
        println!();
        println!(
            "WARNING: {} entries rejected for insufficient cash",
            result.rejected_entries
        );
    }
    if !result.completed {
        println!("WARNING: run did not complete");
    }
}
