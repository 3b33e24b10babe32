//! Backtest runner — wires together series, signal source, engine and metrics.
//!
//! Entry points:
//! - `run_backtest()`: explicit source, run config and metrics config.
//! - `run_backtest_with_cancel()`: same, honouring a cancel token.
//! - `run_from_config()`: builds the source and metrics inputs from a
//!   [`BacktestConfig`] and tags the result with its RunId. Used by the CLI
//!   and by sweeps.

use barlab_core::domain::{BarSeries, EquityPoint, SignalStats, Trade};
use barlab_core::engine::{
    replay_with_cancel, CancelToken, EndOfSeriesPolicy, ReplayOutput, RunConfig,
};
use barlab_core::strategy::SignalSource;
use barlab_core::BacktestError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::data_loader::LoadError;
use crate::export::ExportError;
use crate::metrics::{ComputationError, MetricsConfig, MetricsResult};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Backtest(#[from] BacktestError),
    #[error("metrics error: {0}")]
    Computation(#[from] ComputationError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Load(#[from] LoadError),
    #[error("export error: {0}")]
    Export(#[from] ExportError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: Option<RunId>,
    /// Name of the signal source that drove the run.
    pub source: String,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub profit_loss: f64,
    pub profit_loss_pct: f64,
    pub num_trades: usize,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: MetricsResult,
    pub signal_stats: SignalStats,
    /// Fraction of processed bars with an open position.
    pub exposure: f64,
    pub bars_total: usize,
    pub bars_processed: usize,
    pub rejected_entries: usize,
    pub ignored_signals: usize,
    pub end_of_series: EndOfSeriesPolicy,
    /// The full run configuration, echoed.
    pub config: RunConfig,
    /// False when the run was cancelled before the last bar.
    pub completed: bool,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    /// Assemble the result record from a replay and its metrics.
    pub fn from_replay(out: ReplayOutput, metrics: MetricsResult) -> Self {
        let initial_balance = out.config.initial_balance;
        let final_balance = out.final_balance();
        let profit_loss = final_balance - initial_balance;
        Self {
            schema_version: SCHEMA_VERSION,
            run_id: None,
            exposure: out.exposure(),
            source: out.source,
            initial_balance,
            final_balance,
            profit_loss,
            profit_loss_pct: profit_loss / initial_balance * 100.0,
            num_trades: out.trades.len(),
            trades: out.trades,
            equity_curve: out.equity_curve,
            metrics,
            signal_stats: out.signal_stats,
            bars_total: out.bars_total,
            bars_processed: out.bars_processed,
            rejected_entries: out.rejected_entries,
            ignored_signals: out.ignored_signals,
            end_of_series: out.config.end_of_series,
            config: out.config,
            completed: out.completed,
        }
    }
}

/// Replay `series` through `source` and compute metrics.
///
/// The metrics' initial balance is taken from `run`.
pub fn run_backtest(
    series: &BarSeries,
    source: &mut dyn SignalSource,
    run: &RunConfig,
    metrics: &MetricsConfig,
) -> Result<BacktestResult, RunError> {
    run_backtest_with_cancel(series, source, run, metrics, &CancelToken::new())
}

/// [`run_backtest`] with cooperative cancellation.
///
/// A cancelled run still returns a result, computed from the bars processed
/// so far and flagged `completed == false`.
pub fn run_backtest_with_cancel(
    series: &BarSeries,
    source: &mut dyn SignalSource,
    run: &RunConfig,
    metrics: &MetricsConfig,
    cancel: &CancelToken,
) -> Result<BacktestResult, RunError> {
    let metrics_config = MetricsConfig {
        initial_balance: run.initial_balance,
        ..*metrics
    };
    metrics_config.validate()?;

    let out = replay_with_cancel(series, source, run, cancel)?;
    let computed = MetricsResult::compute(&out.equity_curve, &out.trades, &metrics_config)?;
    let result = BacktestResult::from_replay(out, computed);

    info!(
        source = %result.source,
        trades = result.num_trades,
        final_balance = result.final_balance,
        sharpe = result.metrics.sharpe_ratio,
        max_dd_pct = result.metrics.max_drawdown_pct,
        completed = result.completed,
        "backtest finished"
    );
    Ok(result)
}

/// Run a backtest described entirely by `config`.
pub fn run_from_config(
    series: &BarSeries,
    config: &BacktestConfig,
) -> Result<BacktestResult, RunError> {
    run_from_config_with_cancel(series, config, &CancelToken::new())
}

pub fn run_from_config_with_cancel(
    series: &BarSeries,
    config: &BacktestConfig,
    cancel: &CancelToken,
) -> Result<BacktestResult, RunError> {
    let mut source = config.build_source()?;
    let metrics = config.metrics_config()?;
    let mut result =
        run_backtest_with_cancel(series, source.as_mut(), &config.run, &metrics, cancel)?;
    result.run_id = Some(config.run_id());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use barlab_core::domain::{Bar, Signal};
    use barlab_core::engine::SizingPolicy;
    use barlab_core::strategy::PrecomputedSignals;
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: &[f64], signals: &[Signal]) -> BarSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(start + Duration::days(i as i64), c, c, c, c, 1.0))
            .collect();
        BarSeries::new(bars)
            .unwrap()
            .with_signals(signals.to_vec())
            .unwrap()
    }

    fn one_unit() -> RunConfig {
        RunConfig {
            commission_rate: 0.001,
            slippage_rate: 0.0,
            sizing: SizingPolicy::fixed_units(1.0),
            ..RunConfig::new(10_000.0)
        }
    }

    #[test]
    fn single_bar_no_signal() {
        let s = series(&[100.0], &[Signal::Hold]);
        let r = run_backtest(
            &s,
            &mut PrecomputedSignals,
            &RunConfig::default(),
            &MetricsConfig::default(),
        )
        .unwrap();
        assert_eq!(r.num_trades, 0);
        assert_eq!(r.final_balance, r.initial_balance);
        assert_eq!(r.profit_loss, 0.0);
        assert_eq!(r.metrics.sharpe_ratio, 0.0);
        assert!(r.completed);
    }

    #[test]
    fn round_trip_result_fields() {
        let s = series(&[100.0, 110.0], &[Signal::Buy, Signal::Sell]);
        let r = run_backtest(&s, &mut PrecomputedSignals, &one_unit(), &MetricsConfig::default())
            .unwrap();
        assert_eq!(r.num_trades, 1);
        assert!((r.profit_loss - 9.79).abs() < 1e-9);
        assert!((r.profit_loss_pct - 0.0979).abs() < 1e-9);
        assert_eq!(r.final_balance, r.equity_curve.last().unwrap().equity);
        assert_eq!(r.metrics.win_rate, 1.0);
        assert_eq!(r.metrics.num_trades, 1);
        assert_eq!(r.end_of_series, EndOfSeriesPolicy::MarkToMarket);
        assert_eq!(r.signal_stats.buy_signals, 1);
    }

    #[test]
    fn metrics_use_run_initial_balance() {
        let s = series(&[100.0, 110.0], &[Signal::Buy, Signal::Sell]);
        let metrics = MetricsConfig::new(1.0, 252.0);
        let r = run_backtest(&s, &mut PrecomputedSignals, &one_unit(), &metrics).unwrap();
        assert!((r.metrics.total_return - 9.79).abs() < 1e-9);
    }

    #[test]
    fn bad_annualization_fails_before_replay() {
        let s = series(&[100.0], &[Signal::Hold]);
        let err = run_backtest(
            &s,
            &mut PrecomputedSignals,
            &RunConfig::default(),
            &MetricsConfig::new(10_000.0, 0.0),
        )
        .unwrap_err();
        assert!(matches!(err, RunError::Computation(_)));
    }

    #[test]
    fn cancelled_run_is_flagged() {
        let s = series(&[100.0, 101.0, 102.0], &[Signal::Buy, Signal::Hold, Signal::Hold]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let r = run_backtest_with_cancel(
            &s,
            &mut PrecomputedSignals,
            &RunConfig::default(),
            &MetricsConfig::default(),
            &cancel,
        )
        .unwrap();
        assert!(!r.completed);
        assert_eq!(r.bars_processed, 0);
        assert_eq!(r.final_balance, r.initial_balance);
    }

    #[test]
    fn run_from_config_tags_run_id() {
        let s = series(&[100.0, 110.0], &[Signal::Buy, Signal::Sell]);
        let config = BacktestConfig::default();
        let r = run_from_config(&s, &config).unwrap();
        assert_eq!(r.run_id, Some(config.run_id()));
        assert_eq!(r.source, "precomputed");
    }
}
