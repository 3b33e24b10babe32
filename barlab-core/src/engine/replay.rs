//! Bar-by-bar replay loop — the heart of the backtesting engine.
//!
//! Per bar, strictly in order:
//! 1. Ask the signal source for this row's signal
//! 2. Run it through the simulator (transition table, fills, ledger)
//! 3. On the last bar, apply the end-of-series policy
//! 4. Record exactly one equity point at the close
//!
//! Bar `i + 1` is never looked at before bar `i` is fully committed.

use super::config::{EndOfSeriesPolicy, RunConfig};
use super::simulator::ExecutionSimulator;
use crate::domain::{Account, BarSeries, EquityPoint, SignalStats, Trade};
use crate::error::BacktestError;
use crate::strategy::SignalSource;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info_span;

/// Cooperative cancellation flag shared between a run and its controller.
///
/// Cancelling stops the loop before the next bar; everything committed so far
/// is returned as a partial result.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Raw output of one replay: ledger, equity curve and run diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutput {
    pub config: RunConfig,
    pub source: String,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub final_account: Account,
    pub signal_stats: SignalStats,
    pub bars_total: usize,
    pub bars_processed: usize,
    pub bars_in_position: usize,
    pub rejected_entries: usize,
    pub ignored_signals: usize,
    /// False when the run was cancelled before the last bar.
    pub completed: bool,
}

impl ReplayOutput {
    /// Equity at the last processed bar; the initial balance if none was processed.
    pub fn final_balance(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.config.initial_balance, |p| p.equity)
    }

    /// Fraction of processed bars that closed with an open position.
    pub fn exposure(&self) -> f64 {
        if self.bars_processed == 0 {
            return 0.0;
        }
        self.bars_in_position as f64 / self.bars_processed as f64
    }
}

/// Replay `series` through `source` under `config`.
pub fn replay(
    series: &BarSeries,
    source: &mut dyn SignalSource,
    config: &RunConfig,
) -> Result<ReplayOutput, BacktestError> {
    replay_with_cancel(series, source, config, &CancelToken::new())
}

/// [`replay`], checking `cancel` before every bar.
pub fn replay_with_cancel(
    series: &BarSeries,
    source: &mut dyn SignalSource,
    config: &RunConfig,
    cancel: &CancelToken,
) -> Result<ReplayOutput, BacktestError> {
    let _span = info_span!(
        "replay",
        source = source.name(),
        bars = series.len(),
        sizing = config.sizing.name(),
        allow_short = config.allow_short,
    )
    .entered();

    config.validate_for(series)?;
    source.prepare(series)?;

    let mut sim = ExecutionSimulator::new(config.clone())?.with_capacity(series.len());
    let mut stats = SignalStats::default();
    let last = series.len() - 1;
    let mut processed = 0;

    for (index, bar) in series.bars().iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::warn!(bar = index, total = series.len(), "replay cancelled");
            break;
        }

        let signal = source.signal(&series.row(index))?;
        stats.record(signal);
        sim.apply_signal(index, bar, signal);

        if index == last && config.end_of_series == EndOfSeriesPolicy::ForceClose {
            sim.close_end_of_series(index, bar);
        }
        sim.mark_to_market(bar);
        processed += 1;
    }

    let out = sim.finish();
    let output = ReplayOutput {
        config: config.clone(),
        source: source.name().to_string(),
        trades: out.trades,
        equity_curve: out.equity_curve,
        final_account: out.account,
        signal_stats: stats,
        bars_total: series.len(),
        bars_processed: processed,
        bars_in_position: out.bars_in_position,
        rejected_entries: out.rejected_entries,
        ignored_signals: out.ignored_signals,
        completed: processed == series.len(),
    };

    tracing::info!(
        trades = output.trades.len(),
        final_balance = output.final_balance(),
        rejected = output.rejected_entries,
        completed = output.completed,
        "replay finished"
    );
    Ok(output)
}
