//! Parallel independent runs: configuration sweeps and walk-forward windows.
//!
//! Each run owns its signal source, simulator and ledger, so runs share
//! nothing mutable and can go to the rayon pool as-is. Results come back in
//! input order regardless of scheduling.

use barlab_core::domain::BarSeries;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{BacktestConfig, ConfigError};
use crate::runner::{run_from_config, BacktestResult, RunError};

/// Run every config against the same series in parallel.
///
/// One failing config does not stop the others; each slot holds its own
/// outcome.
pub fn run_sweep(
    series: &BarSeries,
    configs: &[BacktestConfig],
) -> Vec<Result<BacktestResult, RunError>> {
    info!(runs = configs.len(), bars = series.len(), "sweep started");
    configs
        .par_iter()
        .map(|config| run_from_config(series, config))
        .collect()
}

/// Rolling window layout for [`walk_forward`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Bars per window.
    pub window: usize,
    /// Bars between consecutive window starts.
    pub step: usize,
}

impl WalkForwardConfig {
    /// Half-open `[start, end)` bar ranges of every full window.
    pub fn windows(&self, bars: usize) -> Result<Vec<(usize, usize)>, ConfigError> {
        if self.window == 0 || self.step == 0 || self.window > bars {
            return Err(ConfigError::Window {
                window: self.window,
                step: self.step,
                bars,
            });
        }
        Ok((0..=bars - self.window)
            .step_by(self.step)
            .map(|start| (start, start + self.window))
            .collect())
    }
}

/// Result of one walk-forward window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowResult {
    pub window_index: usize,
    /// First bar of the window in the full series (inclusive).
    pub start_bar: usize,
    /// End bar of the window in the full series (exclusive).
    pub end_bar: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub result: BacktestResult,
}

/// Run `config` independently over each rolling window of `series`.
///
/// Every window starts flat with the configured initial balance. The first
/// failing window aborts the whole walk.
pub fn walk_forward(
    series: &BarSeries,
    config: &BacktestConfig,
    layout: &WalkForwardConfig,
) -> Result<Vec<WindowResult>, RunError> {
    let windows = layout.windows(series.len())?;
    info!(
        windows = windows.len(),
        window = layout.window,
        step = layout.step,
        "walk-forward started"
    );

    windows
        .par_iter()
        .enumerate()
        .map(|(window_index, &(start, end))| -> Result<WindowResult, RunError> {
            let slice = series.window(start, end).ok_or(ConfigError::Window {
                window: layout.window,
                step: layout.step,
                bars: series.len(),
            })?;
            let result = run_from_config(&slice, config)?;
            Ok(WindowResult {
                window_index,
                start_bar: start,
                end_bar: end,
                start_time: slice.first().timestamp,
                end_time: slice.last().timestamp,
                result,
            })
        })
        .collect()
}
