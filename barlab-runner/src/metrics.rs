//! Performance metrics — pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity values and/or trade list in, scalar
//! out. Nothing here touches the simulator, so metrics can be recomputed from
//! a recorded equity curve and ledger at any time with identical results.
//!
//! Degenerate inputs (constant equity, no trades, no losers) resolve to
//! documented sentinels. Only a genuinely undefined computation, such as
//! annualizing with a non-positive factor, is an error.

use barlab_core::domain::{equity_values, EquityPoint, Trade};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard deviations below this are treated as zero.
const STD_EPSILON: f64 = 1e-15;

/// Metric that cannot be computed from its inputs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputationError {
    #[error("annualization factor must be positive and finite, got {0}")]
    AnnualizationFactor(f64),

    #[error("initial balance must be positive and finite, got {0}")]
    InitialBalance(f64),

    #[error("risk-free rate must be finite, got {0}")]
    RiskFreeRate(f64),
}

/// Inputs the metrics need besides the run output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub initial_balance: f64,
    /// Bars per year for the series' interval (252 for daily equities).
    pub annualization_factor: f64,
    /// Annual risk-free rate as a fraction.
    pub risk_free_rate: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            annualization_factor: 252.0,
            risk_free_rate: 0.0,
        }
    }
}

impl MetricsConfig {
    pub fn new(initial_balance: f64, annualization_factor: f64) -> Self {
        Self {
            initial_balance,
            annualization_factor,
            risk_free_rate: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ComputationError> {
        let af = self.annualization_factor;
        if !(af.is_finite() && af > 0.0) {
            return Err(ComputationError::AnnualizationFactor(af));
        }
        let ib = self.initial_balance;
        if !(ib.is_finite() && ib > 0.0) {
            return Err(ComputationError::InitialBalance(ib));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(ComputationError::RiskFreeRate(self.risk_free_rate));
        }
        Ok(())
    }
}

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    // ── Returns ──
    pub total_return: f64,
    pub total_return_pct: f64,
    pub annualized_return: f64,

    // ── Risk ──
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    /// Sample standard deviation of period returns.
    pub volatility: f64,
    pub annualized_volatility: f64,
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,

    // ── Trades ──
    pub num_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_trade_pnl: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_bars_held: f64,

    // ── Costs ──
    pub total_commission: f64,
    pub total_slippage: f64,
}

impl MetricsResult {
    /// Compute all metrics from a recorded equity curve and trade ledger.
    pub fn compute(
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        config: &MetricsConfig,
    ) -> Result<Self, ComputationError> {
        Self::compute_values(&equity_values(equity_curve), trades, config)
    }

    /// [`compute`](Self::compute) over bare equity values.
    pub fn compute_values(
        equity: &[f64],
        trades: &[Trade],
        config: &MetricsConfig,
    ) -> Result<Self, ComputationError> {
        config.validate()?;
        let af = config.annualization_factor;
        let rf = config.risk_free_rate;
        let initial = config.initial_balance;
        let final_equity = equity.last().copied().unwrap_or(initial);

        let returns = period_returns(equity);
        let (max_dd, max_dd_pct) = max_drawdown(equity);
        let total_return = final_equity - initial;
        let annualized = annualized_return(initial, final_equity, returns.len(), af);
        let volatility = std_dev(&returns);

        Ok(Self {
            total_return,
            total_return_pct: total_return / initial * 100.0,
            annualized_return: annualized,
            sharpe_ratio: sharpe_ratio(&returns, rf, af),
            sortino_ratio: sortino_ratio(&returns, rf, af),
            calmar_ratio: calmar_ratio(annualized, max_dd_pct / 100.0),
            volatility,
            annualized_volatility: volatility * af.sqrt(),
            max_drawdown: max_dd,
            max_drawdown_pct: max_dd_pct,
            num_trades: trades.len(),
            winning_trades: trades.iter().filter(|t| t.is_winner()).count(),
            losing_trades: trades.iter().filter(|t| t.is_loser()).count(),
            win_rate: win_rate(trades),
            avg_trade_pnl: mean_f64(&trades.iter().map(|t| t.net_pnl).collect::<Vec<_>>()),
            profit_factor: profit_factor(trades),
            avg_win: avg_of(trades, Trade::is_winner),
            avg_loss: avg_of(trades, Trade::is_loser),
            largest_win: largest_win(trades),
            largest_loss: largest_loss(trades),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            avg_bars_held: mean_f64(
                &trades.iter().map(|t| t.bars_held as f64).collect::<Vec<_>>(),
            ),
            total_commission: trades.iter().map(|t| t.commission_paid).sum(),
            total_slippage: trades.iter().map(|t| t.slippage_cost).sum(),
        })
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Simple returns between consecutive equity values.
///
/// Periods whose prior equity is zero or negative have no defined return and
/// are skipped.
pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Annualized Sharpe ratio.
///
/// Sharpe = mean(r - rf / af) / std(r) * sqrt(af), with sample std.
/// Returns 0.0 if the std is zero or there are fewer than 2 returns.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, annualization_factor: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < STD_EPSILON {
        return 0.0;
    }
    let period_rf = risk_free_rate / annualization_factor;
    let mean_excess = mean_f64(returns) - period_rf;
    mean_excess / std * annualization_factor.sqrt()
}

/// Annualized Sortino ratio: excess mean over the std of losing periods.
///
/// Returns 0.0 with fewer than 2 losing periods or zero downside deviation.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64, annualization_factor: f64) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    let downside_std = std_dev(&downside);
    if downside_std < STD_EPSILON {
        return 0.0;
    }
    let period_rf = risk_free_rate / annualization_factor;
    (mean_f64(returns) - period_rf) / downside_std * annualization_factor.sqrt()
}

/// Compound annual growth over `periods` returns at `af` periods per year.
///
/// Returns 0.0 without any periods; -1.0 when equity was wiped out. Growth too
/// large to represent saturates at `f64::MAX`.
pub fn annualized_return(initial: f64, final_equity: f64, periods: usize, af: f64) -> f64 {
    if periods == 0 || initial <= 0.0 {
        return 0.0;
    }
    if final_equity <= 0.0 {
        return -1.0;
    }
    let years = periods as f64 / af;
    saturate((final_equity / initial).powf(1.0 / years) - 1.0)
}

/// Calmar ratio: annualized return / max drawdown fraction.
///
/// Returns 0.0 when there was no drawdown; saturates at `±f64::MAX`.
pub fn calmar_ratio(annualized_return: f64, max_drawdown_fraction: f64) -> f64 {
    if max_drawdown_fraction <= 0.0 {
        return 0.0;
    }
    saturate(annualized_return / max_drawdown_fraction)
}

/// Clamp overflow to the largest finite value so results stay JSON-safe.
fn saturate(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-f64::MAX, f64::MAX)
    }
}

/// Maximum drawdown in currency and as a percentage.
///
/// The amount is the largest `peak - equity` seen; the percentage divides that
/// amount by the running peak at the same point. Returns (0, 0) for constant or
/// rising equity.
pub fn max_drawdown(equity: &[f64]) -> (f64, f64) {
    let Some(&first) = equity.first() else {
        return (0.0, 0.0);
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_dd_pct = 0.0_f64;

    for &eq in equity {
        if eq > peak {
            peak = eq;
        }
        let dd = peak - eq;
        if dd > max_dd {
            max_dd = dd;
            max_dd_pct = if peak > 0.0 { dd / peak * 100.0 } else { 0.0 };
        }
    }
    (max_dd, max_dd_pct)
}

/// Win rate: fraction of trades with positive net P&L. 0.0 without trades.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Profit factor: gross winning P&L / |gross losing P&L|.
///
/// With no losing trades this is the gross winning P&L itself (0.0 with no
/// trades at all) rather than infinity.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.is_winner())
        .map(|t| t.net_pnl)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.is_loser())
        .map(|t| t.net_pnl.abs())
        .sum();

    if gross_loss == 0.0 {
        return gross_profit;
    }
    gross_profit / gross_loss
}

pub fn largest_win(trades: &[Trade]) -> f64 {
    trades
        .iter()
        .map(|t| t.net_pnl)
        .fold(0.0_f64, f64::max)
}

/// Most negative trade P&L; 0.0 when no trade lost.
pub fn largest_loss(trades: &[Trade]) -> f64 {
    trades
        .iter()
        .map(|t| t.net_pnl)
        .fold(0.0_f64, f64::min)
}

/// Maximum run of consecutive winners (`winners == true`) or losers.
///
/// Break-even trades end both kinds of streak.
pub fn max_consecutive(trades: &[Trade], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;

    for trade in trades {
        let hit = if winners {
            trade.is_winner()
        } else {
            trade.is_loser()
        };
        if hit {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

// ─── Helpers ────────────────────────────────────────────────────────

fn avg_of(trades: &[Trade], pred: fn(&Trade) -> bool) -> f64 {
    let pnls: Vec<f64> = trades.iter().filter(|t| pred(t)).map(|t| t.net_pnl).collect();
    mean_f64(&pnls)
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1). 0.0 with fewer than 2 values.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
