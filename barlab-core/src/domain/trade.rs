//! Trade — a completed round trip, entry to exit.

use super::account::PositionSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// A sell (long) or buy (short) signal closed the position.
    Signal,
    /// Force-closed at the last bar's close by the end-of-series policy.
    EndOfSeries,
}

/// A closed round-trip trade. Immutable once appended to the ledger.
///
/// Prices are quoted (pre-slippage) closes; the cost of execution is carried
/// separately in `commission_paid` and `slippage_cost` so that
/// `net_pnl == gross_pnl - commission_paid - slippage_cost`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: PositionSide,

    // ── Entry ──
    pub entry_bar: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_bar: usize,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    // ── Size ──
    pub size: f64,

    // ── PnL ──
    pub gross_pnl: f64,
    pub commission_paid: f64,
    pub slippage_cost: f64,
    pub net_pnl: f64,

    // ── Duration ──
    pub bars_held: usize,
}

impl Trade {
    /// Net return on the trade as a fraction of entry notional.
    pub fn net_return(&self) -> f64 {
        let notional = self.entry_price * self.size;
        if notional == 0.0 {
            return 0.0;
        }
        self.net_pnl / notional
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.net_pnl < 0.0
    }
}
