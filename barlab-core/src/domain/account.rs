//! Account — the single cash balance and (at most one) open position of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

/// An open position.
///
/// `entry_price` is the size-weighted average quoted price of all entry fills.
/// `entry_cash_flow` is the absolute cash moved on entry: the total debited
/// (long) or credited (short), costs included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    pub size: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_bar: usize,
    pub entry_cash_flow: f64,
    pub entry_commission: f64,
    pub entry_slippage: f64,
}

impl Position {
    pub fn is_short(&self) -> bool {
        self.side == PositionSide::Short
    }

    /// Signed mark-to-market value: positive for longs, a liability for shorts.
    pub fn market_value(&self, mark: f64) -> f64 {
        self.side.sign() * self.size * mark
    }

    /// Unrealized P&L at `mark` relative to the quoted entry price (costs excluded).
    pub fn unrealized_pnl(&self, mark: f64) -> f64 {
        self.side.sign() * self.size * (mark - self.entry_price)
    }
}

/// Cash plus the open position, if any.
///
/// The accounting identity `equity == cash + position market value` holds at
/// every bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub cash: f64,
    pub position: Option<Position>,
}

impl Account {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            cash: initial_balance,
            position: None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Zero when flat.
    pub fn position_size(&self) -> f64 {
        self.position.as_ref().map_or(0.0, |p| p.size)
    }

    pub fn position_side(&self) -> Option<PositionSide> {
        self.position.as_ref().map(|p| p.side)
    }

    pub fn position_entry_price(&self) -> Option<f64> {
        self.position.as_ref().map(|p| p.entry_price)
    }

    /// Total equity at `mark`.
    pub fn equity(&self, mark: f64) -> f64 {
        let position_value = self.position.as_ref().map_or(0.0, |p| p.market_value(mark));
        self.cash + position_value
    }
}
