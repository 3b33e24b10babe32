//! Trade ledger — append-only record of closed trades.

use crate::domain::Trade;

/// Closed trades in the order they closed.
///
/// Only the simulator appends; everything else reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeLedger {
    trades: Vec<Trade>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn last(&self) -> Option<&Trade> {
        self.trades.last()
    }

    /// Sum of net P&L over all closed trades.
    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.net_pnl).sum()
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }
}
