//! Signal — the per-bar decision handed from a signal source to the simulator.

use serde::{Deserialize, Serialize};

/// Per-bar trading decision.
///
/// Signals are relative to the current position, not absolute targets: the
/// execution simulator's transition table decides what a `Buy` means when
/// flat (open long), when long (pyramid or ignore) and when short (cover).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl Signal {
    /// Decode the conventional signal column encoding: 1 = buy, -1 = sell, 0 = hold.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Buy),
            -1 => Some(Self::Sell),
            0 => Some(Self::Hold),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
            Self::Hold => 0,
        }
    }

    pub fn is_hold(self) -> bool {
        self == Self::Hold
    }
}

/// Counts of emitted signals over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalStats {
    pub total_periods: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub hold_signals: usize,
}

impl SignalStats {
    pub fn record(&mut self, signal: Signal) {
        self.total_periods += 1;
        match signal {
            Signal::Buy => self.buy_signals += 1,
            Signal::Sell => self.sell_signals += 1,
            Signal::Hold => self.hold_signals += 1,
        }
    }

    /// Fraction of periods with a non-hold signal.
    pub fn signal_rate(&self) -> f64 {
        if self.total_periods == 0 {
            return 0.0;
        }
        (self.buy_signals + self.sell_signals) as f64 / self.total_periods as f64
    }
}
