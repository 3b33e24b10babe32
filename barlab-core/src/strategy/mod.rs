//! Signal sources — anything that turns a bar row into a [`Signal`].
//!
//! Three interchangeable sources feed the replay loop:
//! - [`RuleEngine`](crate::rules::RuleEngine): declarative first-match rules
//! - [`PrecomputedSignals`]: a signal column already attached to the series
//! - [`StrategySignals`]: any [`Strategy`] exposing `should_buy`/`should_sell`
//!
//! The replay loop only sees the [`SignalSource`] trait and cannot tell which
//! path produced a signal.

pub mod feature_cross;
pub mod sma_cross;

pub use feature_cross::FeatureCross;
pub use sma_cross::SmaCross;

use crate::domain::{BarRow, BarSeries, Field, Signal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while producing signals.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("'{source_name}' references missing column '{column}' (bar {index})")]
    MissingColumn {
        source_name: String,
        column: String,
        index: usize,
    },

    #[error("rule '{rule}' is invalid: {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("series has no precomputed signal column")]
    MissingSignalColumn,

    #[error("strategy '{name}' failed at bar {index}: {message}")]
    Strategy {
        name: String,
        index: usize,
        message: String,
    },
}

/// Per-bar signal producer driven by the replay loop.
///
/// `signal` is called exactly once per bar, in order, so implementations may
/// keep state between calls.
pub trait SignalSource {
    /// Name for logs and run output.
    fn name(&self) -> &str;

    /// Check the source against the series before the first bar is replayed.
    fn prepare(&mut self, _series: &BarSeries) -> Result<(), SignalError> {
        Ok(())
    }

    /// Decide the signal for `row`.
    fn signal(&mut self, row: &BarRow<'_>) -> Result<Signal, SignalError>;
}

/// Strategy contract: two predicates over the current row.
///
/// Strategies see the row (and through it, prior bars) but never the account.
pub trait Strategy {
    fn name(&self) -> &str;

    fn should_buy(&mut self, row: &BarRow<'_>) -> Result<bool, SignalError>;

    fn should_sell(&mut self, row: &BarRow<'_>) -> Result<bool, SignalError>;

    /// Columns this strategy reads, checked before the loop starts.
    fn required_fields(&self) -> Vec<Field> {
        Vec::new()
    }
}

/// Resolution when a strategy answers true to both `should_buy` and `should_sell`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// The exit/sell side wins.
    #[default]
    PreferSell,
    PreferBuy,
    /// Conflicting answers cancel out.
    Hold,
}

impl ConflictPolicy {
    pub fn resolve(self, buy: bool, sell: bool) -> Signal {
        match (buy, sell) {
            (true, false) => Signal::Buy,
            (false, true) => Signal::Sell,
            (false, false) => Signal::Hold,
            (true, true) => match self {
                Self::PreferSell => Signal::Sell,
                Self::PreferBuy => Signal::Buy,
                Self::Hold => Signal::Hold,
            },
        }
    }
}

/// Adapts a [`Strategy`] into a [`SignalSource`].
#[derive(Debug, Clone)]
pub struct StrategySignals<S> {
    strategy: S,
    conflict: ConflictPolicy,
}

impl<S: Strategy> StrategySignals<S> {
    pub fn new(strategy: S, conflict: ConflictPolicy) -> Self {
        Self { strategy, conflict }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }
}

impl<S: Strategy> SignalSource for StrategySignals<S> {
    fn name(&self) -> &str {
        self.strategy.name()
    }

    fn prepare(&mut self, series: &BarSeries) -> Result<(), SignalError> {
        for field in self.strategy.required_fields() {
            if !series.has_field(&field) {
                return Err(SignalError::MissingColumn {
                    source_name: self.strategy.name().to_string(),
                    column: field.to_string(),
                    index: 0,
                });
            }
        }
        Ok(())
    }

    fn signal(&mut self, row: &BarRow<'_>) -> Result<Signal, SignalError> {
        let buy = self.strategy.should_buy(row)?;
        let sell = self.strategy.should_sell(row)?;
        Ok(self.conflict.resolve(buy, sell))
    }
}

/// Reads the signal column already attached to the series.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecomputedSignals;

impl SignalSource for PrecomputedSignals {
    fn name(&self) -> &str {
        "precomputed"
    }

    fn prepare(&mut self, series: &BarSeries) -> Result<(), SignalError> {
        if series.signals().is_none() {
            return Err(SignalError::MissingSignalColumn);
        }
        Ok(())
    }

    fn signal(&mut self, row: &BarRow<'_>) -> Result<Signal, SignalError> {
        row.signal().ok_or(SignalError::MissingSignalColumn)
    }
}

/// Read `field` from `row`, failing with a missing-column error naming `source_name`.
pub fn require(row: &BarRow<'_>, field: &Field, source_name: &str) -> Result<f64, SignalError> {
    row.value(field).ok_or_else(|| SignalError::MissingColumn {
        source_name: source_name.to_string(),
        column: field.to_string(),
        index: row.index(),
    })
}
