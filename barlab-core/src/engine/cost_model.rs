//! Cost model — slippage and commission calculation.
//!
//! Slippage is directional: buyers pay more (higher price), sellers receive less (lower price).
//! Commission is a rate on the executed (slipped) notional, charged on every fill.

use crate::domain::PositionSide;

/// Which way a fill moves units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillSide {
    Buy,
    Sell,
}

impl FillSide {
    /// The fill that opens (or adds to) a position on `side`.
    pub fn opening(side: PositionSide) -> Self {
        match side {
            PositionSide::Long => Self::Buy,
            PositionSide::Short => Self::Sell,
        }
    }

    /// The fill that closes a position on `side`.
    pub fn closing(side: PositionSide) -> Self {
        match side {
            PositionSide::Long => Self::Sell,
            PositionSide::Short => Self::Buy,
        }
    }
}

/// One simulated execution with its costs.
///
/// `cash_flow` is always non-negative: the amount debited for buys
/// (`notional + commission`) or credited for sells (`notional - commission`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub side: FillSide,
    pub quoted_price: f64,
    pub executed_price: f64,
    pub size: f64,
    pub commission: f64,
    pub slippage: f64,
    pub cash_flow: f64,
}

impl Fill {
    /// Signed change to cash: negative for buys, positive for sells.
    pub fn cash_delta(&self) -> f64 {
        match self.side {
            FillSide::Buy => -self.cash_flow,
            FillSide::Sell => self.cash_flow,
        }
    }
}

/// Cost model for execution friction (slippage + commission).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    /// Commission as a fraction of executed notional.
    pub commission_rate: f64,
    /// Slippage as a fraction of the quoted price, applied directionally.
    pub slippage_rate: f64,
}

impl CostModel {
    pub fn new(commission_rate: f64, slippage_rate: f64) -> Self {
        Self {
            commission_rate,
            slippage_rate,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Apply slippage to a quoted price.
    ///
    /// Returns `(slipped_price, slippage_amount)`.
    pub fn apply_slippage(&self, raw_price: f64, side: FillSide, quantity: f64) -> (f64, f64) {
        if self.slippage_rate == 0.0 {
            return (raw_price, 0.0);
        }
        match side {
            FillSide::Buy => {
                let slipped = raw_price * (1.0 + self.slippage_rate);
                (slipped, (slipped - raw_price) * quantity)
            }
            FillSide::Sell => {
                let slipped = raw_price * (1.0 - self.slippage_rate);
                (slipped, (raw_price - slipped) * quantity)
            }
        }
    }

    /// `commission = fill_price * quantity * commission_rate`
    pub fn compute_commission(&self, fill_price: f64, quantity: f64) -> f64 {
        fill_price * quantity * self.commission_rate
    }

    /// Simulate a fill of `size` units at quoted `price`.
    pub fn fill(&self, price: f64, size: f64, side: FillSide) -> Fill {
        let (executed_price, slippage) = self.apply_slippage(price, side, size);
        let notional = executed_price * size;
        let commission = self.compute_commission(executed_price, size);
        let cash_flow = match side {
            FillSide::Buy => notional + commission,
            FillSide::Sell => notional - commission,
        };
        Fill {
            side,
            quoted_price: price,
            executed_price,
            size,
            commission,
            slippage,
            cash_flow,
        }
    }

    /// Entry fill for a position on `side`.
    pub fn open(&self, price: f64, size: f64, side: PositionSide) -> Fill {
        self.fill(price, size, FillSide::opening(side))
    }

    /// Exit fill for a position on `side`.
    pub fn close(&self, price: f64, size: f64, side: PositionSide) -> Fill {
        self.fill(price, size, FillSide::closing(side))
    }

    /// Worst-case cash needed per unit bought at `price`, costs included.
    pub fn all_in_unit_cost(&self, price: f64) -> f64 {
        price * (1.0 + self.slippage_rate) * (1.0 + self.commission_rate)
    }
}
