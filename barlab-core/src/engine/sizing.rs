//! Position sizing policies
//!
//! Two modes:
//! 1. **Fixed fraction**: commit a fraction of available cash per entry
//! 2. **Fixed units**: always trade N units

use super::cost_model::CostModel;
use serde::{Deserialize, Serialize};

/// How many units an entry fill trades.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SizingPolicy {
    /// Spend `fraction` of available cash, costs included.
    FixedFraction { fraction: f64 },
    /// Trade a fixed number of units.
    FixedUnits { units: f64 },
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self::FixedFraction { fraction: 1.0 }
    }
}

impl SizingPolicy {
    pub fn fixed_fraction(fraction: f64) -> Self {
        Self::FixedFraction { fraction }
    }

    pub fn fixed_units(units: f64) -> Self {
        Self::FixedUnits { units }
    }

    /// Units to trade at quoted `price` given `available` cash.
    ///
    /// Fixed fraction solves `size * price * (1 + slip) * (1 + comm) == available * fraction`,
    /// so the entry never debits more than the committed cash.
    /// Returns 0 when nothing can be bought.
    pub fn size(&self, available: f64, price: f64, cost: &CostModel) -> f64 {
        if price <= 0.0 {
            return 0.0;
        }
        match *self {
            Self::FixedFraction { fraction } => {
                if available <= 0.0 {
                    return 0.0;
                }
                available * fraction / cost.all_in_unit_cost(price)
            }
            Self::FixedUnits { units } => units,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FixedFraction { .. } => "fixed_fraction",
            Self::FixedUnits { .. } => "fixed_units",
        }
    }
}
