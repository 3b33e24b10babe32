//! Run configuration: fixed before the loop starts, immutable during it.

use super::cost_model::CostModel;
use super::sizing::SizingPolicy;
use crate::domain::BarSeries;
use crate::strategy::ConflictPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What happens to a position still open after the last bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfSeriesPolicy {
    /// Leave it open; final equity includes unrealized P&L.
    #[default]
    MarkToMarket,
    /// Close it at the last close through the normal exit path.
    ForceClose,
}

/// Invalid run parameters. Raised before any bar is processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("initial_balance must be positive and finite, got {0}")]
    InitialBalance(f64),

    #[error("{name} must be a finite fraction in [0, 1), got {value}")]
    Rate { name: &'static str, value: f64 },

    #[error("sizing fraction must be in (0, 1], got {0}")]
    Fraction(f64),

    #[error("sizing units must be positive and finite, got {0}")]
    Units(f64),

    #[error(
        "fixed sizing of {units} units needs {required:.2} at the highest close {price} \
         but initial_balance is {available:.2}"
    )]
    Overdraw {
        units: f64,
        price: f64,
        required: f64,
        available: f64,
    },

    #[error("rule '{rule}' is invalid: {reason}")]
    InvalidRule { rule: String, reason: String },
}

/// Parameters of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub initial_balance: f64,
    pub commission_rate: f64,
    pub slippage_rate: f64,
    pub sizing: SizingPolicy,
    pub allow_short: bool,
    /// Let repeated same-direction signals add to an open position.
    pub pyramiding: bool,
    pub end_of_series: EndOfSeriesPolicy,
    /// Tie-break for strategies that answer both buy and sell on one bar.
    pub conflict: ConflictPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            commission_rate: 0.001,
            slippage_rate: 0.0005,
            sizing: SizingPolicy::default(),
            allow_short: false,
            pyramiding: false,
            end_of_series: EndOfSeriesPolicy::default(),
            conflict: ConflictPolicy::default(),
        }
    }
}

impl RunConfig {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            ..Self::default()
        }
    }

    pub fn frictionless(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            commission_rate: 0.0,
            slippage_rate: 0.0,
            ..Self::default()
        }
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel::new(self.commission_rate, self.slippage_rate)
    }

    /// Check parameters that do not depend on the data.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_balance.is_finite() && self.initial_balance > 0.0) {
            return Err(ConfigError::InitialBalance(self.initial_balance));
        }
        check_rate("commission_rate", self.commission_rate)?;
        check_rate("slippage_rate", self.slippage_rate)?;
        match self.sizing {
            SizingPolicy::FixedFraction { fraction } => {
                if !(fraction > 0.0 && fraction <= 1.0) {
                    return Err(ConfigError::Fraction(fraction));
                }
            }
            SizingPolicy::FixedUnits { units } => {
                if !(units.is_finite() && units > 0.0) {
                    return Err(ConfigError::Units(units));
                }
            }
        }
        Ok(())
    }

    /// [`validate`](Self::validate), then check that sizing cannot overdraw
    /// the initial balance anywhere in `series`.
    ///
    /// Fixed-unit sizing is checked against the highest close, so an entry
    /// that would exceed the opening balance is caught here rather than
    /// mid-run.
    pub fn validate_for(&self, series: &BarSeries) -> Result<(), ConfigError> {
        self.validate()?;
        if let SizingPolicy::FixedUnits { units } = self.sizing {
            let price = series.max_close();
            let required = units * self.cost_model().all_in_unit_cost(price);
            if required > self.initial_balance {
                return Err(ConfigError::Overdraw {
                    units,
                    price,
                    required,
                    available: self.initial_balance,
                });
            }
        }
        Ok(())
    }
}

fn check_rate(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value.is_finite() && (0.0..1.0).contains(&value)) {
        return Err(ConfigError::Rate { name, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: &[f64]) -> BarSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(start + Duration::days(i as i64), c, c, c, c, 1.0))
            .collect();
        BarSeries::new(bars).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let config = RunConfig::default();
        assert_eq!(config.initial_balance, 10_000.0);
        assert_eq!(config.commission_rate, 0.001);
        assert_eq!(config.slippage_rate, 0.0005);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_non_positive_balance() {
        assert_eq!(
            RunConfig::new(0.0).validate(),
            Err(ConfigError::InitialBalance(0.0))
        );
        assert!(RunConfig::new(f64::NAN).validate().is_err());
    }

    #[test]
    fn rejects_negative_rates() {
        let config = RunConfig {
            commission_rate: -0.001,
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Rate {
                name: "commission_rate",
                ..
            })
        ));
    }

    #[test]
    fn rejects_fraction_out_of_range() {
        for fraction in [0.0, 1.5, -0.2] {
            let config = RunConfig {
                sizing: SizingPolicy::fixed_fraction(fraction),
                ..RunConfig::default()
            };
            assert_eq!(config.validate(), Err(ConfigError::Fraction(fraction)));
        }
    }

    #[test]
    fn fixed_units_that_overdraw_fail_before_the_loop() {
        let config = RunConfig {
            initial_balance: 1_000.0,
            sizing: SizingPolicy::fixed_units(10.0),
            ..RunConfig::frictionless(1_000.0)
        };
        // 10 units at 99 fits; at the 120 peak it does not.
        config.validate_for(&series(&[99.0])).unwrap();
        assert!(matches!(
            config.validate_for(&series(&[90.0, 120.0, 95.0])),
            Err(ConfigError::Overdraw { price, .. }) if price == 120.0
        ));
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let config: RunConfig = serde_json::from_str(
            r#"{"initial_balance": 5000, "allow_short": true,
                "sizing": {"mode": "fixed_units", "units": 2},
                "end_of_series": "force_close", "conflict": "prefer_buy"}"#,
        )
        .unwrap();
        assert_eq!(config.initial_balance, 5000.0);
        assert!(config.allow_short);
        assert_eq!(config.sizing, SizingPolicy::fixed_units(2.0));
        assert_eq!(config.end_of_series, EndOfSeriesPolicy::ForceClose);
        assert_eq!(config.conflict, ConflictPolicy::PreferBuy);
        assert_eq!(config.commission_rate, 0.001);
    }
}
