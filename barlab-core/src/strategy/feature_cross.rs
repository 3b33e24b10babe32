//! Feature crossover strategy
//!
//! Reads two precomputed columns (typically `sma_{fast}` and `sma_{slow}`):
//! - Buy when the fast column crosses above the slow column
//! - Sell when the fast column crosses below the slow column

use super::{require, SignalError, Strategy};
use crate::domain::{BarRow, Field};

/// Crossover of two precomputed columns.
#[derive(Debug, Clone)]
pub struct FeatureCross {
    name: String,
    fast: Field,
    slow: Field,
}

impl FeatureCross {
    pub fn new(fast: impl Into<Field>, slow: impl Into<Field>) -> Self {
        let fast = fast.into();
        let slow = slow.into();
        Self {
            name: format!("cross({fast},{slow})"),
            fast,
            slow,
        }
    }

    /// Cross of `sma_{fast}` over `sma_{slow}`.
    pub fn sma(fast_period: usize, slow_period: usize) -> Self {
        Self::new(
            Field::Feature(format!("sma_{fast_period}")),
            Field::Feature(format!("sma_{slow_period}")),
        )
    }

    /// (fast - slow) now and one bar ago; `None` on the first bar.
    fn spreads(&self, row: &BarRow<'_>) -> Result<Option<(f64, f64)>, SignalError> {
        let fast_now = require(row, &self.fast, &self.name)?;
        let slow_now = require(row, &self.slow, &self.name)?;
        let Some(prev) = row.previous() else {
            return Ok(None);
        };
        let fast_prev = require(&prev, &self.fast, &self.name)?;
        let slow_prev = require(&prev, &self.slow, &self.name)?;
        Ok(Some((fast_now - slow_now, fast_prev - slow_prev)))
    }
}

impl Strategy for FeatureCross {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_buy(&mut self, row: &BarRow<'_>) -> Result<bool, SignalError> {
        Ok(matches!(self.spreads(row)?, Some((now, prev)) if prev <= 0.0 && now > 0.0))
    }

    fn should_sell(&mut self, row: &BarRow<'_>) -> Result<bool, SignalError> {
        Ok(matches!(self.spreads(row)?, Some((now, prev)) if prev >= 0.0 && now < 0.0))
    }

    fn required_fields(&self) -> Vec<Field> {
        vec![self.fast.clone(), self.slow.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, BarSeries};
    use chrono::{Duration, TimeZone, Utc};

    fn series(fast: Vec<f64>, slow: Vec<f64>) -> BarSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = (0..fast.len())
            .map(|i| Bar::new(start + Duration::days(i as i64), 100.0, 101.0, 99.0, 100.0, 1.0))
            .collect();
        BarSeries::new(bars)
            .unwrap()
            .with_feature("sma_2", fast)
            .unwrap()
            .with_feature("sma_3", slow)
            .unwrap()
    }

    #[test]
    fn bullish_cross() {
        let s = series(vec![99.0, 101.0], vec![100.0, 100.0]);
        let mut strat = FeatureCross::sma(2, 3);
        assert!(!strat.should_buy(&s.row(0)).unwrap());
        assert!(strat.should_buy(&s.row(1)).unwrap());
        assert!(!strat.should_sell(&s.row(1)).unwrap());
    }

    #[test]
    fn bearish_cross() {
        let s = series(vec![101.0, 99.0], vec![100.0, 100.0]);
        let mut strat = FeatureCross::sma(2, 3);
        assert!(strat.should_sell(&s.row(1)).unwrap());
        assert!(!strat.should_buy(&s.row(1)).unwrap());
    }

    #[test]
    fn missing_column_is_an_error() {
        let s = series(vec![1.0], vec![1.0]);
        let mut strat = FeatureCross::sma(5, 10);
        assert!(matches!(
            strat.should_buy(&s.row(0)),
            Err(SignalError::MissingColumn { .. })
        ));
        assert_eq!(strat.name(), "cross(sma_5,sma_10)");
    }
}
