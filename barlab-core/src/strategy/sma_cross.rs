//! Moving average crossover computed from bar history
//!
//! Unlike [`FeatureCross`](super::FeatureCross) this needs no precomputed
//! columns: both averages are computed from the closes visible at each row.

use super::{SignalError, Strategy};
use crate::domain::{Bar, BarRow};

/// Simple moving average crossover over closes.
///
/// # Parameters
/// - `fast_period`: short window (e.g. 20)
/// - `slow_period`: long window (e.g. 50)
#[derive(Debug, Clone)]
pub struct SmaCross {
    fast_period: usize,
    slow_period: usize,
}

impl SmaCross {
    /// Returns `None` unless `0 < fast_period < slow_period`.
    pub fn new(fast_period: usize, slow_period: usize) -> Option<Self> {
        if fast_period == 0 || slow_period <= fast_period {
            return None;
        }
        Some(Self {
            fast_period,
            slow_period,
        })
    }

    fn sma(bars: &[Bar], period: usize) -> Option<f64> {
        if bars.len() < period {
            return None;
        }
        let recent = &bars[bars.len() - period..];
        Some(recent.iter().map(|b| b.close).sum::<f64>() / period as f64)
    }

    /// Some(true) on a bullish cross, Some(false) on a bearish one.
    fn detect_cross(&self, bars: &[Bar]) -> Option<bool> {
        if bars.len() < self.slow_period + 1 {
            return None;
        }
        let fast_now = Self::sma(bars, self.fast_period)?;
        let slow_now = Self::sma(bars, self.slow_period)?;

        let prev = &bars[..bars.len() - 1];
        let fast_prev = Self::sma(prev, self.fast_period)?;
        let slow_prev = Self::sma(prev, self.slow_period)?;

        if fast_prev <= slow_prev && fast_now > slow_now {
            Some(true)
        } else if fast_prev >= slow_prev && fast_now < slow_now {
            Some(false)
        } else {
            None
        }
    }

    /// Bars needed before the first cross can be detected.
    pub fn max_lookback(&self) -> usize {
        self.slow_period + 1
    }
}

impl Strategy for SmaCross {
    fn name(&self) -> &str {
        "sma_cross"
    }

    fn should_buy(&mut self, row: &BarRow<'_>) -> Result<bool, SignalError> {
        Ok(self.detect_cross(row.history()) == Some(true))
    }

    fn should_sell(&mut self, row: &BarRow<'_>) -> Result<bool, SignalError> {
        Ok(self.detect_cross(row.history()) == Some(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BarSeries;
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: &[f64]) -> BarSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(start + Duration::days(i as i64), c, c + 1.0, c - 1.0, c, 1e6))
            .collect();
        BarSeries::new(bars).unwrap()
    }

    #[test]
    fn bullish_cross_buys() {
        let s = series(&[102.0, 101.0, 100.0, 105.0]);
        let mut strat = SmaCross::new(2, 3).unwrap();
        assert!(strat.should_buy(&s.row(3)).unwrap());
        assert!(!strat.should_sell(&s.row(3)).unwrap());
    }

    #[test]
    fn bearish_cross_sells() {
        let s = series(&[100.0, 101.0, 102.0, 97.0]);
        let mut strat = SmaCross::new(2, 3).unwrap();
        assert!(strat.should_sell(&s.row(3)).unwrap());
    }

    #[test]
    fn insufficient_history_holds() {
        let s = series(&[100.0, 101.0]);
        let mut strat = SmaCross::new(2, 3).unwrap();
        assert!(!strat.should_buy(&s.row(1)).unwrap());
        assert!(!strat.should_sell(&s.row(1)).unwrap());
    }

    #[test]
    fn rejects_bad_periods() {
        assert!(SmaCross::new(0, 3).is_none());
        assert!(SmaCross::new(5, 5).is_none());
        assert_eq!(SmaCross::new(20, 50).unwrap().max_lookback(), 51);
    }
}
