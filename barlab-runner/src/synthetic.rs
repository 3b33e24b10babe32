//! Seeded random-walk bars for demos, benches and tests.
//!
//! The same config always produces the same series. Results on synthetic data
//! say nothing about any market.

use barlab_core::domain::{Bar, BarError, BarSeries};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub bars: usize,
    pub seed: u64,
    pub start: DateTime<Utc>,
    pub interval: Duration,
    pub start_price: f64,
    /// Maximum absolute per-bar return.
    pub max_move: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            bars: 252,
            seed: 42,
            start: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            interval: Duration::days(1),
            start_price: 100.0,
            max_move: 0.03,
        }
    }
}

/// Generate a random-walk bar series.
///
/// Fails only for a zero-length request or a non-positive start price.
pub fn random_walk(config: &SyntheticConfig) -> Result<BarSeries, BarError> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut bars = Vec::with_capacity(config.bars);
    let mut price = config.start_price;

    for i in 0..config.bars {
        let change: f64 = if config.max_move > 0.0 {
            rng.gen_range(-config.max_move..config.max_move)
        } else {
            0.0
        };
        let open = price;
        let close = price * (1.0 + change);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64) as f64;

        bars.push(Bar::new(
            config.start + config.interval * i as i32,
            open,
            high,
            low,
            close,
            volume,
        ));
        price = close;
    }

    BarSeries::new(bars)
}
