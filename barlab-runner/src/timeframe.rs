//! Bar interval labels and the annualization factor they imply.
//!
//! Labels such as `1m`, `15min`, `4h`, `1d` or `1w` map to a step in seconds.
//! Bars per year assume a continuous 365-day calendar unless the label carries
//! the `_equity` suffix, which switches to 252 trading days of 6.5 hours.

use std::fmt;

const SECONDS_PER_DAY: f64 = 86_400.0;
const CALENDAR_DAYS: f64 = 365.0;
const TRADING_DAYS: f64 = 252.0;
const SESSION_SECONDS: f64 = 23_400.0;

/// Trading calendar a timeframe is counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calendar {
    /// Markets that trade around the clock, every day.
    Continuous,
    /// Exchange sessions: 252 days a year, 6.5 hours a day.
    Equity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeframe {
    pub label: String,
    pub step_seconds: i64,
    pub calendar: Calendar,
}

impl Timeframe {
    pub fn parse(value: &str) -> Result<Self, String> {
        let normalized = value.trim().to_lowercase();
        let (interval, calendar) = match normalized.strip_suffix("_equity") {
            Some(base) => (base, Calendar::Equity),
            None => (normalized.as_str(), Calendar::Continuous),
        };
        let label = match interval {
            "1m" | "1min" => "1min",
            "3m" | "3min" => "3min",
            "5m" | "5min" => "5min",
            "15m" | "15min" => "15min",
            "30m" | "30min" => "30min",
            "1h" | "1hour" => "1hour",
            "2h" | "2hour" => "2hour",
            "4h" | "4hour" => "4hour",
            "6h" | "6hour" => "6hour",
            "8h" | "8hour" => "8hour",
            "12h" | "12hour" => "12hour",
            "1d" | "1day" => "1day",
            "1w" | "1week" => "1week",
            _ => return Err(format!("unsupported timeframe: {value}")),
        };

        let step_seconds = parse_duration_like_seconds(label)?;
        Ok(Self {
            label: label.to_string(),
            step_seconds,
            calendar,
        })
    }

    /// Number of bars of this interval in one year.
    pub fn bars_per_year(&self) -> f64 {
        let step = self.step_seconds as f64;
        match self.calendar {
            Calendar::Continuous => CALENDAR_DAYS * SECONDS_PER_DAY / step,
            Calendar::Equity if step < SECONDS_PER_DAY => TRADING_DAYS * SESSION_SECONDS / step,
            Calendar::Equity => TRADING_DAYS * SECONDS_PER_DAY / step,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.calendar {
            Calendar::Continuous => f.write_str(&self.label),
            Calendar::Equity => write!(f, "{}_equity", self.label),
        }
    }
}

pub fn parse_duration_like_seconds(value: &str) -> Result<i64, String> {
    let trimmed = value.trim().to_lowercase();
    if trimmed.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(seconds) = trimmed.parse::<i64>() {
        return Ok(seconds);
    }

    let (number_part, unit_seconds) = if let Some(stripped) = trimmed.strip_suffix("min") {
        (stripped, 60)
    } else if let Some(stripped) = trimmed.strip_suffix("hour") {
        (stripped, 3_600)
    } else if let Some(stripped) = trimmed.strip_suffix("day") {
        (stripped, 86_400)
    } else if let Some(stripped) = trimmed.strip_suffix("week") {
        (stripped, 604_800)
    } else {
        return Err(format!("invalid duration: {value}"));
    };

    let count: i64 = number_part
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {value}"))?;
    if count <= 0 {
        return Err(format!("invalid duration: {value}"));
    }
    Ok(count * unit_seconds)
}
