//! Bar series — validated, time-ordered bars plus precomputed columns.
//!
//! Upstream feature engineering materialises indicator values as named
//! columns aligned with the bars. The series owns those columns and an
//! optional precomputed signal column. Rows are read through [`BarRow`].

use super::bar::{Bar, BarError};
use super::signal::Signal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A field of a row: one of the raw OHLCV values or a named feature column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
    Feature(String),
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.is_empty() {
            return Err("empty field name".to_string());
        }
        Ok(match name {
            "open" | "open_price" => Self::Open,
            "high" | "high_price" => Self::High,
            "low" | "low_price" => Self::Low,
            "close" | "close_price" => Self::Close,
            "volume" => Self::Volume,
            other => Self::Feature(other.to_string()),
        })
    }
}

impl TryFrom<String> for Field {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Field> for String {
    fn from(field: Field) -> Self {
        field.to_string()
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| Self::Feature(s.to_string()))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::High => f.write_str("high"),
            Self::Low => f.write_str("low"),
            Self::Close => f.write_str("close"),
            Self::Volume => f.write_str("volume"),
            Self::Feature(name) => f.write_str(name),
        }
    }
}

/// Container for precomputed feature columns.
///
/// Built once upstream, then queried by bar index during the loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureColumns {
    series: HashMap<String, Vec<f64>>,
}

impl FeatureColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a named column.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    /// Get the column value at a specific bar index.
    pub fn get(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.series
            .get(name)
            .and_then(|v| v.get(bar_index).copied())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    /// Get the full column.
    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    /// Column names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.series.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    fn slice(&self, start: usize, end: usize) -> Self {
        Self {
            series: self
                .series
                .iter()
                .map(|(k, v)| (k.clone(), v[start..end].to_vec()))
                .collect(),
        }
    }
}

/// Validated, strictly time-ordered bar sequence for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    bars: Vec<Bar>,
    features: FeatureColumns,
    signals: Option<Vec<Signal>>,
}

impl BarSeries {
    /// Validate and wrap a bar sequence.
    ///
    /// Fails on an empty sequence, on any timestamp that does not strictly
    /// increase, and on non-positive or non-finite closes. Bars are never
    /// reordered.
    pub fn new(bars: Vec<Bar>) -> Result<Self, BarError> {
        validate_bars(&bars)?;
        Ok(Self {
            bars,
            features: FeatureColumns::new(),
            signals: None,
        })
    }

    /// Attach a precomputed feature column. Its length must match the bars.
    pub fn with_feature(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, BarError> {
        let name = name.into();
        self.check_len(&name, values.len())?;
        self.features.insert(name, values);
        Ok(self)
    }

    /// Attach a precomputed signal column. Its length must match the bars.
    pub fn with_signals(mut self, signals: Vec<Signal>) -> Result<Self, BarError> {
        self.check_len("signal", signals.len())?;
        self.signals = Some(signals);
        Ok(self)
    }

    fn check_len(&self, name: &str, actual: usize) -> Result<(), BarError> {
        if actual != self.bars.len() {
            return Err(BarError::ColumnLength {
                name: name.to_string(),
                expected: self.bars.len(),
                actual,
            });
        }
        Ok(())
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn features(&self) -> &FeatureColumns {
        &self.features
    }

    pub fn signals(&self) -> Option<&[Signal]> {
        self.signals.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> &Bar {
        &self.bars[0]
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    /// Whether a field can be read from this series' rows.
    pub fn has_field(&self, field: &Field) -> bool {
        match field {
            Field::Feature(name) => self.features.contains(name),
            _ => true,
        }
    }

    /// Row view at `index`. Panics if out of bounds, like slice indexing.
    pub fn row(&self, index: usize) -> BarRow<'_> {
        assert!(index < self.bars.len(), "row index {index} out of bounds");
        BarRow {
            series: self,
            index,
        }
    }

    /// Highest close in the series.
    pub fn max_close(&self) -> f64 {
        self.bars.iter().map(|b| b.close).fold(f64::MIN, f64::max)
    }

    /// Copy of bars `[start, end)` with the matching slice of every column.
    ///
    /// Returns `None` for an empty or out-of-range window.
    pub fn window(&self, start: usize, end: usize) -> Option<Self> {
        if start >= end || end > self.bars.len() {
            return None;
        }
        Some(Self {
            bars: self.bars[start..end].to_vec(),
            features: self.features.slice(start, end),
            signals: self.signals.as_ref().map(|s| s[start..end].to_vec()),
        })
    }
}

fn validate_bars(bars: &[Bar]) -> Result<(), BarError> {
    if bars.is_empty() {
        return Err(BarError::Empty);
    }
    for (index, bar) in bars.iter().enumerate() {
        if !(bar.close.is_finite() && bar.close > 0.0) {
            return Err(BarError::InvalidClose {
                index,
                timestamp: bar.timestamp,
                close: bar.close,
            });
        }
        if index == 0 {
            continue;
        }
        let previous = bars[index - 1].timestamp;
        if bar.timestamp == previous {
            return Err(BarError::DuplicateTimestamp {
                index,
                timestamp: bar.timestamp,
            });
        }
        if bar.timestamp < previous {
            return Err(BarError::NonMonotonic {
                index,
                timestamp: bar.timestamp,
                previous,
            });
        }
    }
    Ok(())
}

/// Read-only view of one row: the bar at `index` plus its feature values.
#[derive(Debug, Clone, Copy)]
pub struct BarRow<'a> {
    series: &'a BarSeries,
    index: usize,
}

impl<'a> BarRow<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn bar(&self) -> &'a Bar {
        &self.series.bars[self.index]
    }

    pub fn series(&self) -> &'a BarSeries {
        self.series
    }

    /// Bars up to and including this row. Never exposes later bars.
    pub fn history(&self) -> &'a [Bar] {
        &self.series.bars[..=self.index]
    }

    /// Value of `field` at this row; `None` if the column does not exist.
    pub fn value(&self, field: &Field) -> Option<f64> {
        let bar = self.bar();
        match field {
            Field::Open => Some(bar.open),
            Field::High => Some(bar.high),
            Field::Low => Some(bar.low),
            Field::Close => Some(bar.close),
            Field::Volume => Some(bar.volume),
            Field::Feature(name) => self.series.features.get(name, self.index),
        }
    }

    /// Shorthand for `value(&name.into())`.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.value(&Field::from(name))
    }

    /// Precomputed signal for this row, if the series carries a signal column.
    pub fn signal(&self) -> Option<Signal> {
        self.series.signals.as_ref().map(|s| s[self.index])
    }

    /// The previous row, or `None` on the first bar.
    pub fn previous(&self) -> Option<BarRow<'a>> {
        self.index.checked_sub(1).map(|index| BarRow {
            series: self.series,
            index,
        })
    }
}
