//! Bar loading from CSV for the runner.
//!
//! Expected header: `timestamp,open,high,low,close,volume` (case-insensitive,
//! `date`/`datetime`/`time` accepted for the timestamp). Every other column
//! whose cells all parse as numbers becomes a feature column; empty cells are
//! read as NaN. A column named `signal` holding 1 / -1 / 0 becomes the
//! precomputed signal column.
//!
//! Loading never reorders or repairs rows. A series that is not strictly
//! time-ordered is rejected by [`BarSeries::new`] with the offending index.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use barlab_core::domain::{Bar, BarError, BarSeries, Signal};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;
use tracing::{debug, warn};

/// Epoch values above this are read as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

const OHLCV: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("line {line}: unparseable timestamp '{value}'")]
    Timestamp { line: u64, value: String },

    #[error("line {line}: column '{column}' has non-numeric value '{value}'")]
    Number {
        line: u64,
        column: String,
        value: String,
    },

    #[error("line {line}: signal must be 1, -1 or 0, got '{value}'")]
    Signal { line: u64, value: String },

    #[error("data integrity: {0}")]
    Bars(#[from] BarError),
}

/// Load a bar series from a CSV file.
pub fn load_csv(path: &Path) -> Result<BarSeries, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let series = read_csv(file)?;
    debug!(path = %path.display(), bars = series.len(), "loaded bars");
    Ok(series)
}

/// Read a bar series from any CSV source.
pub fn read_csv<R: Read>(reader: R) -> Result<BarSeries, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();

    let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));
    let ts_col = find(&["timestamp", "date", "datetime", "time"])
        .ok_or_else(|| LoadError::MissingColumn("timestamp".to_string()))?;
    let mut ohlcv = [0usize; 5];
    for (slot, name) in ohlcv.iter_mut().zip(OHLCV) {
        *slot = find(&[name]).ok_or_else(|| LoadError::MissingColumn(name.to_string()))?;
    }
    let signal_col = find(&["signal"]);

    let feature_cols: Vec<usize> = (0..headers.len())
        .filter(|i| *i != ts_col && !ohlcv.contains(i) && Some(*i) != signal_col)
        .collect();

    let mut bars = Vec::new();
    let mut signals = Vec::new();
    let mut features: HashMap<usize, Vec<f64>> = HashMap::new();
    let mut non_numeric: Vec<usize> = Vec::new();

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        // 1-based file line, header included
        let line = record.position().map_or(row as u64 + 2, |p| p.line());
        let cell = |i: usize| record.get(i).unwrap_or("");

        let timestamp = parse_timestamp(cell(ts_col)).ok_or_else(|| LoadError::Timestamp {
            line,
            value: cell(ts_col).to_string(),
        })?;

        let mut values = [0.0; 5];
        for (value, (&col, name)) in values.iter_mut().zip(ohlcv.iter().zip(OHLCV)) {
            *value = parse_number(cell(col)).ok_or_else(|| LoadError::Number {
                line,
                column: name.to_string(),
                value: cell(col).to_string(),
            })?;
        }
        let [open, high, low, close, volume] = values;
        bars.push(Bar::new(timestamp, open, high, low, close, volume));

        if let Some(col) = signal_col {
            signals.push(parse_signal(cell(col)).ok_or_else(|| LoadError::Signal {
                line,
                value: cell(col).to_string(),
            })?);
        }

        for &col in &feature_cols {
            if non_numeric.contains(&col) {
                continue;
            }
            match parse_number(cell(col)) {
                Some(v) => features.entry(col).or_default().push(v),
                None => {
                    warn!(
                        column = %headers[col],
                        line,
                        value = cell(col),
                        "non-numeric column skipped"
                    );
                    non_numeric.push(col);
                    features.remove(&col);
                }
            }
        }
    }

    let mut series = BarSeries::new(bars)?;
    for col in feature_cols {
        if let Some(values) = features.remove(&col) {
            series = series.with_feature(headers[col].clone(), values)?;
        }
    }
    if signal_col.is_some() {
        series = series.with_signals(signals)?;
    }
    Ok(series)
}

/// Parse a timestamp in any of the accepted formats, as UTC.
///
/// Accepts RFC 3339, `%Y-%m-%d %H:%M:%S`, `%Y-%m-%dT%H:%M:%S`, `%Y-%m-%d`,
/// and integer epoch seconds or milliseconds.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    let epoch: i64 = value.parse().ok()?;
    if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(epoch)
    } else {
        DateTime::from_timestamp(epoch, 0)
    }
}

/// Empty cells are missing values (NaN).
fn parse_number(value: &str) -> Option<f64> {
    if value.is_empty() {
        return Some(f64::NAN);
    }
    value.parse().ok()
}

fn parse_signal(value: &str) -> Option<Signal> {
    if value.is_empty() {
        return Some(Signal::Hold);
    }
    let code: f64 = value.parse().ok()?;
    if code.fract() != 0.0 {
        return None;
    }
    Signal::from_code(code as i64)
}
