//! Export — JSON and CSV artifacts for a backtest result.
//!
//! - **JSON**: the full `BacktestResult`, schema-versioned and round-trippable
//! - **CSV**: trade ledger and equity curve for external analysis tools
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use barlab_core::domain::{EquityPoint, Trade};
use thiserror::Error;
use tracing::info;

use crate::runner::{BacktestResult, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush CSV writer: {0}")]
    Flush(std::io::Error),
    #[error("CSV output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported schema version {found} (max supported: {max})")]
    SchemaVersion { found: u32, max: u32 },
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult, ExportError> {
    let result: BacktestResult = serde_json::from_str(json)?;
    if result.schema_version > SCHEMA_VERSION {
        return Err(ExportError::SchemaVersion {
            found: result.schema_version,
            max: SCHEMA_VERSION,
        });
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the trade ledger as CSV.
///
/// Columns: side, entry_bar, entry_time, entry_price, exit_bar, exit_time,
/// exit_price, exit_reason, size, gross_pnl, commission, slippage, net_pnl,
/// net_return, bars_held
pub fn export_trades_csv(trades: &[Trade]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "side",
        "entry_bar",
        "entry_time",
        "entry_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "exit_reason",
        "size",
        "gross_pnl",
        "commission",
        "slippage",
        "net_pnl",
        "net_return",
        "bars_held",
    ])?;

    for t in trades {
        wtr.write_record([
            &format!("{:?}", t.side),
            &t.entry_bar.to_string(),
            &t.entry_time.to_rfc3339(),
            &format!("{:.6}", t.entry_price),
            &t.exit_bar.to_string(),
            &t.exit_time.to_rfc3339(),
            &format!("{:.6}", t.exit_price),
            &format!("{:?}", t.exit_reason),
            &format!("{:.6}", t.size),
            &format!("{:.2}", t.gross_pnl),
            &format!("{:.2}", t.commission_paid),
            &format!("{:.2}", t.slippage_cost),
            &format!("{:.2}", t.net_pnl),
            &format!("{:.4}", t.net_return()),
            &t.bars_held.to_string(),
        ])?;
    }

    finish(wtr)
}

/// Export an equity curve as CSV with timestamp and equity columns.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity"])?;
    for point in equity_curve {
        wtr.write_record([&point.timestamp.to_rfc3339(), &format!("{:.2}", point.equity)])?;
    }
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Flush(e.into_error()))?;
    Ok(String::from_utf8(data)?)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Paths written by [`save_artifacts`].
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub result: PathBuf,
    pub trades: PathBuf,
    pub equity: PathBuf,
}

/// Save the full artifact set for a single backtest run.
///
/// Creates `output_dir` if needed and writes:
/// - `result.json` — the full `BacktestResult`
/// - `trades.csv` — the trade ledger
/// - `equity.csv` — the equity curve
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<ArtifactPaths, ExportError> {
    std::fs::create_dir_all(output_dir).map_err(|source| ExportError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let paths = ArtifactPaths {
        dir: output_dir.to_path_buf(),
        result: output_dir.join("result.json"),
        trades: output_dir.join("trades.csv"),
        equity: output_dir.join("equity.csv"),
    };

    write_file(&paths.result, &export_json(result)?)?;
    write_file(&paths.trades, &export_trades_csv(&result.trades)?)?;
    write_file(&paths.equity, &export_equity_csv(&result.equity_curve)?)?;

    info!(dir = %output_dir.display(), "artifacts written");
    Ok(paths)
}

fn write_file(path: &Path, contents: &str) -> Result<(), ExportError> {
    std::fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use barlab_core::domain::{ExitReason, PositionSide};
    use chrono::{TimeZone, Utc};

    fn trade() -> Trade {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        Trade {
            side: PositionSide::Long,
            entry_bar: 0,
            entry_time: t0,
            entry_price: 100.0,
            exit_bar: 1,
            exit_time: t1,
            exit_price: 110.0,
            exit_reason: ExitReason::Signal,
            size: 1.0,
            gross_pnl: 10.0,
            commission_paid: 0.21,
            slippage_cost: 0.0,
            net_pnl: 9.79,
            bars_held: 1,
        }
    }

    #[test]
    fn trades_csv_has_header_and_rows() {
        let csv = export_trades_csv(&[trade(), trade()]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("side,entry_bar,entry_time"));
        assert!(lines[1].starts_with("Long,0,2024-01-02T00:00:00+00:00,100.000000"));
        assert!(lines[1].contains(",Signal,"));
        assert!(lines[1].contains(",9.79,"));
    }

    #[test]
    fn empty_ledger_is_header_only() {
        let csv = export_trades_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn equity_csv_rows() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let curve = vec![EquityPoint {
            timestamp: t,
            equity: 10_000.0,
        }];
        let csv = export_equity_csv(&curve).unwrap();
        assert_eq!(csv, "timestamp,equity\n2024-01-02T00:00:00+00:00,10000.00\n");
    }
}
