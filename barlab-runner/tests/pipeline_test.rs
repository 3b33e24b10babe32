//! End-to-end tests for the runner: CSV + TOML in, artifacts out.
//!
//! Tests:
//! 1. CSV with a signal column through the default (precomputed) source
//! 2. CSV features driving a rule set from TOML
//! 3. Artifacts round-trip through JSON
//! 4. Sweeps and walk-forward on synthetic bars

use std::path::PathBuf;

use barlab_core::domain::{ExitReason, PositionSide};
use barlab_core::engine::EndOfSeriesPolicy;
use barlab_runner::{
    import_json, load_csv, random_walk, run_from_config, run_sweep, save_artifacts,
    walk_forward, BacktestConfig, RunError, SourceConfig, SyntheticConfig, WalkForwardConfig,
};
use tempfile::TempDir;

const SIGNAL_CSV: &str = "\
timestamp,open,high,low,close,volume,signal
2024-01-02,100,101,99,100,1000,1
2024-01-03,100,111,100,110,1000,-1
2024-01-04,110,112,108,108,1000,0
";

const FEATURE_CSV: &str = "\
timestamp,open,high,low,close,volume,rsi
2024-01-02 00:00:00,100,101,99,100,1000,50
2024-01-03 00:00:00,100,101,95,96,1500,25
2024-01-04 00:00:00,96,104,96,104,1200,55
2024-01-05 00:00:00,104,113,104,112,1100,75
2024-01-06 00:00:00,112,113,109,110,900,60
";

const RULES_TOML: &str = r#"
[run]
initial_balance = 10000.0
commission_rate = 0.001
slippage_rate = 0.0
sizing = { mode = "fixed_units", units = 10.0 }

[metrics]
timeframe = "1d_equity"

[[rules]]
name = "oversold"
signal = "buy"
when = { kind = "threshold", field = "rsi", op = "lt", value = 30.0 }

[[rules]]
name = "overbought"
signal = "sell"
when = { kind = "threshold", field = "rsi", op = "gt", value = 70.0 }
"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

// ── 1. Precomputed signals ──────────────────────────────────────────

#[test]
fn csv_signal_column_drives_default_source() {
    let dir = TempDir::new().unwrap();
    let series = load_csv(&write(&dir, "bars.csv", SIGNAL_CSV)).unwrap();
    let config = BacktestConfig::from_toml_str(
        "[run]\ncommission_rate = 0.001\nslippage_rate = 0.0\nsizing = { mode = \"fixed_units\", units = 1.0 }\n",
    )
    .unwrap();

    let result = run_from_config(&series, &config).unwrap();
    assert_eq!(result.source, "precomputed");
    assert_eq!(result.num_trades, 1);
    assert!((result.trades[0].net_pnl - 9.79).abs() < 1e-9);
    assert!((result.final_balance - 10_009.79).abs() < 1e-9);
    assert_eq!(result.metrics.win_rate, 1.0);
    assert_eq!(result.equity_curve.len(), 3);
}

// ── 2. Rules from TOML ──────────────────────────────────────────────

#[test]
fn toml_rules_over_csv_features() {
    let dir = TempDir::new().unwrap();
    let series = load_csv(&write(&dir, "bars.csv", FEATURE_CSV)).unwrap();
    let config = BacktestConfig::load(&write(&dir, "run.toml", RULES_TOML)).unwrap();
    assert_eq!(config.effective_source(), SourceConfig::Rules);

    let result = run_from_config(&series, &config).unwrap();
    assert_eq!(result.source, "rules");
    assert_eq!(result.num_trades, 1);
    let trade = &result.trades[0];
    assert_eq!(trade.side, PositionSide::Long);
    assert_eq!((trade.entry_bar, trade.exit_bar), (1, 3));
    assert_eq!(trade.exit_reason, ExitReason::Signal);
    // 10 units: bought 96 (+0.96 fee), sold 112 (-1.12 fee)
    assert!((trade.net_pnl - (1120.0 - 1.12 - 960.0 - 0.96)).abs() < 1e-9);
    assert_eq!(result.signal_stats.buy_signals, 1);
    assert_eq!(result.signal_stats.sell_signals, 1);
    assert_eq!(result.signal_stats.hold_signals, 3);
}

#[test]
fn rule_on_missing_column_is_data_integrity_error() {
    let dir = TempDir::new().unwrap();
    let series = load_csv(&write(&dir, "bars.csv", SIGNAL_CSV)).unwrap();
    let config = BacktestConfig::from_toml_str(RULES_TOML).unwrap();
    match run_from_config(&series, &config) {
        Err(RunError::Backtest(err)) => {
            assert!(err.is_data_integrity());
            assert!(err.to_string().contains("rsi"));
        }
        other => panic!("expected data-integrity error, got {other:?}"),
    }
}

// ── 3. Artifacts ────────────────────────────────────────────────────

#[test]
fn artifacts_round_trip() {
    let dir = TempDir::new().unwrap();
    let series = load_csv(&write(&dir, "bars.csv", FEATURE_CSV)).unwrap();
    let config = BacktestConfig::from_toml_str(RULES_TOML).unwrap();
    let result = run_from_config(&series, &config).unwrap();

    let out = dir.path().join("artifacts/run1");
    let paths = save_artifacts(&result, &out).unwrap();
    assert!(paths.trades.exists());
    assert!(paths.equity.exists());

    let json = std::fs::read_to_string(&paths.result).unwrap();
    let loaded = import_json(&json).unwrap();
    assert_eq!(loaded.run_id, result.run_id);
    assert_eq!(loaded.num_trades, result.num_trades);
    assert_eq!(loaded.trades.len(), result.trades.len());
    assert_eq!(loaded.equity_curve.len(), result.equity_curve.len());
    assert!((loaded.final_balance - result.final_balance).abs() < 1e-9);
    assert!((loaded.metrics.sharpe_ratio - result.metrics.sharpe_ratio).abs() < 1e-9);
    assert_eq!(loaded.end_of_series, result.end_of_series);

    let equity = std::fs::read_to_string(&paths.equity).unwrap();
    assert_eq!(equity.lines().count(), series.len() + 1);
}

#[test]
fn explosive_run_survives_json_round_trip() {
    let dir = TempDir::new().unwrap();
    let csv = "timestamp,open,high,low,close,volume,signal\n\
               2024-01-02,100,100,100,100,1000,1\n\
               2024-01-03,100000,100000,100000,100000,1000,0\n\
               2024-01-04,99000,99000,99000,99000,1000,0\n";
    let series = load_csv(&write(&dir, "bars.csv", csv)).unwrap();
    let config =
        BacktestConfig::from_toml_str("[run]\ncommission_rate = 0.0\nslippage_rate = 0.0\n")
            .unwrap();
    let result = run_from_config(&series, &config).unwrap();
    assert_eq!(result.metrics.annualized_return, f64::MAX);
    assert_eq!(result.metrics.calmar_ratio, f64::MAX);

    let paths = save_artifacts(&result, dir.path()).unwrap();
    let loaded = import_json(&std::fs::read_to_string(&paths.result).unwrap()).unwrap();
    assert!(loaded.metrics.annualized_return.is_finite());
    assert!(loaded.metrics.annualized_return > 1e300);
    assert!(loaded.metrics.calmar_ratio > 1e300);
    assert!((loaded.final_balance - result.final_balance).abs() < 1e-6);
}

#[test]
fn future_schema_is_rejected() {
    let dir = TempDir::new().unwrap();
    let series = load_csv(&write(&dir, "bars.csv", SIGNAL_CSV)).unwrap();
    let mut result = run_from_config(&series, &BacktestConfig::default()).unwrap();
    result.schema_version = 99;
    let json = serde_json::to_string(&result).unwrap();
    assert!(import_json(&json).is_err());
}

// ── 4. Parallel runs ────────────────────────────────────────────────

fn sma_config(fast: usize, slow: usize) -> BacktestConfig {
    BacktestConfig {
        source: Some(SourceConfig::SmaCross { fast, slow }),
        ..BacktestConfig::default()
    }
}

#[test]
fn sweep_matches_sequential_runs() {
    let series = random_walk(&SyntheticConfig {
        bars: 400,
        ..SyntheticConfig::default()
    })
    .unwrap();
    let configs = vec![sma_config(5, 20), sma_config(10, 50), sma_config(20, 10)];

    let results = run_sweep(&series, &configs);
    assert_eq!(results.len(), 3);
    for (config, result) in configs.iter().zip(&results).take(2) {
        let sequential = run_from_config(&series, config).unwrap();
        assert_eq!(result.as_ref().unwrap(), &sequential);
    }
    assert!(matches!(results[2], Err(RunError::Config(_))));
}

#[test]
fn walk_forward_windows_are_independent() {
    let series = random_walk(&SyntheticConfig {
        bars: 300,
        ..SyntheticConfig::default()
    })
    .unwrap();
    let config = BacktestConfig {
        run: barlab_core::engine::RunConfig {
            end_of_series: EndOfSeriesPolicy::ForceClose,
            ..Default::default()
        },
        ..sma_config(5, 20)
    };
    let layout = WalkForwardConfig {
        window: 100,
        step: 50,
    };

    let windows = walk_forward(&series, &config, &layout).unwrap();
    assert_eq!(windows.len(), 5);
    for (i, w) in windows.iter().enumerate() {
        assert_eq!(w.window_index, i);
        assert_eq!(w.start_bar, i * 50);
        assert_eq!(w.result.bars_processed, 100);
        assert_eq!(w.result.initial_balance, config.run.initial_balance);
        assert_eq!(w.start_time, series.bars()[w.start_bar].timestamp);

        let alone = run_from_config(&series.window(w.start_bar, w.end_bar).unwrap(), &config)
            .unwrap();
        assert_eq!(alone, w.result);
    }
}
