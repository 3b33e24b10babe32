//! barlab Runner — backtest orchestration, metrics, config loading, export.
//!
//! This crate builds on `barlab-core` to provide:
//! - Performance metrics over a finished equity curve and trade ledger
//! - TOML run configuration with timeframe-derived annualization
//! - CSV bar loading and seeded synthetic bars
//! - Single-run runner, parallel sweeps and walk-forward windows
//! - JSON and CSV artifact export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod sweep;
pub mod synthetic;
pub mod timeframe;

pub use config::{BacktestConfig, ConfigError, MetricsSection, RunId, SourceConfig};
pub use data_loader::{load_csv, read_csv, LoadError};
pub use export::{
    export_equity_csv, export_json, export_trades_csv, import_json, save_artifacts,
    ArtifactPaths, ExportError,
};
pub use metrics::{ComputationError, MetricsConfig, MetricsResult};
pub use runner::{
    run_backtest, run_backtest_with_cancel, run_from_config, run_from_config_with_cancel,
    BacktestResult, RunError,
};
pub use sweep::{run_sweep, walk_forward, WalkForwardConfig, WindowResult};
pub use synthetic::{random_walk, SyntheticConfig};
pub use timeframe::Timeframe;
