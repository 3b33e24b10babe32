//! Serializable backtest configuration loaded from TOML.
//!
//! A config file has three parts:
//!
//! ```toml
//! [run]
//! initial_balance = 10000.0
//! commission_rate = 0.001
//! slippage_rate = 0.0005
//! allow_short = false
//! end_of_series = "force_close"
//! sizing = { mode = "fixed_fraction", fraction = 0.5 }
//!
//! [metrics]
//! timeframe = "1d_equity"      # or: annualization_factor = 252.0
//! risk_free_rate = 0.02
//!
//! [source]
//! type = "rules"               # rules | precomputed | sma_cross | feature_cross
//!
//! [[rules]]
//! name = "oversold"
//! signal = "buy"
//! when = { kind = "threshold", field = "rsi", op = "lt", value = 30.0 }
//! ```
//!
//! Every section is optional. Without `[source]` the rules drive the run when
//! any are given, otherwise the series' precomputed signal column does.

use std::path::{Path, PathBuf};

use barlab_core::engine::{ConfigError as RunConfigError, RunConfig};
use barlab_core::rules::{Rule, RuleEngine};
use barlab_core::strategy::{
    FeatureCross, PrecomputedSignals, SignalError, SignalSource, SmaCross, StrategySignals,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::{ComputationError, MetricsConfig};
use crate::timeframe::Timeframe;

/// Unique identifier for a backtest configuration (content-addressable hash).
pub type RunId = String;

/// Errors from loading or validating a [`BacktestConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Run(#[from] RunConfigError),

    #[error("invalid rule set: {0}")]
    Rules(#[from] SignalError),

    #[error("source 'rules' selected but no [[rules]] are defined")]
    NoRules,

    #[error("invalid sma_cross periods: fast {fast}, slow {slow}")]
    SmaPeriods { fast: usize, slow: usize },

    #[error("{0}")]
    Timeframe(String),

    #[error(transparent)]
    Metrics(#[from] ComputationError),

    #[error("set either metrics.annualization_factor or metrics.timeframe, not both")]
    ConflictingAnnualization,

    #[error("invalid window: {window} bars stepping {step} over {bars} bars")]
    Window {
        window: usize,
        step: usize,
        bars: usize,
    },
}

/// Metrics section: how to annualize and the risk-free rate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsSection {
    pub annualization_factor: Option<f64>,
    /// Bar interval label, e.g. `1h` or `1d_equity`.
    pub timeframe: Option<String>,
    pub risk_free_rate: f64,
}

impl MetricsSection {
    /// Bars per year, from the explicit factor, the timeframe, or 252.
    pub fn annualization_factor(&self) -> Result<f64, ConfigError> {
        match (self.annualization_factor, &self.timeframe) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingAnnualization),
            (Some(af), None) => Ok(af),
            (None, Some(label)) => Ok(Timeframe::parse(label)
                .map_err(ConfigError::Timeframe)?
                .bars_per_year()),
            (None, None) => Ok(MetricsConfig::default().annualization_factor),
        }
    }
}

/// Which signal source drives the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// The `[[rules]]` list, first match wins.
    Rules,
    /// The series' own signal column.
    Precomputed,
    /// Moving-average crossover computed from close history.
    SmaCross { fast: usize, slow: usize },
    /// Crossover of two precomputed feature columns.
    FeatureCross { fast: String, slow: String },
}

/// Top-level backtest configuration, as loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacktestConfig {
    pub run: RunConfig,
    pub metrics: MetricsSection,
    pub source: Option<SourceConfig>,
    pub rules: Vec<Rule>,
}

impl BacktestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Computes a deterministic hash ID for this configuration.
    ///
    /// Two identical configurations share a RunId.
    pub fn run_id(&self) -> RunId {
        // Plain data with string keys; serialization does not fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }

    /// The source in effect once defaults are applied.
    pub fn effective_source(&self) -> SourceConfig {
        match &self.source {
            Some(source) => source.clone(),
            None if self.rules.is_empty() => SourceConfig::Precomputed,
            None => SourceConfig::Rules,
        }
    }

    /// Metrics inputs for this run; the initial balance comes from `[run]`.
    pub fn metrics_config(&self) -> Result<MetricsConfig, ConfigError> {
        Ok(MetricsConfig {
            initial_balance: self.run.initial_balance,
            annualization_factor: self.metrics.annualization_factor()?,
            risk_free_rate: self.metrics.risk_free_rate,
        })
    }

    /// Build a fresh signal source. Each run gets its own instance.
    pub fn build_source(&self) -> Result<Box<dyn SignalSource + Send>, ConfigError> {
        let conflict = self.run.conflict;
        Ok(match self.effective_source() {
            SourceConfig::Rules => {
                if self.rules.is_empty() {
                    return Err(ConfigError::NoRules);
                }
                Box::new(RuleEngine::new(self.rules.clone())?)
            }
            SourceConfig::Precomputed => Box::new(PrecomputedSignals),
            SourceConfig::SmaCross { fast, slow } => {
                let strategy =
                    SmaCross::new(fast, slow).ok_or(ConfigError::SmaPeriods { fast, slow })?;
                Box::new(StrategySignals::new(strategy, conflict))
            }
            SourceConfig::FeatureCross { fast, slow } => Box::new(StrategySignals::new(
                FeatureCross::new(fast.as_str(), slow.as_str()),
                conflict,
            )),
        })
    }

    /// Check everything that can be checked without bars.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run.validate()?;
        self.metrics_config()?.validate()?;
        self.build_source()?;
        Ok(())
    }
}
