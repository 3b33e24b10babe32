//! Run-level error taxonomy.

use crate::domain::BarError;
use crate::engine::ConfigError;
use crate::strategy::SignalError;
use thiserror::Error;

/// Input data that cannot be replayed as given.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataIntegrityError {
    #[error(transparent)]
    Bars(#[from] BarError),

    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// Why a backtest run aborted.
///
/// Configuration errors are raised before the first bar; data-integrity
/// errors on first detection. Neither is ever recovered silently.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("data integrity error: {0}")]
    DataIntegrity(#[from] DataIntegrityError),
}

impl From<BarError> for BacktestError {
    fn from(err: BarError) -> Self {
        Self::DataIntegrity(err.into())
    }
}

impl From<SignalError> for BacktestError {
    /// Invalid rule parameters are configuration problems; everything else a
    /// signal source reports is about the data it was handed.
    fn from(err: SignalError) -> Self {
        match err {
            SignalError::InvalidRule { rule, reason } => {
                Self::Config(ConfigError::InvalidRule { rule, reason })
            }
            other => Self::DataIntegrity(other.into()),
        }
    }
}

impl BacktestError {
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    pub fn is_data_integrity(&self) -> bool {
        matches!(self, Self::DataIntegrity(_))
    }
}
