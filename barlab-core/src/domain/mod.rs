//! Domain types for barlab

pub mod account;
pub mod bar;
pub mod equity;
pub mod series;
pub mod signal;
pub mod trade;

pub use account::{Account, Position, PositionSide};
pub use bar::{Bar, BarError};
pub use equity::{equity_values, EquityPoint};
pub use series::{BarRow, BarSeries, FeatureColumns, Field};
pub use signal::{Signal, SignalStats};
pub use trade::{ExitReason, Trade};
