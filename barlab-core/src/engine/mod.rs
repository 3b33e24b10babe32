//! Backtesting engine — replay loop, execution simulator and supporting types.
//!
//! The engine consumes a validated [`BarSeries`](crate::domain::BarSeries)
//! and a [`SignalSource`](crate::strategy::SignalSource), and replays it bar
//! by bar:
//!
//! 1. Signal: the source decides Buy, Sell or Hold for the row
//! 2. Transition: the position state machine maps the signal to an action
//! 3. Execution: the simulator fills at the close with commission and slippage
//! 4. Accounting: one equity point per bar, closed trades to the ledger

pub mod config;
pub mod cost_model;
pub mod ledger;
pub mod replay;
pub mod simulator;
pub mod sizing;
pub mod state;

pub use config::{ConfigError, EndOfSeriesPolicy, RunConfig};
pub use cost_model::{CostModel, Fill, FillSide};
pub use ledger::TradeLedger;
pub use replay::{replay, replay_with_cancel, CancelToken, ReplayOutput};
pub use simulator::{ExecutionSimulator, Outcome, SimulationOutput};
pub use sizing::SizingPolicy;
pub use state::{Action, IgnoreReason, PositionState, TransitionRules};
