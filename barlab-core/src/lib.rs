//! Barlab Core — bar replay engine, execution simulator, rules and strategies.
//!
//! This crate contains the simulation half of the backtester:
//! - Domain types (bars, series, signals, account, trades, equity points)
//! - Signal sources: declarative rule engine, precomputed signal column,
//!   custom strategies behind the `should_buy`/`should_sell` contract
//! - Explicit Flat/Long/Short position state machine
//! - Execution simulator with commission and slippage
//! - Sequential replay loop with cooperative cancellation
//!
//! The core never reads files or the network. Loading, metrics and parallel
//! runs live in `barlab-runner`.

pub mod domain;
pub mod engine;
pub mod error;
pub mod rules;
pub mod strategy;

pub use error::{BacktestError, DataIntegrityError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: run inputs and outputs are Send + Sync, so
    /// independent runs can be fanned out across threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::BarSeries>();
        require_sync::<domain::BarSeries>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();
        require_send::<domain::Account>();
        require_sync::<domain::Account>();

        // Engine types
        require_send::<engine::RunConfig>();
        require_sync::<engine::RunConfig>();
        require_send::<engine::ReplayOutput>();
        require_sync::<engine::ReplayOutput>();
        require_send::<engine::CancelToken>();
        require_sync::<engine::CancelToken>();
        require_send::<engine::ExecutionSimulator>();
        require_sync::<engine::ExecutionSimulator>();

        // Signal sources
        require_send::<rules::RuleEngine>();
        require_sync::<rules::RuleEngine>();
        require_send::<strategy::FeatureCross>();
        require_sync::<strategy::FeatureCross>();
        require_send::<strategy::SmaCross>();
        require_sync::<strategy::SmaCross>();

        // Errors
        require_send::<BacktestError>();
        require_sync::<BacktestError>();
    }

    /// Architecture contract: strategies never see the account.
    ///
    /// `should_buy`/`should_sell` take only the row. If someone adds account
    /// state to the signature, this stops compiling.
    #[test]
    fn strategy_trait_has_no_account_parameter() {
        fn _check_trait_object_builds(
            strategy: &mut dyn strategy::Strategy,
            row: &domain::BarRow<'_>,
        ) -> Result<(bool, bool), strategy::SignalError> {
            Ok((strategy.should_buy(row)?, strategy.should_sell(row)?))
        }
    }
}
