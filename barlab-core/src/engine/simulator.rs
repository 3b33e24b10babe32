//! Execution simulator — turns signals into fills and owns the account.
//!
//! Every signal goes through the [`TransitionRules`] table first; the
//! simulator then executes the resulting action at the bar's close with the
//! configured costs. It is the only writer of the [`Account`], the
//! [`TradeLedger`] and the equity curve.

use super::config::{ConfigError, RunConfig};
use super::cost_model::{CostModel, Fill};
use super::ledger::TradeLedger;
use super::state::{Action, IgnoreReason, PositionState, TransitionRules};
use crate::domain::{
    Account, Bar, EquityPoint, ExitReason, Position, PositionSide, Signal, Trade,
};

/// Relative slack allowed when comparing an entry's cost with available cash.
const AFFORD_EPSILON: f64 = 1e-9;

/// What one signal did to the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Stayed,
    Ignored(IgnoreReason),
    Opened(PositionSide),
    Added(PositionSide),
    Closed(PositionSide),
    /// Entry allowed by the table but not affordable with current cash.
    Rejected(PositionSide),
}

/// Everything a finished (or cancelled) simulation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    pub account: Account,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub rejected_entries: usize,
    pub ignored_signals: usize,
    pub bars_in_position: usize,
}

/// Single-run execution state machine.
#[derive(Debug, Clone)]
pub struct ExecutionSimulator {
    config: RunConfig,
    cost: CostModel,
    transitions: TransitionRules,
    account: Account,
    ledger: TradeLedger,
    equity_curve: Vec<EquityPoint>,
    rejected_entries: usize,
    ignored_signals: usize,
    bars_in_position: usize,
}

impl ExecutionSimulator {
    /// Validate `config` and start flat with the initial balance.
    pub fn new(config: RunConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            cost: config.cost_model(),
            transitions: TransitionRules {
                allow_short: config.allow_short,
                pyramiding: config.pyramiding,
            },
            account: Account::new(config.initial_balance),
            ledger: TradeLedger::new(),
            equity_curve: Vec::new(),
            rejected_entries: 0,
            ignored_signals: 0,
            bars_in_position: 0,
            config,
        })
    }

    /// Pre-size the equity curve for `bars` points.
    pub fn with_capacity(mut self, bars: usize) -> Self {
        self.equity_curve.reserve(bars);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn state(&self) -> PositionState {
        PositionState::from_side(self.account.position_side())
    }

    pub fn rejected_entries(&self) -> usize {
        self.rejected_entries
    }

    /// Apply `signal` at `bar`'s close, then record the bar's equity point.
    pub fn step(&mut self, index: usize, bar: &Bar, signal: Signal) -> Outcome {
        let outcome = self.apply_signal(index, bar, signal);
        self.mark_to_market(bar);
        outcome
    }

    /// Run `signal` through the transition table and execute the result.
    ///
    /// Does not record equity; call [`mark_to_market`](Self::mark_to_market)
    /// exactly once per bar afterwards.
    pub fn apply_signal(&mut self, index: usize, bar: &Bar, signal: Signal) -> Outcome {
        match self.transitions.action(self.state(), signal) {
            Action::Stay => Outcome::Stayed,
            Action::Ignore(reason) => {
                self.ignored_signals += 1;
                tracing::trace!(bar = index, ?signal, ?reason, "signal ignored");
                Outcome::Ignored(reason)
            }
            Action::Open(side) => self.enter(index, bar, side, false),
            Action::Add(side) => self.enter(index, bar, side, true),
            Action::Close(side) => {
                self.exit(index, bar, ExitReason::Signal);
                Outcome::Closed(side)
            }
        }
    }

    /// Close any open position at `bar`'s close, tagged as an end-of-series exit.
    pub fn close_end_of_series(&mut self, index: usize, bar: &Bar) -> Option<&Trade> {
        if self.account.is_flat() {
            return None;
        }
        self.exit(index, bar, ExitReason::EndOfSeries);
        self.ledger.last()
    }

    /// Append the equity point for `bar`: cash plus the position marked at the close.
    pub fn mark_to_market(&mut self, bar: &Bar) {
        if !self.account.is_flat() {
            self.bars_in_position += 1;
        }
        self.equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: self.account.equity(bar.close),
        });
    }

    pub fn finish(self) -> SimulationOutput {
        SimulationOutput {
            account: self.account,
            trades: self.ledger.into_trades(),
            equity_curve: self.equity_curve,
            rejected_entries: self.rejected_entries,
            ignored_signals: self.ignored_signals,
            bars_in_position: self.bars_in_position,
        }
    }

    // ── Entry ──

    /// Cash that may back a new entry. Short proceeds are encumbered by the
    /// open liability, so a short account can only commit its equity.
    fn available_cash(&self, price: f64) -> f64 {
        match &self.account.position {
            Some(p) if p.is_short() => self.account.equity(price),
            _ => self.account.cash,
        }
    }

    fn enter(&mut self, index: usize, bar: &Bar, side: PositionSide, adding: bool) -> Outcome {
        let price = bar.close;
        let available = self.available_cash(price);
        let size = self.config.sizing.size(available, price, &self.cost);
        let fill = self.cost.open(price, size, side);
        // Shorts post full collateral: no leverage.
        let required = fill.executed_price * size + fill.commission;

        if !(size.is_finite() && size > 0.0)
            || required > available * (1.0 + AFFORD_EPSILON) + AFFORD_EPSILON
        {
            self.rejected_entries += 1;
            tracing::warn!(
                bar = index,
                timestamp = %bar.timestamp,
                ?side,
                size,
                required,
                available,
                "entry rejected: insufficient cash"
            );
            return Outcome::Rejected(side);
        }

        self.account.cash += fill.cash_delta();
        if adding {
            self.add_to_position(&fill);
            tracing::debug!(bar = index, ?side, size, price = fill.executed_price, "position increased");
            Outcome::Added(side)
        } else {
            self.account.position = Some(Position {
                side,
                size,
                entry_price: price,
                entry_time: bar.timestamp,
                entry_bar: index,
                entry_cash_flow: fill.cash_flow,
                entry_commission: fill.commission,
                entry_slippage: fill.slippage,
            });
            tracing::debug!(bar = index, ?side, size, price = fill.executed_price, "position opened");
            Outcome::Opened(side)
        }
    }

    fn add_to_position(&mut self, fill: &Fill) {
        if let Some(p) = self.account.position.as_mut() {
            let total = p.size + fill.size;
            p.entry_price = (p.entry_price * p.size + fill.quoted_price * fill.size) / total;
            p.size = total;
            p.entry_cash_flow += fill.cash_flow;
            p.entry_commission += fill.commission;
            p.entry_slippage += fill.slippage;
        }
    }

    // ── Exit ──

    fn exit(&mut self, index: usize, bar: &Bar, reason: ExitReason) {
        let Some(position) = self.account.position.take() else {
            return;
        };
        let price = bar.close;
        let fill = self.cost.close(price, position.size, position.side);
        self.account.cash += fill.cash_delta();

        let net_pnl = match position.side {
            PositionSide::Long => fill.cash_flow - position.entry_cash_flow,
            PositionSide::Short => position.entry_cash_flow - fill.cash_flow,
        };
        let trade = Trade {
            side: position.side,
            entry_bar: position.entry_bar,
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            exit_bar: index,
            exit_time: bar.timestamp,
            exit_price: price,
            exit_reason: reason,
            size: position.size,
            gross_pnl: position.side.sign() * (price - position.entry_price) * position.size,
            commission_paid: position.entry_commission + fill.commission,
            slippage_cost: position.entry_slippage + fill.slippage,
            net_pnl,
            bars_held: index - position.entry_bar,
        };
        tracing::debug!(
            bar = index,
            side = ?trade.side,
            net_pnl = trade.net_pnl,
            ?reason,
            "position closed"
        );
        self.ledger.append(trade);
    }
}
