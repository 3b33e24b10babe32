//! Integration tests for the replay loop.
//!
//! Tests:
//! 1. Reference scenarios: single bar, one round trip, repeated buy
//! 2. Rule-driven and strategy-driven runs produce the same trades
//! 3. End-of-series policies and the conflict policy
//! 4. Data-integrity and configuration failures abort before any bar

use barlab_core::domain::{Bar, BarSeries, ExitReason, PositionSide, Signal};
use barlab_core::engine::{
    replay, EndOfSeriesPolicy, ReplayOutput, RunConfig, SizingPolicy,
};
use barlab_core::rules::{Comparison, Rule, RuleEngine};
use barlab_core::strategy::{
    ConflictPolicy, FeatureCross, PrecomputedSignals, SignalError, StrategySignals,
};
use barlab_core::BacktestError;
use chrono::{Duration, TimeZone, Utc};

/// Helper: one bar per day at the given closes.
fn bars(closes: &[f64]) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::new(start + Duration::days(i as i64), c, c + 1.0, c - 1.0, c, 1_000.0))
        .collect()
}

fn with_signals(closes: &[f64], signals: &[Signal]) -> BarSeries {
    BarSeries::new(bars(closes))
        .unwrap()
        .with_signals(signals.to_vec())
        .unwrap()
}

fn one_unit(commission_rate: f64) -> RunConfig {
    RunConfig {
        initial_balance: 10_000.0,
        commission_rate,
        slippage_rate: 0.0,
        sizing: SizingPolicy::fixed_units(1.0),
        ..RunConfig::default()
    }
}

fn run(series: &BarSeries, config: &RunConfig) -> ReplayOutput {
    replay(series, &mut PrecomputedSignals, config).unwrap()
}

// ── 1. Reference scenarios ──────────────────────────────────────────

#[test]
fn single_bar_no_signal() {
    let series = with_signals(&[100.0], &[Signal::Hold]);
    let out = run(&series, &RunConfig::default());
    assert!(out.trades.is_empty());
    assert_eq!(out.final_balance(), 10_000.0);
    assert_eq!(out.equity_curve.len(), 1);
}

#[test]
fn buy_100_sell_110_with_commission() {
    use Signal::{Buy, Sell};
    let series = with_signals(&[100.0, 110.0], &[Buy, Sell]);
    let out = run(&series, &one_unit(0.001));

    assert_eq!(out.trades.len(), 1);
    let trade = &out.trades[0];
    assert_eq!(trade.side, PositionSide::Long);
    assert_eq!(trade.entry_price, 100.0);
    assert_eq!(trade.exit_price, 110.0);
    assert!((trade.net_pnl - 9.79).abs() < 1e-9);
    assert!((trade.gross_pnl - 10.0).abs() < 1e-9);
    assert!((out.final_balance() - 10_009.79).abs() < 1e-9);
    assert_eq!(out.final_balance(), out.equity_curve.last().unwrap().equity);
}

#[test]
fn buy_while_long_is_a_no_op() {
    use Signal::{Buy, Hold};
    let once = run(&with_signals(&[100.0, 101.0, 102.0], &[Buy, Hold, Hold]), &one_unit(0.001));
    let twice = run(&with_signals(&[100.0, 101.0, 102.0], &[Buy, Buy, Hold]), &one_unit(0.001));

    assert_eq!(once.final_account, twice.final_account);
    assert_eq!(once.equity_curve, twice.equity_curve);
    assert!(twice.trades.is_empty());
    assert_eq!(twice.ignored_signals, 1);
}

#[test]
fn sell_while_flat_without_shorting_is_ignored() {
    use Signal::{Hold, Sell};
    let out = run(&with_signals(&[100.0, 90.0], &[Sell, Hold]), &one_unit(0.0));
    assert!(out.trades.is_empty());
    assert!(out.final_account.is_flat());
    assert_eq!(out.final_balance(), 10_000.0);
}

#[test]
fn short_round_trip_when_enabled() {
    use Signal::{Buy, Sell};
    let config = RunConfig {
        allow_short: true,
        ..one_unit(0.001)
    };
    let out = run(&with_signals(&[100.0, 90.0], &[Sell, Buy]), &config);
    assert_eq!(out.trades.len(), 1);
    let trade = &out.trades[0];
    assert_eq!(trade.side, PositionSide::Short);
    // entry proceeds 100 - 0.1, cover cost 90 + 0.09
    assert!((trade.net_pnl - (99.9 - 90.09)).abs() < 1e-9);
}

// ── 2. Signal source agnosticism ────────────────────────────────────

#[test]
fn rules_and_strategy_agree_on_crossovers() {
    let closes = [100.0, 101.0, 103.0, 102.0, 99.0, 98.0, 101.0, 104.0];
    let fast = vec![100.0, 100.5, 102.0, 102.5, 100.5, 98.5, 99.5, 102.5];
    let slow = vec![101.0, 101.0, 101.0, 101.0, 101.0, 101.0, 101.0, 101.0];
    let series = BarSeries::new(bars(&closes))
        .unwrap()
        .with_feature("sma_2", fast)
        .unwrap()
        .with_feature("sma_5", slow)
        .unwrap();
    let config = one_unit(0.001);

    let mut rules = RuleEngine::new(vec![
        Rule::cross("golden", "sma_2", "sma_5", true, Signal::Buy),
        Rule::cross("death", "sma_2", "sma_5", false, Signal::Sell),
    ])
    .unwrap();
    let by_rules = replay(&series, &mut rules, &config).unwrap();

    let mut strategy = StrategySignals::new(FeatureCross::sma(2, 5), ConflictPolicy::default());
    let by_strategy = replay(&series, &mut strategy, &config).unwrap();

    assert_eq!(by_rules.trades, by_strategy.trades);
    assert_eq!(by_rules.equity_curve, by_strategy.equity_curve);
    assert_eq!(by_rules.trades.len(), 1);
    assert_eq!(by_rules.trades[0].entry_bar, 2);
    assert_eq!(by_rules.trades[0].exit_bar, 4);
}

// ── 3. Policies ─────────────────────────────────────────────────────

#[test]
fn end_of_series_policies_differ_only_in_realization() {
    use Signal::{Buy, Hold};
    let series = with_signals(&[100.0, 105.0, 120.0], &[Buy, Hold, Hold]);

    let mtm = run(&series, &one_unit(0.001));
    assert!(mtm.trades.is_empty());
    assert_eq!(mtm.config.end_of_series, EndOfSeriesPolicy::MarkToMarket);

    let forced = run(
        &series,
        &RunConfig {
            end_of_series: EndOfSeriesPolicy::ForceClose,
            ..one_unit(0.001)
        },
    );
    assert_eq!(forced.trades.len(), 1);
    assert_eq!(forced.trades[0].exit_reason, ExitReason::EndOfSeries);
    assert_eq!(forced.trades[0].exit_bar, 2);
    // Force close pays the exit commission that mark-to-market does not.
    assert!((mtm.final_balance() - forced.final_balance() - 0.12).abs() < 1e-9);
    assert_eq!(forced.config.end_of_series, EndOfSeriesPolicy::ForceClose);
}

#[test]
fn conflict_policy_decides_simultaneous_answers() {
    struct Both;
    impl barlab_core::strategy::Strategy for Both {
        fn name(&self) -> &str {
            "both"
        }
        fn should_buy(&mut self, _: &barlab_core::domain::BarRow<'_>) -> Result<bool, SignalError> {
            Ok(true)
        }
        fn should_sell(&mut self, _: &barlab_core::domain::BarRow<'_>) -> Result<bool, SignalError> {
            Ok(true)
        }
    }

    let series = BarSeries::new(bars(&[100.0, 101.0])).unwrap();

    let mut prefer_buy = StrategySignals::new(Both, ConflictPolicy::PreferBuy);
    let out = replay(&series, &mut prefer_buy, &one_unit(0.0)).unwrap();
    assert!(!out.final_account.is_flat());

    let mut prefer_sell = StrategySignals::new(Both, ConflictPolicy::PreferSell);
    let out = replay(&series, &mut prefer_sell, &one_unit(0.0)).unwrap();
    assert!(out.final_account.is_flat());
    assert_eq!(out.signal_stats.sell_signals, 2);
}

#[test]
fn fixed_fraction_sizes_from_cash() {
    use Signal::{Buy, Sell};
    let config = RunConfig {
        sizing: SizingPolicy::fixed_fraction(0.5),
        ..RunConfig::frictionless(10_000.0)
    };
    let out = run(&with_signals(&[100.0, 110.0], &[Buy, Sell]), &config);
    assert!((out.trades[0].size - 50.0).abs() < 1e-9);
    assert!((out.final_balance() - 10_500.0).abs() < 1e-9);
}

// ── 4. Failures ─────────────────────────────────────────────────────

#[test]
fn missing_rule_column_aborts_before_first_bar() {
    let series = BarSeries::new(bars(&[100.0, 101.0])).unwrap();
    let mut rules = RuleEngine::new(vec![Rule::threshold(
        "oversold",
        "rsi",
        Comparison::Lt,
        30.0,
        Signal::Buy,
    )])
    .unwrap();
    let err = replay(&series, &mut rules, &RunConfig::default()).unwrap_err();
    assert!(err.is_data_integrity());
    assert!(err.to_string().contains("rsi"));
}

#[test]
fn invalid_configuration_aborts() {
    let series = with_signals(&[100.0], &[Signal::Hold]);
    let config = RunConfig {
        slippage_rate: -0.01,
        ..RunConfig::default()
    };
    let err = replay(&series, &mut PrecomputedSignals, &config).unwrap_err();
    assert!(matches!(err, BacktestError::Config(_)));
}

#[test]
fn duplicate_timestamps_never_reach_the_engine() {
    let mut b = bars(&[100.0, 101.0]);
    b[1].timestamp = b[0].timestamp;
    let err: BacktestError = BarSeries::new(b).unwrap_err().into();
    assert!(err.is_data_integrity());
}
