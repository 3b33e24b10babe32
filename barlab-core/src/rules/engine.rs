//! Rule interpreter and first-match-wins rule engine.

use super::{Comparison, Condition, Rule, TrendDirection};
use crate::domain::{BarRow, BarSeries, Field, Signal};
use crate::strategy::{require, SignalError, SignalSource};

/// Evaluate one condition against `row`.
///
/// Referenced columns are resolved before any history guard, so a missing
/// column is reported even on the first bar where a crossover could not fire
/// anyway. `rule` names the owning rule in errors.
pub fn evaluate_condition(
    condition: &Condition,
    row: &BarRow<'_>,
    rule: &str,
) -> Result<bool, SignalError> {
    match condition {
        Condition::Threshold {
            field,
            op,
            value,
            tolerance,
        } => {
            let current = require(row, field, rule)?;
            Ok(op.apply(current, *value, *tolerance))
        }
        Condition::Compare {
            left,
            op,
            right,
            tolerance,
        } => {
            let l = require(row, left, rule)?;
            let r = require(row, right, rule)?;
            Ok(op.apply(l, r, *tolerance))
        }
        Condition::CrossAbove { fast, slow } => crossed(row, fast, slow, rule, true),
        Condition::CrossBelow { fast, slow } => crossed(row, fast, slow, rule, false),
        Condition::VolumeSpike {
            multiplier,
            baseline,
        } => {
            let index = row.index();
            if index < *baseline {
                return Ok(false);
            }
            let history = row.history();
            let window = &history[index - baseline..index];
            let mean = window.iter().map(|b| b.volume).sum::<f64>() / *baseline as f64;
            Ok(Comparison::Gt.apply(row.bar().volume, mean * multiplier, 0.0))
        }
        Condition::Trend {
            lookback,
            direction,
        } => {
            let index = row.index();
            if index < *lookback {
                return Ok(false);
            }
            let then = row.history()[index - lookback].close;
            let now = row.bar().close;
            Ok(match direction {
                TrendDirection::Up => now > then,
                TrendDirection::Down => now < then,
            })
        }
        Condition::All { conditions } => {
            for c in conditions {
                if !evaluate_condition(c, row, rule)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Any { conditions } => {
            for c in conditions {
                if evaluate_condition(c, row, rule)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn crossed(
    row: &BarRow<'_>,
    fast: &Field,
    slow: &Field,
    rule: &str,
    above: bool,
) -> Result<bool, SignalError> {
    let fast_now = require(row, fast, rule)?;
    let slow_now = require(row, slow, rule)?;
    let Some(prev) = row.previous() else {
        return Ok(false);
    };
    let fast_prev = require(&prev, fast, rule)?;
    let slow_prev = require(&prev, slow, rule)?;

    let values = [fast_now, slow_now, fast_prev, slow_prev];
    if values.iter().any(|v| v.is_nan()) {
        return Ok(false);
    }
    Ok(if above {
        fast_prev <= slow_prev && fast_now > slow_now
    } else {
        fast_prev >= slow_prev && fast_now < slow_now
    })
}

/// Ordered rule set resolved to one signal per bar.
///
/// Rules are tried in order; the first whose condition holds decides the
/// signal and later rules are not evaluated. No match means `Hold`.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    /// Build an engine, rejecting rules with invalid parameters.
    pub fn new(rules: Vec<Rule>) -> Result<Self, SignalError> {
        for rule in &rules {
            if let Some(reason) = rule.when.problem() {
                return Err(SignalError::InvalidRule {
                    rule: rule.name.clone(),
                    reason,
                });
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Human-readable description of every rule, in priority order.
    pub fn describe(&self) -> Vec<String> {
        self.rules.iter().map(Rule::to_string).collect()
    }

    /// Fail if any rule reads a column the series does not carry.
    pub fn check_columns(&self, series: &BarSeries) -> Result<(), SignalError> {
        for rule in &self.rules {
            for field in rule.when.fields() {
                if !series.has_field(field) {
                    return Err(SignalError::MissingColumn {
                        source_name: rule.name.clone(),
                        column: field.to_string(),
                        index: 0,
                    });
                }
            }
        }
        Ok(())
    }

    /// The first rule that fires on `row`, if any.
    pub fn first_match(&self, row: &BarRow<'_>) -> Result<Option<&Rule>, SignalError> {
        for rule in &self.rules {
            if evaluate_condition(&rule.when, row, &rule.name)? {
                return Ok(Some(rule));
            }
        }
        Ok(None)
    }

    /// Resolve `row` to a signal.
    pub fn evaluate(&self, row: &BarRow<'_>) -> Result<Signal, SignalError> {
        match self.first_match(row)? {
            Some(rule) => {
                tracing::trace!(rule = %rule.name, bar = row.index(), signal = ?rule.signal, "rule fired");
                Ok(rule.signal)
            }
            None => Ok(Signal::Hold),
        }
    }
}

impl SignalSource for RuleEngine {
    fn name(&self) -> &str {
        "rules"
    }

    fn prepare(&mut self, series: &BarSeries) -> Result<(), SignalError> {
        self.check_columns(series)
    }

    fn signal(&mut self, row: &BarRow<'_>) -> Result<Signal, SignalError> {
        self.evaluate(row)
    }
}
