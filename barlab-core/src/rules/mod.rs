//! Declarative trading rules.
//!
//! A rule pairs a [`Condition`] with the [`Signal`] it emits. Conditions are a
//! tagged variant (`kind` + parameters) so rule sets round-trip through TOML or
//! JSON unchanged:
//!
//! ```toml
//! [[rules]]
//! name = "oversold"
//! signal = "buy"
//! when = { kind = "threshold", field = "rsi", op = "lt", value = 30.0 }
//! ```
//!
//! Evaluation lives in [`engine`]: a single interpreter over the variants and
//! a first-match-wins [`RuleEngine`].

pub mod engine;

pub use engine::{evaluate_condition, RuleEngine};

use crate::domain::{Field, Signal};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Absolute tolerance used by [`Comparison::Eq`] when none is given.
pub const DEFAULT_EQ_TOLERANCE: f64 = 0.01;

/// Binary comparison between two numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl Comparison {
    /// Apply the comparison. Any NaN operand yields `false`.
    pub fn apply(self, left: f64, right: f64, tolerance: f64) -> bool {
        if left.is_nan() || right.is_nan() {
            return false;
        }
        match self {
            Self::Gt => left > right,
            Self::Ge => left >= right,
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Eq => (left - right).abs() < tolerance,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
        }
    }
}

/// Direction for [`Condition::Trend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
}

/// A boolean predicate over a row and the rows before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// `field op value`.
    Threshold {
        field: Field,
        op: Comparison,
        value: f64,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
    },
    /// `left op right`, both read from the same row.
    Compare {
        left: Field,
        op: Comparison,
        right: Field,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
    },
    /// `fast` was at or below `slow` on the previous row and is above it now.
    CrossAbove { fast: Field, slow: Field },
    /// `fast` was at or above `slow` on the previous row and is below it now.
    CrossBelow { fast: Field, slow: Field },
    /// Volume exceeds `multiplier` times the mean volume of the previous
    /// `baseline` bars.
    VolumeSpike { multiplier: f64, baseline: usize },
    /// Close now versus close `lookback` bars ago.
    Trend {
        lookback: usize,
        direction: TrendDirection,
    },
    /// Every nested condition holds.
    All { conditions: Vec<Condition> },
    /// At least one nested condition holds.
    Any { conditions: Vec<Condition> },
}

fn default_tolerance() -> f64 {
    DEFAULT_EQ_TOLERANCE
}

impl Condition {
    /// Every field this condition reads, nested conditions included.
    pub fn fields(&self) -> Vec<&Field> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a Field>) {
        match self {
            Self::Threshold { field, .. } => out.push(field),
            Self::Compare { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            Self::CrossAbove { fast, slow } | Self::CrossBelow { fast, slow } => {
                out.push(fast);
                out.push(slow);
            }
            Self::VolumeSpike { .. } | Self::Trend { .. } => {}
            Self::All { conditions } | Self::Any { conditions } => {
                for c in conditions {
                    c.collect_fields(out);
                }
            }
        }
    }

    /// Parameter problems, if any. Checked once when a rule set is built.
    pub fn problem(&self) -> Option<String> {
        match self {
            Self::Threshold { value, tolerance, .. } => {
                if !value.is_finite() {
                    return Some(format!("threshold value must be finite, got {value}"));
                }
                if !(*tolerance >= 0.0) {
                    return Some(format!("tolerance must be >= 0, got {tolerance}"));
                }
                None
            }
            Self::Compare { tolerance, .. } => {
                (!(*tolerance >= 0.0)).then(|| format!("tolerance must be >= 0, got {tolerance}"))
            }
            Self::CrossAbove { fast, slow } | Self::CrossBelow { fast, slow } => {
                (fast == slow).then(|| format!("cross compares '{fast}' with itself"))
            }
            Self::VolumeSpike {
                multiplier,
                baseline,
            } => {
                if *baseline == 0 {
                    return Some("volume_spike baseline must be > 0".to_string());
                }
                if !(multiplier.is_finite() && *multiplier > 0.0) {
                    return Some(format!("volume_spike multiplier must be > 0, got {multiplier}"));
                }
                None
            }
            Self::Trend { lookback, .. } => {
                (*lookback == 0).then(|| "trend lookback must be > 0".to_string())
            }
            Self::All { conditions } | Self::Any { conditions } => {
                if conditions.is_empty() {
                    return Some("combinator has no conditions".to_string());
                }
                conditions.iter().find_map(Condition::problem)
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Threshold {
                field, op, value, ..
            } => write!(f, "{field} {} {value}", op.symbol()),
            Self::Compare {
                left, op, right, ..
            } => write!(f, "{left} {} {right}", op.symbol()),
            Self::CrossAbove { fast, slow } => write!(f, "{fast} crosses above {slow}"),
            Self::CrossBelow { fast, slow } => write!(f, "{fast} crosses below {slow}"),
            Self::VolumeSpike {
                multiplier,
                baseline,
            } => write!(f, "volume > {multiplier}x avg({baseline})"),
            Self::Trend {
                lookback,
                direction,
            } => {
                let word = match direction {
                    TrendDirection::Up => "up",
                    TrendDirection::Down => "down",
                };
                write!(f, "trend {word} over {lookback} bars")
            }
            Self::All { conditions } => join(f, conditions, " AND "),
            Self::Any { conditions } => join(f, conditions, " OR "),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, conditions: &[Condition], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, c) in conditions.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{c}")?;
    }
    f.write_str(")")
}

/// A named condition and the signal emitted when it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub when: Condition,
    pub signal: Signal,
}

impl Rule {
    pub fn new(name: impl Into<String>, when: Condition, signal: Signal) -> Self {
        Self {
            name: name.into(),
            when,
            signal,
        }
    }

    /// `field op value` rule.
    pub fn threshold(
        name: impl Into<String>,
        field: impl Into<Field>,
        op: Comparison,
        value: f64,
        signal: Signal,
    ) -> Self {
        Self::new(
            name,
            Condition::Threshold {
                field: field.into(),
                op,
                value,
                tolerance: DEFAULT_EQ_TOLERANCE,
            },
            signal,
        )
    }

    /// Crossover rule: `fast` crossing above (`up == true`) or below `slow`.
    pub fn cross(
        name: impl Into<String>,
        fast: impl Into<Field>,
        slow: impl Into<Field>,
        up: bool,
        signal: Signal,
    ) -> Self {
        let (fast, slow) = (fast.into(), slow.into());
        let when = if up {
            Condition::CrossAbove { fast, slow }
        } else {
            Condition::CrossBelow { fast, slow }
        };
        Self::new(name, when, signal)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signal = match self.signal {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        };
        write!(f, "{}: {} -> {signal}", self.name, self.when)
    }
}
