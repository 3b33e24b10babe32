//! Position state machine.
//!
//! Three states and a fixed transition table:
//!
//! | state | Buy                          | Sell                          | Hold |
//! |-------|------------------------------|-------------------------------|------|
//! | Flat  | open long                    | open short if shorting, else ignore | stay |
//! | Long  | add if pyramiding, else ignore | close                       | stay |
//! | Short | close (cover)                | add if pyramiding, else ignore | stay |
//!
//! The table is pure: it never looks at cash or prices. Whether an entry is
//! affordable is the simulator's concern.

use crate::domain::{PositionSide, Signal};
use serde::{Deserialize, Serialize};

/// Position state of the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionState {
    Flat,
    Long,
    Short,
}

impl PositionState {
    pub fn from_side(side: Option<PositionSide>) -> Self {
        match side {
            None => Self::Flat,
            Some(PositionSide::Long) => Self::Long,
            Some(PositionSide::Short) => Self::Short,
        }
    }

    pub fn side(self) -> Option<PositionSide> {
        match self {
            Self::Flat => None,
            Self::Long => Some(PositionSide::Long),
            Self::Short => Some(PositionSide::Short),
        }
    }
}

/// Why a non-hold signal was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Same-direction signal while in a position, pyramiding off.
    AlreadyPositioned,
    /// Sell while flat, shorting off.
    ShortingDisabled,
}

/// What the simulator must do for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Stay,
    Open(PositionSide),
    Add(PositionSide),
    Close(PositionSide),
    Ignore(IgnoreReason),
}

/// Transition policy flags taken from the run configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionRules {
    pub allow_short: bool,
    pub pyramiding: bool,
}

impl TransitionRules {
    /// Look up the action for `signal` in `state`.
    pub fn action(self, state: PositionState, signal: Signal) -> Action {
        use PositionSide::{Long, Short};
        match (state, signal) {
            (_, Signal::Hold) => Action::Stay,

            (PositionState::Flat, Signal::Buy) => Action::Open(Long),
            (PositionState::Flat, Signal::Sell) if self.allow_short => Action::Open(Short),
            (PositionState::Flat, Signal::Sell) => Action::Ignore(IgnoreReason::ShortingDisabled),

            (PositionState::Long, Signal::Sell) => Action::Close(Long),
            (PositionState::Long, Signal::Buy) if self.pyramiding => Action::Add(Long),
            (PositionState::Long, Signal::Buy) => Action::Ignore(IgnoreReason::AlreadyPositioned),

            (PositionState::Short, Signal::Buy) => Action::Close(Short),
            (PositionState::Short, Signal::Sell) if self.pyramiding => Action::Add(Short),
            (PositionState::Short, Signal::Sell) => {
                Action::Ignore(IgnoreReason::AlreadyPositioned)
            }
        }
    }

    /// State after `action` succeeds.
    pub fn next_state(state: PositionState, action: Action) -> PositionState {
        match action {
            Action::Open(side) | Action::Add(side) => PositionState::from_side(Some(side)),
            Action::Close(_) => PositionState::Flat,
            Action::Stay | Action::Ignore(_) => state,
        }
    }
}
