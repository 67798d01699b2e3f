use serde::{Deserialize, Serialize};
use std::fmt;

/// Phases an update moves through while being dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// Running `pre_process` hooks
    Pre,
    /// A middleware asked to skip handlers
    Skipped,
    /// A middleware cancelled the update
    Cancelled,
    /// Running next-step, reply and regular handlers
    Executing,
    /// Running `post_process` hooks
    Post,
    Done,
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: DispatchState) -> bool {
        matches!(
            (self, next),
            (Self::Pre, Self::Skipped | Self::Cancelled | Self::Executing)
                | (Self::Skipped | Self::Executing, Self::Post)
                | (Self::Cancelled | Self::Post, Self::Done)
        )
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => write!(f, "pre"),
            Self::Skipped => write!(f, "skipped"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Executing => write!(f, "executing"),
            Self::Post => write!(f, "post"),
            Self::Done => write!(f, "done"),
        }
    }
}
