use serde::{Deserialize, Serialize};
use std::fmt;

/// Stateless markers returned by middlewares and handlers to alter dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSignal {
    /// From `pre_process`: skip handlers, still run every `post_process`
    SkipHandler,
    /// From `pre_process`: abort the update, no handler and no `post_process`
    CancelUpdate,
    /// From a handler: keep matching the next eligible handler
    ContinueHandling,
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkipHandler => write!(f, "skip_handler"),
            Self::CancelUpdate => write!(f, "cancel_update"),
            Self::ContinueHandling => write!(f, "continue_handling"),
        }
    }
}
