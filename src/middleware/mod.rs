//! # Middleware
//!
//! Every dispatched update passes through an ordered chain of middlewares
//! wrapped around handler execution.
//!
//! ```text
//! PRE  ── CancelUpdate ──> CANCELLED ──> DONE        (no handler, no post)
//!  │  ── SkipHandler  ──> SKIPPED   ──> POST ──> DONE
//!  └── anything else  ──> EXECUTING ──> POST ──> DONE
//! ```
//!
//! A middleware is either generic (one pre/post pair for every update kind)
//! or update-sensitive: an explicit map from [`UpdateKind`](crate::types::UpdateKind)
//! to the pre/post pair for that kind. Kinds without an entry skip the
//! middleware entirely.

pub mod chain;
pub mod signal;
pub mod traits;
pub mod update_sensitive;

pub use chain::{MiddlewareChain, PreDisposition, PreProcessOutcome};
pub use signal::ControlSignal;
pub use traits::{hooks_fn, FnHooks, Middleware};
pub use update_sensitive::UpdateSensitiveMiddleware;
