//! # Dispatch
//!
//! The per-update pipeline: middleware pre-processing, next-step and reply
//! handlers, regular handlers, post-processing and deferred store updates.

pub mod context;
pub mod exception;
pub(crate) mod guard;
pub mod handler;
pub mod pipeline;
pub mod registry;
pub mod state;

pub use context::{DispatchContext, StoreMutation};
pub use exception::ExceptionHandler;
pub use handler::{
    handler_fn, step_fn, FnHandler, FnStepCallback, Handler, HandlerSpec, StepCallback,
};
pub use pipeline::{DispatchReport, Dispatcher, DispatcherBuilder};
pub use registry::CallbackRegistry;
pub use state::DispatchState;
