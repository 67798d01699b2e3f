#![allow(clippy::doc_markdown)] // Allow technical terms like Redis, DashMap in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Chatbot Core
//!
//! Event-dispatch core for chat-bot frameworks.
//!
//! ## Overview
//!
//! Inbound updates from a messaging transport are routed through an ordered
//! middleware chain and on to registered handlers. Conversations can park a
//! "next step" handler that fires exactly once for the conversation's next
//! update, or a reply handler that fires when someone replies to a given
//! message. Pending handlers live in a pluggable [`store::HandlerStore`]
//! (process memory or Redis).
//!
//! ## Module Organization
//!
//! - [`dispatcher`] - Dispatch pipeline, handlers and per-update context
//! - [`middleware`] - Middleware chain and control signals
//! - [`store`] - Pending-handler stores (memory, remote, Redis)
//! - [`state`] - Conversation state groups and state storage
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//! - [`types`] - Updates and conversation keys
//!
//! ## Quick Start
//!
//! ```rust
//! use chatbot_core::dispatcher::{handler_fn, DispatchContext, Dispatcher, HandlerSpec};
//! use chatbot_core::types::Update;
//! use serde_json::json;
//!
//! # async fn example() -> chatbot_core::Result<()> {
//! let dispatcher = Dispatcher::builder()
//!     .handler(
//!         HandlerSpec::new(
//!             "start",
//!             handler_fn(|_: &Update, context: &mut DispatchContext| {
//!                 context.insert("greeted", json!(true));
//!                 Ok(None)
//!             }),
//!         )
//!         .commands(["start"]),
//!     )
//!     .build()?;
//!
//! let report = dispatcher
//!     .dispatch(&Update::new("text", 42, json!({ "text": "/start" })))
//!     .await;
//! assert_eq!(report.handlers_run, vec!["start"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib                        # Unit tests
//! cargo test                              # All tests
//! cargo test --features test-services     # Include tests against a live Redis
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod state;
pub mod store;
pub mod types;

pub use config::{DispatcherConfig, RedisStoreConfig, StoreBackend};
pub use dispatcher::{
    handler_fn, step_fn, DispatchContext, DispatchReport, DispatchState, Dispatcher,
    DispatcherBuilder, Handler, HandlerSpec, StepCallback,
};
pub use error::{DispatchError, HandlerError, HandlerResult, Result};
pub use logging::init_structured_logging;
pub use middleware::{ControlSignal, Middleware, MiddlewareChain, UpdateSensitiveMiddleware};
pub use state::{MemoryStateStorage, StateDescriptor, StateGroup, StateStorage};
pub use store::{HandlerRecord, HandlerStore, MemoryHandlerStore};
pub use types::{ConversationKey, Update, UpdateKind};
