//! # Error Handling
//!
//! Library-level errors surface to the integrator immediately. Per-update
//! faults raised by handlers are carried as [`HandlerError`] into
//! `post_process` instead of crashing the dispatch loop.

use thiserror::Error;

/// Errors raised by stores, configuration and the dispatcher itself
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Invalid construction parameters or a backend that was not compiled in
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A network call to the remote store failed
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Handler payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An abstract store operation was called on an incomplete implementation
    #[error("Operation not implemented: {0}")]
    NotImplemented(&'static str),

    /// A middleware hook failed where it is not allowed to abort dispatch
    #[error("Middleware '{middleware}' violated its contract: {reason}")]
    MiddlewareContract { middleware: String, reason: String },
}

impl DispatchError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable(message.into())
    }

    pub fn middleware_contract(middleware: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MiddlewareContract {
            middleware: middleware.into(),
            reason: reason.into(),
        }
    }

    /// Whether a caller-side retry could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for DispatchError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(feature = "redis-store")]
impl From<redis::RedisError> for DispatchError {
    fn from(err: redis::RedisError) -> Self {
        Self::BackendUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// Fault raised while executing a handler for a single update
pub type HandlerError = anyhow::Error;

/// Result returned by handlers and middleware hooks
pub type HandlerResult<T = ()> = std::result::Result<T, HandlerError>;
