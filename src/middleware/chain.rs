//! Ordered middleware pipeline

use super::signal::ControlSignal;
use super::traits::Middleware;
use super::update_sensitive::UpdateSensitiveMiddleware;
use crate::dispatcher::guard::guarded;
use crate::dispatcher::DispatchContext;
use crate::error::{DispatchError, HandlerError};
use crate::logging::log_error;
use crate::types::Update;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
enum ChainEntry {
    Generic(Arc<dyn Middleware>),
    UpdateSensitive(UpdateSensitiveMiddleware),
}

impl ChainEntry {
    fn name(&self) -> &str {
        match self {
            Self::Generic(middleware) => middleware.name(),
            Self::UpdateSensitive(middleware) => middleware.name(),
        }
    }

    fn hooks_for(&self, update: &Update) -> Option<&Arc<dyn Middleware>> {
        match self {
            Self::Generic(middleware) => Some(middleware),
            Self::UpdateSensitive(middleware) => middleware.hooks_for(&update.kind),
        }
    }
}

/// How dispatch continues after the pre-process phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreDisposition {
    Proceed,
    Skip,
    Cancel,
}

/// Result of running every `pre_process` hook for one update
#[derive(Debug)]
pub struct PreProcessOutcome {
    pub disposition: PreDisposition,
    /// Chain positions whose `pre_process` completed, in order
    pub completed: Vec<usize>,
    /// Error raised by a `pre_process` hook; handlers are skipped when set
    pub error: Option<HandlerError>,
}

/// Middlewares in registration order
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    entries: Vec<ChainEntry>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.entries.push(ChainEntry::Generic(middleware));
    }

    pub fn push_update_sensitive(&mut self, middleware: UpdateSensitiveMiddleware) {
        self.entries.push(ChainEntry::UpdateSensitive(middleware));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(ChainEntry::name).collect()
    }

    /// Run `pre_process` hooks in registration order
    ///
    /// `CancelUpdate` stops immediately. `SkipHandler` is remembered and the
    /// remaining hooks still run. A failing hook stops the phase; its error
    /// becomes the update's exception and handlers are skipped.
    pub async fn run_pre(
        &self,
        update: &Update,
        context: &mut DispatchContext,
    ) -> PreProcessOutcome {
        let mut skip = false;
        let mut completed = Vec::with_capacity(self.entries.len());

        for (position, entry) in self.entries.iter().enumerate() {
            let Some(hooks) = entry.hooks_for(update) else {
                debug!(
                    middleware = entry.name(),
                    update_kind = %update.kind,
                    "Middleware has no hooks for update kind, skipping"
                );
                continue;
            };

            match guarded(hooks.pre_process(update, context)).await {
                Ok(Some(ControlSignal::CancelUpdate)) => {
                    debug!(middleware = entry.name(), "Update cancelled by middleware");
                    return PreProcessOutcome {
                        disposition: PreDisposition::Cancel,
                        completed,
                        error: None,
                    };
                }
                Ok(Some(ControlSignal::SkipHandler)) => {
                    debug!(middleware = entry.name(), "Handler skipped by middleware");
                    skip = true;
                    completed.push(position);
                }
                Ok(Some(ControlSignal::ContinueHandling)) | Ok(None) => {
                    completed.push(position);
                }
                Err(error) => {
                    warn!(middleware = entry.name(), error = %error, "pre_process failed");
                    return PreProcessOutcome {
                        disposition: PreDisposition::Skip,
                        completed,
                        error: Some(error),
                    };
                }
            }
        }

        PreProcessOutcome {
            disposition: if skip {
                PreDisposition::Skip
            } else {
                PreDisposition::Proceed
            },
            completed,
            error: None,
        }
    }

    /// Run `post_process` for the given chain positions in registration order
    ///
    /// Errors never propagate; each is logged and returned as a
    /// `MiddlewareContract` violation.
    pub async fn run_post(
        &self,
        update: &Update,
        context: &mut DispatchContext,
        completed: &[usize],
        exception: Option<&HandlerError>,
    ) -> Vec<DispatchError> {
        let mut violations = Vec::new();

        for &position in completed {
            let Some(entry) = self.entries.get(position) else {
                continue;
            };
            let Some(hooks) = entry.hooks_for(update) else {
                continue;
            };

            if let Err(error) = guarded(hooks.post_process(update, context, exception)).await {
                log_error(
                    "middleware",
                    "post_process",
                    &error.to_string(),
                    Some(entry.name()),
                );
                violations.push(DispatchError::middleware_contract(
                    entry.name(),
                    format!("post_process failed: {error}"),
                ));
            }
        }

        violations
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("middlewares", &self.names())
            .finish()
    }
}
