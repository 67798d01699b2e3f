//! Middleware with per-update-kind hooks

use super::traits::Middleware;
use crate::types::UpdateKind;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Explicit mapping from update kind to the pre/post pair handling it
///
/// ```rust
/// use chatbot_core::middleware::{hooks_fn, UpdateSensitiveMiddleware};
/// use chatbot_core::types::UpdateKind;
///
/// let audit = UpdateSensitiveMiddleware::new("audit").on(
///     UpdateKind::message(),
///     hooks_fn("audit_message", |_, _| Ok(None), |_, _, _| Ok(())),
/// );
/// assert!(audit.handles(&UpdateKind::message()));
/// assert!(!audit.handles(&UpdateKind::new("sticker")));
/// ```
#[derive(Clone)]
pub struct UpdateSensitiveMiddleware {
    name: String,
    hooks: HashMap<UpdateKind, Arc<dyn Middleware>>,
}

impl UpdateSensitiveMiddleware {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: HashMap::new(),
        }
    }

    /// Register the hooks for one update kind, replacing any previous pair
    pub fn on(mut self, kind: impl Into<UpdateKind>, hooks: impl Middleware + 'static) -> Self {
        self.hooks.insert(kind.into(), Arc::new(hooks));
        self
    }

    pub fn on_shared(mut self, kind: impl Into<UpdateKind>, hooks: Arc<dyn Middleware>) -> Self {
        self.hooks.insert(kind.into(), hooks);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Update kinds this middleware has hooks for
    pub fn update_types(&self) -> BTreeSet<UpdateKind> {
        self.hooks.keys().cloned().collect()
    }

    pub fn handles(&self, kind: &UpdateKind) -> bool {
        self.hooks.contains_key(kind)
    }

    pub(crate) fn hooks_for(&self, kind: &UpdateKind) -> Option<&Arc<dyn Middleware>> {
        self.hooks.get(kind)
    }
}

impl std::fmt::Debug for UpdateSensitiveMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateSensitiveMiddleware")
            .field("name", &self.name)
            .field("update_types", &self.update_types())
            .finish()
    }
}
