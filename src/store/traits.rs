//! Handler store trait definition

use super::record::HandlerRecord;
use crate::error::{DispatchError, Result};
use crate::types::ConversationKey;
use async_trait::async_trait;
use std::sync::Arc;

/// Key-value contract for pending handlers
///
/// Missing keys are never an error. Backends may fail with
/// `DispatchError::BackendUnavailable` on transport faults; those propagate
/// to the caller untouched.
///
/// The default bodies report `NotImplemented`: a backend that forgets to
/// override an operation fails loudly instead of silently dropping handlers.
#[async_trait]
pub trait HandlerStore: Send + Sync {
    /// Append a handler to the conversation's list, creating it if absent
    async fn register(&self, _key: &ConversationKey, _handler: HandlerRecord) -> Result<()> {
        Err(DispatchError::NotImplemented("HandlerStore::register"))
    }

    /// Remove every handler stored for the conversation
    async fn clear(&self, _key: &ConversationKey) -> Result<()> {
        Err(DispatchError::NotImplemented("HandlerStore::clear"))
    }

    /// Return and remove the handlers stored for the conversation
    ///
    /// `Ok(None)` when nothing was registered.
    async fn get(&self, _key: &ConversationKey) -> Result<Option<Vec<HandlerRecord>>> {
        Err(DispatchError::NotImplemented("HandlerStore::get"))
    }

    fn backend_name(&self) -> &'static str;
}

#[async_trait]
impl<T: HandlerStore + ?Sized> HandlerStore for Arc<T> {
    async fn register(&self, key: &ConversationKey, handler: HandlerRecord) -> Result<()> {
        (**self).register(key, handler).await
    }

    async fn clear(&self, key: &ConversationKey) -> Result<()> {
        (**self).clear(key).await
    }

    async fn get(&self, key: &ConversationKey) -> Result<Option<Vec<HandlerRecord>>> {
        (**self).get(key).await
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}
