//! In-memory handler store
//!
//! Process-local; state is lost on restart. Each operation locks a single
//! DashMap shard, so per-key operations are individually atomic, but a
//! sequence such as `get` followed by `register` is not transactional.

use super::record::HandlerRecord;
use super::traits::HandlerStore;
use crate::error::Result;
use crate::logging::log_store_operation;
use crate::types::ConversationKey;
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct MemoryHandlerStore {
    handlers: DashMap<ConversationKey, Vec<HandlerRecord>>,
}

impl MemoryHandlerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, e.g. with handlers restored from elsewhere
    pub fn with_handlers(
        handlers: impl IntoIterator<Item = (ConversationKey, Vec<HandlerRecord>)>,
    ) -> Self {
        Self {
            handlers: handlers.into_iter().collect(),
        }
    }

    /// Number of conversations with pending handlers
    pub fn conversation_count(&self) -> usize {
        self.handlers.len()
    }

    /// Handlers pending for a key, without consuming them
    pub fn peek(&self, key: &ConversationKey) -> Option<Vec<HandlerRecord>> {
        self.handlers.get(key).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl HandlerStore for MemoryHandlerStore {
    async fn register(&self, key: &ConversationKey, handler: HandlerRecord) -> Result<()> {
        let count = {
            let mut entry = self.handlers.entry(key.clone()).or_default();
            entry.push(handler);
            entry.len()
        };
        log_store_operation("register", "memory", &key.to_string(), "ok", Some(count));
        Ok(())
    }

    async fn clear(&self, key: &ConversationKey) -> Result<()> {
        let removed = self.handlers.remove(key).map(|(_, handlers)| handlers.len());
        log_store_operation("clear", "memory", &key.to_string(), "ok", removed);
        Ok(())
    }

    async fn get(&self, key: &ConversationKey) -> Result<Option<Vec<HandlerRecord>>> {
        let handlers = self.handlers.remove(key).map(|(_, handlers)| handlers);
        log_store_operation(
            "get",
            "memory",
            &key.to_string(),
            if handlers.is_some() { "hit" } else { "miss" },
            handlers.as_ref().map(Vec::len),
        );
        Ok(handlers)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
