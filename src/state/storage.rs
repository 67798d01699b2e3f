//! Per-conversation current-state tracking
//!
//! The stored state is the descriptor's qualified name, so it survives
//! serialization and comparison across processes. Each conversation also
//! owns a small JSON data bag that lives as long as its state.

use super::descriptor::StateDescriptor;
use crate::error::Result;
use crate::types::ConversationKey;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[async_trait]
pub trait StateStorage: Send + Sync {
    async fn set_state(&self, key: &ConversationKey, state: &StateDescriptor) -> Result<()>;

    /// Qualified name of the current state, if any
    async fn get_state(&self, key: &ConversationKey) -> Result<Option<String>>;

    /// Drop state and data; returns whether anything was stored
    async fn delete_state(&self, key: &ConversationKey) -> Result<bool>;

    async fn set_data(&self, key: &ConversationKey, field: &str, value: Value) -> Result<()>;

    async fn get_data(&self, key: &ConversationKey) -> Result<Map<String, Value>>;

    async fn reset_data(&self, key: &ConversationKey) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
struct ConversationState {
    state: Option<String>,
    data: Map<String, Value>,
}

#[derive(Debug, Default)]
pub struct MemoryStateStorage {
    conversations: RwLock<HashMap<ConversationKey, ConversationState>>,
}

impl MemoryStateStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStorage for MemoryStateStorage {
    async fn set_state(&self, key: &ConversationKey, state: &StateDescriptor) -> Result<()> {
        self.conversations.write().entry(key.clone()).or_default().state =
            Some(state.qualified_name().to_string());
        Ok(())
    }

    async fn get_state(&self, key: &ConversationKey) -> Result<Option<String>> {
        Ok(self
            .conversations
            .read()
            .get(key)
            .and_then(|conversation| conversation.state.clone()))
    }

    async fn delete_state(&self, key: &ConversationKey) -> Result<bool> {
        Ok(self.conversations.write().remove(key).is_some())
    }

    async fn set_data(&self, key: &ConversationKey, field: &str, value: Value) -> Result<()> {
        self.conversations
            .write()
            .entry(key.clone())
            .or_default()
            .data
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn get_data(&self, key: &ConversationKey) -> Result<Map<String, Value>> {
        Ok(self
            .conversations
            .read()
            .get(key)
            .map(|conversation| conversation.data.clone())
            .unwrap_or_default())
    }

    async fn reset_data(&self, key: &ConversationKey) -> Result<()> {
        if let Some(conversation) = self.conversations.write().get_mut(key) {
            conversation.data.clear();
        }
        Ok(())
    }
}
