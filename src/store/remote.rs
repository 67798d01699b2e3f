//! Handler store over a networked key-value cache
//!
//! Keys are namespaced as `prefix:conversation_key` (string keys quoted so
//! they never collide with integer keys); values are the JSON
//! encoded handler list (see [`super::codec`]).

use super::codec::{decode_records, encode_records};
use super::record::HandlerRecord;
use super::traits::HandlerStore;
use crate::error::Result;
use crate::logging::log_store_operation;
use crate::types::ConversationKey;
use async_trait::async_trait;
use tracing::debug;

/// Byte-level operations a remote cache must offer
///
/// Each call is one round trip. Errors are returned as-is; no retry happens
/// at this layer.
#[async_trait]
pub trait RemoteCache: Send + Sync {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set_bytes(&self, key: &str, value: &[u8]) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn health_check(&self) -> Result<bool>;

    fn provider_name(&self) -> &'static str;
}

/// Handler store backed by a [`RemoteCache`]
///
/// `register` reads the current list, appends and writes the whole list
/// back; two concurrent registrations for the same key may lose one of them
/// (last write wins).
#[derive(Debug)]
pub struct RemoteHandlerStore<C> {
    cache: C,
    prefix: String,
}

impl<C: RemoteCache> RemoteHandlerStore<C> {
    pub fn new(cache: C, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    /// Namespaced storage key: `prefix:42` for integer keys and
    /// `prefix:"chat-7"` for string keys
    pub fn key(&self, key: &ConversationKey) -> String {
        format!("{}:{}", self.prefix, key.storage_key())
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    async fn read(&self, storage_key: &str) -> Result<Option<Vec<HandlerRecord>>> {
        match self.cache.get_bytes(storage_key).await? {
            Some(payload) if !payload.is_empty() => Ok(Some(decode_records(&payload)?)),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl<C: RemoteCache> HandlerStore for RemoteHandlerStore<C> {
    async fn register(&self, key: &ConversationKey, handler: HandlerRecord) -> Result<()> {
        let storage_key = self.key(key);
        let mut handlers = self.read(&storage_key).await?.unwrap_or_default();
        handlers.push(handler);

        let payload = encode_records(&handlers)?;
        self.cache.set_bytes(&storage_key, &payload).await?;

        log_store_operation(
            "register",
            self.cache.provider_name(),
            &storage_key,
            "ok",
            Some(handlers.len()),
        );
        Ok(())
    }

    async fn clear(&self, key: &ConversationKey) -> Result<()> {
        let storage_key = self.key(key);
        self.cache.delete(&storage_key).await?;
        log_store_operation("clear", self.cache.provider_name(), &storage_key, "ok", None);
        Ok(())
    }

    async fn get(&self, key: &ConversationKey) -> Result<Option<Vec<HandlerRecord>>> {
        let storage_key = self.key(key);
        let Some(handlers) = self.read(&storage_key).await? else {
            debug!(key = %storage_key, "No pending handlers");
            return Ok(None);
        };

        self.cache.delete(&storage_key).await?;
        log_store_operation(
            "get",
            self.cache.provider_name(),
            &storage_key,
            "hit",
            Some(handlers.len()),
        );
        Ok(Some(handlers))
    }

    fn backend_name(&self) -> &'static str {
        self.cache.provider_name()
    }
}
