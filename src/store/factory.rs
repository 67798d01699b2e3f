//! Builds the handler store selected by configuration.

use super::memory::MemoryHandlerStore;
use super::traits::HandlerStore;
use crate::config::{RedisStoreConfig, StoreBackend};
use crate::error::Result;
use std::sync::Arc;
use tracing::info;

/// Create the store for `backend`
///
/// Asking for Redis in a build without the `redis-store` feature is a
/// configuration error; it never degrades to memory storage.
pub async fn build_handler_store(
    backend: StoreBackend,
    redis: &RedisStoreConfig,
) -> Result<Arc<dyn HandlerStore>> {
    let store: Arc<dyn HandlerStore> = match backend {
        StoreBackend::Memory => Arc::new(MemoryHandlerStore::new()),
        StoreBackend::Redis => build_redis_store(redis).await?,
    };

    info!(backend = store.backend_name(), "Handler store initialized");
    Ok(store)
}

#[cfg(feature = "redis-store")]
async fn build_redis_store(config: &RedisStoreConfig) -> Result<Arc<dyn HandlerStore>> {
    use super::redis::RedisCache;
    use super::remote::RemoteHandlerStore;

    let cache = RedisCache::from_config(config).await?;
    Ok(Arc::new(RemoteHandlerStore::new(cache, config.prefix.clone())))
}

#[cfg(not(feature = "redis-store"))]
async fn build_redis_store(_config: &RedisStoreConfig) -> Result<Arc<dyn HandlerStore>> {
    Err(crate::error::DispatchError::configuration(
        "Redis handler store requested but this build lacks the `redis-store` feature",
    ))
}
