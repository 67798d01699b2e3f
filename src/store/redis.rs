//! Redis remote cache (feature `redis-store`)
//!
//! Uses `redis::aio::ConnectionManager` for async multiplexed connections
//! with automatic reconnection. Each trait call is a single command round
//! trip; the core imposes no timeout.

use super::remote::RemoteCache;
use crate::config::RedisStoreConfig;
use crate::error::{DispatchError, Result};
use async_trait::async_trait;
use tracing::debug;

#[derive(Clone)]
pub struct RedisCache {
    connection_manager: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("connection_manager", &"ConnectionManager")
            .finish()
    }
}

impl RedisCache {
    /// Validate the configuration and connect
    ///
    /// Invalid parameters fail with `Configuration`; an unreachable server
    /// fails with `BackendUnavailable`. Neither falls back to memory storage.
    pub async fn from_config(config: &RedisStoreConfig) -> Result<Self> {
        config.validate()?;

        let client = redis::Client::open(connection_info(config)).map_err(|e| {
            DispatchError::configuration(format!("Failed to create Redis client: {e}"))
        })?;

        let connection_manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| {
                DispatchError::backend_unavailable(format!("Failed to connect to Redis: {e}"))
            })?;

        debug!(
            host = %config.host,
            port = config.port,
            database = config.database,
            authenticated = config.password.is_some(),
            "Redis handler cache connected"
        );

        Ok(Self { connection_manager })
    }
}

fn connection_info(config: &RedisStoreConfig) -> redis::ConnectionInfo {
    redis::ConnectionInfo {
        addr: redis::ConnectionAddr::Tcp(config.host.clone(), config.port),
        redis: redis::RedisConnectionInfo {
            db: config.database,
            password: config.password.clone(),
            ..Default::default()
        },
    }
}

#[async_trait]
impl RemoteCache for RedisCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection_manager.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| DispatchError::backend_unavailable(format!("Redis GET failed: {e}")))?;
        Ok(value)
    }

    async fn set_bytes(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| DispatchError::backend_unavailable(format!("Redis SET failed: {e}")))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| DispatchError::backend_unavailable(format!("Redis DEL failed: {e}")))?;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connection_manager.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| DispatchError::backend_unavailable(format!("Redis PING failed: {e}")))?;
        Ok(pong == "PONG")
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }
}
