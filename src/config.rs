//! # Configuration
//!
//! Dispatcher and handler-store settings. Values come from defaults, an
//! optional TOML file and `CHATBOT__*` environment variables (layered by the
//! `config` crate), or from flat `CHATBOT_*` variables via [`DispatcherConfig::from_env`].

use crate::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Which backend keeps pending next-step / reply handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(DispatchError::configuration(format!(
                "Invalid store backend: {other}"
            ))),
        }
    }
}

/// Connection parameters for the Redis-backed handler store
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisStoreConfig {
    pub host: String,
    pub port: u16,
    pub database: i64,
    /// Namespace prepended to every conversation key (`prefix:key`)
    pub prefix: String,
    pub password: Option<String>,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            database: 0,
            prefix: "chatbot".to_string(),
            password: None,
        }
    }
}

// Keeps the password out of logs and panic messages
impl fmt::Debug for RedisStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("prefix", &self.prefix)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl RedisStoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(DispatchError::configuration("redis host must not be empty"));
        }
        if self.port == 0 {
            return Err(DispatchError::configuration("redis port must be non-zero"));
        }
        if self.database < 0 {
            return Err(DispatchError::configuration(format!(
                "redis database index must be non-negative, got {}",
                self.database
            )));
        }
        if self.prefix.trim().is_empty() {
            return Err(DispatchError::configuration("redis key prefix must not be empty"));
        }
        if self.prefix.chars().any(char::is_whitespace) {
            return Err(DispatchError::configuration(format!(
                "redis key prefix must not contain whitespace: {:?}",
                self.prefix
            )));
        }
        Ok(())
    }
}

/// Top-level dispatcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub next_step_backend: StoreBackend,
    pub reply_backend: StoreBackend,
    pub redis: RedisStoreConfig,
    /// Upper bound on conversations processed concurrently by `dispatch_batch`
    pub max_concurrent_conversations: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            next_step_backend: StoreBackend::Memory,
            reply_backend: StoreBackend::Memory,
            redis: RedisStoreConfig::default(),
            max_concurrent_conversations: 16,
        }
    }
}

impl DispatcherConfig {
    /// Build from flat `CHATBOT_*` environment variables on top of defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(backend) = lookup("CHATBOT_STORE_BACKEND") {
            let backend: StoreBackend = backend.parse()?;
            config.next_step_backend = backend;
            config.reply_backend = backend;
        }

        if let Some(host) = lookup("CHATBOT_REDIS_HOST") {
            config.redis.host = host;
        }

        if let Some(port) = lookup("CHATBOT_REDIS_PORT") {
            config.redis.port = port
                .parse()
                .map_err(|e| DispatchError::configuration(format!("Invalid redis port: {e}")))?;
        }

        if let Some(database) = lookup("CHATBOT_REDIS_DB") {
            config.redis.database = database.parse().map_err(|e| {
                DispatchError::configuration(format!("Invalid redis database: {e}"))
            })?;
        }

        if let Some(prefix) = lookup("CHATBOT_REDIS_PREFIX") {
            config.redis.prefix = prefix;
        }

        if let Some(password) = lookup("CHATBOT_REDIS_PASSWORD") {
            config.redis.password = Some(password).filter(|p| !p.is_empty());
        }

        if let Some(limit) = lookup("CHATBOT_MAX_CONCURRENT_CONVERSATIONS") {
            config.max_concurrent_conversations = limit.parse().map_err(|e| {
                DispatchError::configuration(format!("Invalid max_concurrent_conversations: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Layer an optional TOML file and `CHATBOT__SECTION__FIELD` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix("CHATBOT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        tracing::debug!(config = ?config, "Dispatcher configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_conversations == 0 {
            return Err(DispatchError::configuration(
                "max_concurrent_conversations must be at least 1",
            ));
        }
        if self.uses_redis() {
            self.redis.validate()?;
        }
        Ok(())
    }

    pub fn uses_redis(&self) -> bool {
        self.next_step_backend == StoreBackend::Redis || self.reply_backend == StoreBackend::Redis
    }
}
