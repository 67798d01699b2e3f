//! # Handler Store
//!
//! Keeps ordered lists of pending ("next step" / reply) handlers per
//! conversation key.
//!
//! ## Architecture
//!
//! ```text
//! HandlerStore (trait)
//!   ├── MemoryHandlerStore             <- process-local DashMap
//!   └── RemoteHandlerStore<C>          <- read-modify-write over a RemoteCache
//!         └── RedisCache               <- ConnectionManager (feature `redis-store`)
//! ```
//!
//! ## Single-consumption reads
//!
//! `get` returns and removes the stored list, so a next-step handler fires at
//! most once for the step it was awaiting.
//!
//! ## Consistency
//!
//! `RemoteHandlerStore::register` is a read-modify-write of the whole list.
//! Concurrent registrations for the same key are last-write-wins; callers
//! needing exactly-once registration must serialize per key.

pub mod codec;
pub mod factory;
pub mod memory;
pub mod record;
pub mod remote;
pub mod traits;

#[cfg(feature = "redis-store")]
pub mod redis;

pub use factory::build_handler_store;
pub use memory::MemoryHandlerStore;
pub use record::HandlerRecord;
pub use remote::{RemoteCache, RemoteHandlerStore};
pub use traits::HandlerStore;

#[cfg(feature = "redis-store")]
pub use self::redis::RedisCache;
