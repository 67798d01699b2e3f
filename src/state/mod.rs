//! # Conversation States
//!
//! Named steps of a conversation and the storage tracking which step each
//! conversation is currently in.
//!
//! ```rust
//! use chatbot_core::state::StateGroup;
//!
//! let registration = StateGroup::define("Registration", ["name", "age"]).unwrap();
//! let name = registration.get("name").unwrap();
//! assert_eq!(name.qualified_name(), "Registration:name");
//! assert_eq!(name.group(), "Registration");
//! ```

pub mod descriptor;
pub mod group;
pub mod storage;

pub use descriptor::StateDescriptor;
pub use group::{StateGroup, RESERVED_PREFIX};
pub use storage::{MemoryStateStorage, StateStorage};
