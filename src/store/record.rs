//! Serializable reference to a pending handler.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A pending handler stored under a conversation key
///
/// Closures cannot cross a process boundary, so the record names a callback
/// registered with the dispatcher's `CallbackRegistry` and carries the
/// arguments needed to reconstruct the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerRecord {
    pub callback: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl HandlerRecord {
    pub fn new(callback: impl Into<String>) -> Self {
        Self {
            callback: callback.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwarg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(name.into(), value);
        self
    }
}
