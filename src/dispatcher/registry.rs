//! Name -> callback lookup used to rebuild stored next-step and reply handlers

use super::handler::StepCallback;
use crate::error::{DispatchError, Result};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<String, Arc<dyn StepCallback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; names must be unique
    pub fn register(
        &mut self,
        name: impl Into<String>,
        callback: Arc<dyn StepCallback>,
    ) -> Result<()> {
        let name = name.into();
        if self.callbacks.contains_key(&name) {
            return Err(DispatchError::configuration(format!(
                "Step callback '{name}' registered twice"
            )));
        }
        self.callbacks.insert(name, callback);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn StepCallback>> {
        self.callbacks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callbacks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.callbacks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callbacks", &self.names())
            .finish()
    }
}
