//! Declarative grouping of conversation states.

use super::descriptor::StateDescriptor;
use crate::error::{DispatchError, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Field names starting with this prefix are not turned into states
pub const RESERVED_PREFIX: &str = "__";

/// A finalized namespace of [`StateDescriptor`]s
///
/// Built once by [`StateGroup::define`]; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct StateGroup {
    name: Arc<str>,
    states: Vec<StateDescriptor>,
}

impl StateGroup {
    /// Finalize a group, assigning each field its `"name:field"` identity
    ///
    /// Fields with the reserved prefix are skipped. Empty or duplicate field
    /// names and names containing `':'` are rejected.
    pub fn define<I, S>(name: &str, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        validate_identifier("group", name)?;

        let name: Arc<str> = Arc::from(name);
        let mut seen = HashSet::new();
        let mut states = Vec::new();

        for field in fields {
            let field = field.as_ref();
            if field.starts_with(RESERVED_PREFIX) {
                continue;
            }
            validate_identifier("field", field)?;
            if !seen.insert(field.to_string()) {
                return Err(DispatchError::configuration(format!(
                    "State group '{name}' declares field '{field}' twice"
                )));
            }
            states.push(StateDescriptor::new(&name, field));
        }

        tracing::debug!(group = %name, states = states.len(), "State group defined");
        Ok(Self { name, states })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, field: &str) -> Option<&StateDescriptor> {
        self.states.iter().find(|state| state.field() == field)
    }

    /// Descriptors in declaration order
    pub fn states(&self) -> &[StateDescriptor] {
        &self.states
    }

    pub fn contains(&self, state: &StateDescriptor) -> bool {
        self.states.contains(state)
    }

    /// Resolve a stored state tag back to one of this group's descriptors
    pub fn resolve(&self, tag: &str) -> Option<&StateDescriptor> {
        self.states.iter().find(|state| state.matches(tag))
    }
}

/// Group and field names: non-empty, no whitespace, no `':'`
pub(crate) fn validate_identifier(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(DispatchError::configuration(format!("State {what} name must not be empty")));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(DispatchError::configuration(format!(
            "State {what} name {value:?} must not contain whitespace"
        )));
    }
    if value.contains(':') {
        return Err(DispatchError::configuration(format!(
            "State {what} name '{value}' must not contain ':'"
        )));
    }
    Ok(())
}
