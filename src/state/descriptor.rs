use super::group::validate_identifier;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One named step in a conversation, identified by `"Group:field"`
///
/// Descriptors are only created by [`super::StateGroup::define`] and are
/// immutable afterwards. Equality and hashing use the qualified name alone.
#[derive(Clone)]
pub struct StateDescriptor {
    qualified_name: Arc<str>,
    group: Arc<str>,
}

impl StateDescriptor {
    pub(crate) fn new(group: &Arc<str>, field: &str) -> Self {
        Self {
            qualified_name: Arc::from(format!("{group}:{field}")),
            group: Arc::clone(group),
        }
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Name of the owning group
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Field name within the owning group
    pub fn field(&self) -> &str {
        &self.qualified_name[self.group.len() + 1..]
    }

    /// Whether a stored state tag refers to this descriptor
    pub fn matches(&self, tag: &str) -> bool {
        *self.qualified_name == *tag
    }
}

impl PartialEq for StateDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.qualified_name == other.qualified_name
    }
}

impl Eq for StateDescriptor {}

impl Hash for StateDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.qualified_name.hash(state);
    }
}

impl fmt::Display for StateDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name)
    }
}

impl fmt::Debug for StateDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateDescriptor({})", self.qualified_name)
    }
}

impl Serialize for StateDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.qualified_name)
    }
}

impl<'de> Deserialize<'de> for StateDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        let (group, field) = tag
            .split_once(':')
            .ok_or_else(|| serde::de::Error::custom(format!("Invalid state tag: {tag}")))?;
        validate_identifier("group", group)
            .and_then(|()| validate_identifier("field", field))
            .map_err(serde::de::Error::custom)?;
        Ok(Self::new(&Arc::from(group), field))
    }
}
