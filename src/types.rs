//! Conversation keys and the structured updates handed to the dispatcher.
//!
//! The transport layer owns the full event schema; the core only needs the
//! update kind tag, the conversation it belongs to and an opaque payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier scoping stored handlers and state to one chat or user context
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConversationKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Str(id) => write!(f, "{id}"),
        }
    }
}

impl ConversationKey {
    /// Rendering used inside namespaced storage keys
    ///
    /// String keys are JSON-quoted so `Int(42)` and `Str("42")` never share
    /// a slot: `42` vs `"42"`.
    pub fn storage_key(&self) -> String {
        match self {
            Self::Int(id) => id.to_string(),
            Self::Str(id) => Value::from(id.as_str()).to_string(),
        }
    }
}

impl From<i64> for ConversationKey {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for ConversationKey {
    fn from(id: &str) -> Self {
        Self::Str(id.to_string())
    }
}

impl From<String> for ConversationKey {
    fn from(id: String) -> Self {
        Self::Str(id)
    }
}

/// Tag identifying the kind of an update (`message`, `sticker`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateKind(String);

impl UpdateKind {
    pub const MESSAGE: &'static str = "message";
    pub const EDITED_MESSAGE: &'static str = "edited_message";
    pub const TEXT: &'static str = "text";
    pub const IMAGE: &'static str = "image";
    pub const VOICE: &'static str = "voice";
    pub const STICKER: &'static str = "sticker";
    pub const CALLBACK_QUERY: &'static str = "callback_query";

    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn message() -> Self {
        Self::new(Self::MESSAGE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UpdateKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

/// An inbound event as delivered by the transport layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub kind: UpdateKind,
    pub conversation_key: ConversationKey,
    /// Transport message id, used as the key for reply handlers
    pub message_id: Option<ConversationKey>,
    /// Id of the message this update replies to
    pub reply_to: Option<ConversationKey>,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl Update {
    pub fn new(
        kind: impl Into<UpdateKind>,
        conversation_key: impl Into<ConversationKey>,
        payload: Value,
    ) -> Self {
        Self {
            kind: kind.into(),
            conversation_key: conversation_key.into(),
            message_id: None,
            reply_to: None,
            payload,
            received_at: Utc::now(),
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<ConversationKey>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<ConversationKey>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Text body of the payload, when the transport provided one
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Value::String(text) => Some(text),
            Value::Object(map) => map.get("text").and_then(Value::as_str),
            _ => None,
        }
    }
}
