//! Per-update context shared by middlewares and handlers.

use crate::state::StateDescriptor;
use crate::store::HandlerRecord;
use crate::types::ConversationKey;
use serde_json::Value;
use std::collections::HashMap;

/// A store change requested while handling an update
///
/// Queued changes are applied after post-processing, so middlewares observe
/// the stores as they were when the update arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreMutation {
    RegisterNextStep(HandlerRecord),
    ClearNextStep,
    RegisterReply {
        message_id: ConversationKey,
        handler: HandlerRecord,
    },
    ClearReply(ConversationKey),
    SetState(StateDescriptor),
    ClearState,
    SetData { field: String, value: Value },
}

/// Data bag and pending store mutations for one dispatched update
#[derive(Debug, Clone)]
pub struct DispatchContext {
    conversation_key: ConversationKey,
    current_state: Option<String>,
    data: HashMap<String, Value>,
    mutations: Vec<StoreMutation>,
}

impl DispatchContext {
    pub fn new(conversation_key: ConversationKey) -> Self {
        Self {
            conversation_key,
            current_state: None,
            data: HashMap::new(),
            mutations: Vec::new(),
        }
    }

    pub(crate) fn with_state(mut self, state: Option<String>) -> Self {
        self.current_state = state;
        self
    }

    pub fn conversation_key(&self) -> &ConversationKey {
        &self.conversation_key
    }

    /// Qualified name of the conversation's state when the update arrived
    pub fn current_state(&self) -> Option<&str> {
        self.current_state.as_deref()
    }

    pub fn is_in(&self, state: &StateDescriptor) -> bool {
        self.current_state.as_deref().is_some_and(|tag| state.matches(tag))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn data(&self) -> &HashMap<String, Value> {
        &self.data
    }

    /// Run `handler` for the next update of this conversation
    pub fn register_next_step(&mut self, handler: HandlerRecord) {
        self.mutations.push(StoreMutation::RegisterNextStep(handler));
    }

    pub fn clear_next_step(&mut self) {
        self.mutations.push(StoreMutation::ClearNextStep);
    }

    /// Run `handler` when someone replies to `message_id`
    pub fn register_reply(
        &mut self,
        message_id: impl Into<ConversationKey>,
        handler: HandlerRecord,
    ) {
        self.mutations.push(StoreMutation::RegisterReply {
            message_id: message_id.into(),
            handler,
        });
    }

    pub fn clear_reply(&mut self, message_id: impl Into<ConversationKey>) {
        self.mutations.push(StoreMutation::ClearReply(message_id.into()));
    }

    pub fn set_state(&mut self, state: &StateDescriptor) {
        self.mutations.push(StoreMutation::SetState(state.clone()));
    }

    pub fn clear_state(&mut self) {
        self.mutations.push(StoreMutation::ClearState);
    }

    /// Store a value in the conversation's persistent state data
    pub fn set_state_data(&mut self, field: impl Into<String>, value: Value) {
        self.mutations.push(StoreMutation::SetData {
            field: field.into(),
            value,
        });
    }

    pub fn pending_mutations(&self) -> &[StoreMutation] {
        &self.mutations
    }

    pub(crate) fn take_mutations(&mut self) -> Vec<StoreMutation> {
        std::mem::take(&mut self.mutations)
    }
}
