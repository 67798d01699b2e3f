use chatbot_core::store::HandlerRecord;
use chatbot_core::ConversationKey;
use proptest::prelude::*;

/// Strategy for conversation keys of either flavor
pub fn conversation_key_strategy() -> impl Strategy<Value = ConversationKey> {
    prop_oneof![
        any::<i64>().prop_map(ConversationKey::Int),
        "[a-z0-9_-]{1,24}".prop_map(ConversationKey::Str),
    ]
}

/// Strategy for identifiers usable as state group and field names
pub fn state_identifier_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,31}"
}

/// Strategy for JSON argument values
pub fn argument_strategy() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i64>().prop_map(serde_json::Value::from),
        "[a-zA-Z0-9 ]{0,16}".prop_map(serde_json::Value::from),
    ]
}

/// Strategy for handler records with positional and keyword arguments
pub fn handler_record_strategy() -> impl Strategy<Value = HandlerRecord> {
    (
        "[a-z][a-z_]{0,23}",
        prop::collection::vec(argument_strategy(), 0..4),
        prop::collection::btree_map("[a-z]{1,8}", argument_strategy(), 0..3),
    )
        .prop_map(|(callback, args, kwargs)| {
            kwargs
                .into_iter()
                .fold(HandlerRecord::new(callback).with_args(args), |record, (k, v)| {
                    record.with_kwarg(k, v)
                })
        })
}
