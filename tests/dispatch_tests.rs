mod common;

use chatbot_core::dispatcher::{handler_fn, DispatchContext, DispatchState, Dispatcher, HandlerSpec};
use chatbot_core::middleware::{hooks_fn, ControlSignal, UpdateSensitiveMiddleware};
use chatbot_core::state::{MemoryStateStorage, StateGroup, StateStorage};
use chatbot_core::store::{HandlerRecord, HandlerStore, MemoryHandlerStore, RemoteHandlerStore};
use chatbot_core::{ConversationKey, HandlerError, Update};
use common::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn cancel_update_skips_handlers_and_all_post_hooks() {
    let calls = calls();
    let dispatcher = Dispatcher::builder()
        .middleware(recording_middleware("m1", &calls, Some(ControlSignal::CancelUpdate)))
        .middleware(recording_middleware("m2", &calls, None))
        .handler(HandlerSpec::new("echo", recording_handler("echo", &calls, None)))
        .build()
        .unwrap();

    let report = dispatcher.dispatch(&text_update(1, "hi")).await;

    assert_eq!(snapshot(&calls), vec!["m1.pre"]);
    assert!(report.was_cancelled());
    assert_eq!(
        report.transitions,
        vec![DispatchState::Pre, DispatchState::Cancelled, DispatchState::Done]
    );
    assert!(report.handlers_run.is_empty());
}

#[tokio::test]
async fn skip_handler_still_runs_every_post_hook() {
    let calls = calls();
    let dispatcher = Dispatcher::builder()
        .middleware(recording_middleware("m1", &calls, Some(ControlSignal::SkipHandler)))
        .middleware(recording_middleware("m2", &calls, None))
        .handler(HandlerSpec::new("echo", recording_handler("echo", &calls, None)))
        .build()
        .unwrap();

    let report = dispatcher.dispatch(&text_update(1, "hi")).await;

    assert_eq!(
        snapshot(&calls),
        vec![
            "m1.pre",
            "m2.pre",
            "m1.post(error=none)",
            "m2.post(error=none)"
        ]
    );
    assert!(report.was_skipped());
    assert!(report.is_success());
}

#[tokio::test]
async fn handler_error_reaches_post_process_and_dispatcher_survives() {
    let calls = calls();
    let dispatcher = Dispatcher::builder()
        .middleware(recording_middleware("m1", &calls, None))
        .handler(HandlerSpec::new("broken", failing_handler("database is down")))
        .build()
        .unwrap();

    let report = dispatcher.dispatch(&text_update(1, "hi")).await;
    assert_eq!(
        snapshot(&calls),
        vec!["m1.pre", "m1.post(error=database is down)"]
    );
    assert_eq!(report.handler_error.as_deref(), Some("database is down"));

    // The same dispatcher keeps serving updates
    let report = dispatcher.dispatch(&text_update(1, "again")).await;
    assert_eq!(report.transitions.last(), Some(&DispatchState::Done));
}

#[tokio::test]
async fn panicking_handler_is_reported_as_error() {
    let calls = calls();
    let dispatcher = Dispatcher::builder()
        .middleware(recording_middleware("m1", &calls, None))
        .handler(HandlerSpec::new(
            "panicky",
            handler_fn(|_: &Update, _: &mut DispatchContext| {
                panic!("index out of bounds");
            }),
        ))
        .build()
        .unwrap();

    let report = dispatcher.dispatch(&text_update(1, "hi")).await;
    assert_eq!(
        report.handler_error.as_deref(),
        Some("panicked: index out of bounds")
    );
    assert_eq!(snapshot(&calls).len(), 2);
}

#[tokio::test]
async fn first_matching_handler_wins() {
    let calls = calls();
    let dispatcher = Dispatcher::builder()
        .handler(HandlerSpec::new("first", recording_handler("first", &calls, None)))
        .handler(HandlerSpec::new("second", recording_handler("second", &calls, None)))
        .build()
        .unwrap();

    let report = dispatcher.dispatch(&text_update(1, "hi")).await;
    assert_eq!(snapshot(&calls), vec!["first"]);
    assert_eq!(report.handlers_run, vec!["first"]);
}

#[tokio::test]
async fn continue_handling_lets_next_handler_run() {
    let calls = calls();
    let dispatcher = Dispatcher::builder()
        .handler(HandlerSpec::new(
            "audit",
            recording_handler("audit", &calls, Some(ControlSignal::ContinueHandling)),
        ))
        .handler(HandlerSpec::new("reply", recording_handler("reply", &calls, None)))
        .handler(HandlerSpec::new("never", recording_handler("never", &calls, None)))
        .build()
        .unwrap();

    dispatcher.dispatch(&text_update(1, "hi")).await;
    assert_eq!(snapshot(&calls), vec!["audit", "reply"]);
}

#[tokio::test]
async fn command_and_kind_filters_select_handler() {
    let calls = calls();
    let dispatcher = Dispatcher::builder()
        .handler(
            HandlerSpec::new("start", recording_handler("start", &calls, None)).commands(["start"]),
        )
        .handler(
            HandlerSpec::new("sticker", recording_handler("sticker", &calls, None))
                .kinds(["sticker"]),
        )
        .build()
        .unwrap();

    dispatcher.dispatch(&text_update(1, "/start@my_bot")).await;
    dispatcher
        .dispatch(&Update::new("sticker", 1, json!({ "file_id": "abc" })))
        .await;
    let report = dispatcher.dispatch(&text_update(1, "plain text")).await;

    assert_eq!(snapshot(&calls), vec!["start", "sticker"]);
    assert!(report.handlers_run.is_empty());
}

#[tokio::test]
async fn update_sensitive_middleware_only_runs_for_registered_kinds() {
    let calls = calls();
    let sensitive = UpdateSensitiveMiddleware::new("media")
        .on("image", recording_middleware("media.image", &calls, None));

    let dispatcher = Dispatcher::builder()
        .update_sensitive_middleware(sensitive)
        .handler(HandlerSpec::new("any", recording_handler("handler", &calls, None)))
        .build()
        .unwrap();

    dispatcher.dispatch(&text_update(1, "hi")).await;
    dispatcher
        .dispatch(&Update::new("image", 1, json!({ "file_id": "x" })))
        .await;

    assert_eq!(
        snapshot(&calls),
        vec![
            "handler",
            "media.image.pre",
            "handler",
            "media.image.post(error=none)"
        ]
    );
}

#[tokio::test]
async fn next_step_handler_fires_once_instead_of_regular_handlers() {
    let calls = calls();
    let dispatcher = Dispatcher::builder()
        .step_callback("ask_age", recording_step("ask_age", &calls))
        .handler(HandlerSpec::new("fallback", recording_handler("fallback", &calls, None)))
        .build()
        .unwrap();

    let key = ConversationKey::from(7);
    dispatcher
        .register_next_step_handler(&key, HandlerRecord::new("ask_age").with_args(vec![json!(1)]))
        .await
        .unwrap();
    dispatcher
        .register_next_step_handler(&key, HandlerRecord::new("ask_age").with_args(vec![json!(2)]))
        .await
        .unwrap();

    let first = dispatcher.dispatch(&text_update(7, "Alice")).await;
    let second = dispatcher.dispatch(&text_update(7, "42")).await;

    assert!(first.consumed_next_step);
    assert!(!second.consumed_next_step);
    assert_eq!(
        snapshot(&calls),
        vec!["ask_age([1])", "ask_age([2])", "fallback"]
    );
}

#[tokio::test]
async fn handlers_register_next_step_through_context() {
    let calls = calls();
    let dispatcher = Dispatcher::builder()
        .step_callback("collect_name", recording_step("collect_name", &calls))
        .handler(
            HandlerSpec::new(
                "start",
                handler_fn(|_: &Update, context: &mut DispatchContext| {
                    context.register_next_step(HandlerRecord::new("collect_name"));
                    Ok(None)
                }),
            )
            .commands(["start"]),
        )
        .build()
        .unwrap();

    dispatcher.dispatch(&text_update(3, "/start")).await;
    let report = dispatcher.dispatch(&text_update(3, "Bob")).await;

    assert!(report.consumed_next_step);
    assert_eq!(snapshot(&calls), vec!["collect_name([])"]);
}

#[tokio::test]
async fn next_step_mutations_are_dropped_when_cancelled() {
    let store = Arc::new(MemoryHandlerStore::new());
    let dispatcher = Dispatcher::builder()
        .next_step_store(store.clone())
        .step_callback("later", recording_step("later", &calls()))
        .middleware(hooks_fn(
            "gate",
            |_, context| {
                context.register_next_step(HandlerRecord::new("later"));
                Ok(Some(ControlSignal::CancelUpdate))
            },
            |_, _, _| Ok(()),
        ))
        .build()
        .unwrap();

    dispatcher.dispatch(&text_update(9, "hi")).await;
    assert_eq!(store.conversation_count(), 0);
}

#[tokio::test]
async fn unknown_step_callback_becomes_handler_error() {
    let store = Arc::new(MemoryHandlerStore::with_handlers([(
        ConversationKey::from(4),
        vec![HandlerRecord::new("vanished")],
    )]));
    let seen = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&seen);

    let dispatcher = Dispatcher::builder()
        .next_step_store(store)
        .exception_handler(move |_: &Update, _: &HandlerError| {
            observed.fetch_add(1, Ordering::SeqCst);
            true
        })
        .build()
        .unwrap();

    let report = dispatcher.dispatch(&text_update(4, "hi")).await;
    assert!(report.consumed_next_step);
    assert!(report
        .handler_error
        .as_deref()
        .is_some_and(|error| error.contains("vanished")));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reply_handlers_run_for_replies_to_registered_message() {
    let calls = calls();
    let dispatcher = Dispatcher::builder()
        .step_callback("confirm", recording_step("confirm", &calls))
        .handler(HandlerSpec::new("echo", recording_handler("echo", &calls, None)))
        .build()
        .unwrap();

    dispatcher
        .register_for_reply(&ConversationKey::from(100), HandlerRecord::new("confirm"))
        .await
        .unwrap();

    dispatcher
        .dispatch(&text_update(1, "unrelated").with_reply_to(99))
        .await;
    dispatcher
        .dispatch(&text_update(1, "yes").with_reply_to(100))
        .await;
    dispatcher
        .dispatch(&text_update(1, "yes again").with_reply_to(100))
        .await;

    assert_eq!(
        snapshot(&calls),
        vec!["echo", "confirm([])", "echo", "echo"]
    );
}

#[tokio::test]
async fn clear_step_handlers_discards_pending_handlers() {
    let calls = calls();
    let dispatcher = Dispatcher::builder()
        .step_callback("ask", recording_step("ask", &calls))
        .build()
        .unwrap();
    let key = ConversationKey::from("chat-1");

    dispatcher
        .register_next_step_handler(&key, HandlerRecord::new("ask"))
        .await
        .unwrap();
    dispatcher.clear_step_handlers(&key).await.unwrap();
    dispatcher.clear_step_handlers(&key).await.unwrap();

    let report = dispatcher
        .dispatch(&Update::new("text", "chat-1", json!("hello")))
        .await;
    assert!(!report.consumed_next_step);
    assert!(snapshot(&calls).is_empty());
}

#[tokio::test]
async fn state_filter_routes_conversation_steps() {
    let calls = calls();
    let signup = StateGroup::define("Signup", ["name", "age"]).unwrap();
    let name = signup.get("name").unwrap().clone();
    let age = signup.get("age").unwrap().clone();
    let storage = Arc::new(MemoryStateStorage::new());

    let to_age = age.clone();
    let dispatcher = Dispatcher::builder()
        .state_storage(storage.clone())
        .handler(
            HandlerSpec::new(
                "name",
                handler_fn(move |_: &Update, context: &mut DispatchContext| {
                    context.set_state(&to_age);
                    Ok(None)
                }),
            )
            .state(&name),
        )
        .handler(HandlerSpec::new("age", recording_handler("age", &calls, None)).state(&age))
        .build()
        .unwrap();

    let key = ConversationKey::from(11);
    dispatcher.set_state(&key, &name).await.unwrap();

    let first = dispatcher.dispatch(&text_update(11, "Carol")).await;
    assert_eq!(first.handlers_run, vec!["name"]);
    assert_eq!(
        storage.get_state(&key).await.unwrap().as_deref(),
        Some("Signup:age")
    );

    let second = dispatcher.dispatch(&text_update(11, "30")).await;
    assert_eq!(second.handlers_run, vec!["age"]);
}

#[tokio::test]
async fn post_process_failure_does_not_stop_other_middlewares() {
    let calls = calls();
    let dispatcher = Dispatcher::builder()
        .middleware(hooks_fn(
            "flaky",
            |_, _| Ok(None),
            |_, _, _| Err(anyhow::anyhow!("metrics sink offline")),
        ))
        .middleware(recording_middleware("m2", &calls, None))
        .build()
        .unwrap();

    let report = dispatcher.dispatch(&text_update(1, "hi")).await;
    assert_eq!(snapshot(&calls), vec!["m2.pre", "m2.post(error=none)"]);
    assert_eq!(report.post_process_errors.len(), 1);
    assert!(report.post_process_errors[0].contains("flaky"));
}

#[tokio::test]
async fn remote_store_offline_is_captured_as_exception() {
    let calls = calls();
    let dispatcher = Dispatcher::builder()
        .next_step_store(Arc::new(RemoteHandlerStore::new(InMemoryCache::offline(), "bot")))
        .middleware(recording_middleware("m1", &calls, None))
        .build()
        .unwrap();

    let report = dispatcher.dispatch(&text_update(1, "hi")).await;
    assert!(report
        .handler_error
        .as_deref()
        .is_some_and(|error| error.contains("connection refused")));
    assert_eq!(snapshot(&calls).len(), 2);
}

#[tokio::test]
async fn batch_is_sequential_within_conversation() {
    let calls = calls();
    let recorder = Arc::clone(&calls);
    let dispatcher = Dispatcher::builder()
        .handler(HandlerSpec::new(
            "log",
            handler_fn(move |update: &Update, _: &mut DispatchContext| {
                recorder.lock().push(format!(
                    "{}:{}",
                    update.conversation_key,
                    update.text().unwrap_or_default()
                ));
                Ok(None)
            }),
        ))
        .max_concurrent_conversations(2)
        .build()
        .unwrap();

    let updates = vec![
        text_update(1, "a"),
        text_update(2, "x"),
        text_update(1, "b"),
        text_update(3, "p"),
        text_update(1, "c"),
    ];
    let reports = dispatcher.dispatch_batch(updates).await;

    assert_eq!(reports.len(), 5);
    let keys: Vec<String> = reports
        .iter()
        .map(|report| report.conversation_key.to_string())
        .collect();
    assert_eq!(keys, vec!["1", "1", "1", "2", "3"]);

    let first_conversation: Vec<String> = snapshot(&calls)
        .into_iter()
        .filter(|entry| entry.starts_with("1:"))
        .collect();
    assert_eq!(first_conversation, vec!["1:a", "1:b", "1:c"]);
}

#[tokio::test]
async fn shared_remote_store_hands_off_between_dispatchers() {
    let store: Arc<dyn HandlerStore> =
        Arc::new(RemoteHandlerStore::new(InMemoryCache::new(), "bot"));
    let calls = calls();

    let producer = Dispatcher::builder()
        .next_step_store(Arc::clone(&store))
        .step_callback("resume", recording_step("resume", &calls))
        .build()
        .unwrap();
    let consumer = Dispatcher::builder()
        .next_step_store(store)
        .step_callback("resume", recording_step("resume", &calls))
        .build()
        .unwrap();

    producer
        .register_next_step_handler(
            &ConversationKey::from(5),
            HandlerRecord::new("resume").with_args(vec![json!("checkout")]),
        )
        .await
        .unwrap();

    let report = consumer.dispatch(&text_update(5, "done")).await;
    assert!(report.consumed_next_step);
    assert_eq!(snapshot(&calls), vec!["resume([\"checkout\"])"]);
}
