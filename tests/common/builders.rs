//! Shared fixtures: recording middlewares and an in-process remote cache

use async_trait::async_trait;
use chatbot_core::dispatcher::{handler_fn, step_fn, DispatchContext, Handler, StepCallback};
use chatbot_core::middleware::{hooks_fn, ControlSignal, Middleware};
use chatbot_core::store::RemoteCache;
use chatbot_core::{DispatchError, HandlerResult, Result, Update};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Barrier;

/// Ordered log of hook and handler invocations
pub type Calls = Arc<Mutex<Vec<String>>>;

pub fn calls() -> Calls {
    Calls::default()
}

pub fn snapshot(calls: &Calls) -> Vec<String> {
    calls.lock().clone()
}

pub fn text_update(key: i64, text: &str) -> Update {
    Update::new("text", key, json!({ "text": text }))
}

/// Middleware recording `name.pre` and `name.post(error=..)`
pub fn recording_middleware(
    name: &'static str,
    calls: &Calls,
    signal: Option<ControlSignal>,
) -> impl Middleware {
    let pre_calls = Arc::clone(calls);
    let post_calls = Arc::clone(calls);
    hooks_fn(
        name,
        move |_, _| {
            pre_calls.lock().push(format!("{name}.pre"));
            Ok(signal)
        },
        move |_, _, exception| {
            let error = exception.map_or("none".to_string(), |e| e.to_string());
            post_calls.lock().push(format!("{name}.post(error={error})"));
            Ok(())
        },
    )
}

/// Handler recording its name and returning `signal`
pub fn recording_handler(
    name: &'static str,
    calls: &Calls,
    signal: Option<ControlSignal>,
) -> impl Handler {
    let calls = Arc::clone(calls);
    handler_fn(move |_: &Update, _: &mut DispatchContext| {
        calls.lock().push(name.to_string());
        Ok(signal)
    })
}

pub fn failing_handler(message: &'static str) -> impl Handler {
    handler_fn(move |_: &Update, _: &mut DispatchContext| -> HandlerResult<Option<ControlSignal>> {
        Err(anyhow::anyhow!(message))
    })
}

/// Step callback recording `name(args)`
pub fn recording_step(name: &'static str, calls: &Calls) -> impl StepCallback {
    let calls = Arc::clone(calls);
    step_fn(
        move |_: &Update, _: &mut DispatchContext, args: &[Value], _: &Map<String, Value>| {
            calls
                .lock()
                .push(format!("{name}({})", Value::Array(args.to_vec())));
            Ok(())
        },
    )
}

/// Remote cache living in process memory
///
/// With a barrier installed every `get_bytes` waits for the other party,
/// forcing concurrent read-modify-write sequences to interleave.
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    read_barrier: Option<Arc<Barrier>>,
    offline: bool,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_barrier(parties: usize) -> Self {
        Self {
            read_barrier: Some(Arc::new(Barrier::new(parties))),
            ..Self::default()
        }
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: Vec<u8>) {
        self.entries.lock().insert(key.to_string(), value);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            Err(DispatchError::backend_unavailable("connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteCache for InMemoryCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_online()?;
        let value = self.entries.lock().get(key).cloned();
        if let Some(barrier) = &self.read_barrier {
            barrier.wait().await;
        }
        Ok(value)
    }

    async fn set_bytes(&self, key: &str, value: &[u8]) -> Result<()> {
        self.check_online()?;
        self.entries.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_online()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.offline)
    }

    fn provider_name(&self) -> &'static str {
        "in_memory_cache"
    }
}
