//! # Dispatch pipeline
//!
//! Routes each update through the middleware chain and the registered
//! handlers, consulting the handler stores for pending next-step and reply
//! handlers.
//!
//! ## Per-update flow
//!
//! 1. Load the conversation's current state (if a state storage is set)
//! 2. `pre_process` for every middleware, in registration order
//! 3. Unless skipped or cancelled:
//!    - pending next-step handlers are consumed and run *instead of* regular
//!      handlers
//!    - otherwise reply handlers (keyed by `reply_to`) run, then regular
//!      handlers in priority order until one does not return
//!      `ContinueHandling`
//! 4. `post_process` for every middleware that completed step 2, receiving
//!    the captured error
//! 5. Store mutations queued on the context are applied
//!
//! The dispatcher is immutable once built; handlers and middlewares cannot
//! be added while updates are in flight.

use super::context::{DispatchContext, StoreMutation};
use super::exception::ExceptionHandler;
use super::guard::guarded;
use super::handler::{Handler, HandlerSpec, StepCallback};
use super::registry::CallbackRegistry;
use super::state::DispatchState;
use crate::config::DispatcherConfig;
use crate::error::{DispatchError, HandlerError, HandlerResult, Result};
use crate::logging::{log_dispatch_operation, log_error};
use crate::middleware::{
    ControlSignal, Middleware, MiddlewareChain, PreDisposition, UpdateSensitiveMiddleware,
};
use crate::state::{StateDescriptor, StateStorage};
use crate::store::{build_handler_store, HandlerRecord, HandlerStore, MemoryHandlerStore};
use crate::types::{ConversationKey, Update};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to one dispatched update
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub conversation_key: ConversationKey,
    /// Phases visited, ending in `Done`
    pub transitions: Vec<DispatchState>,
    /// Names of handlers and step callbacks that ran, in order
    pub handlers_run: Vec<String>,
    /// Whether pending next-step handlers were consumed
    pub consumed_next_step: bool,
    /// Error raised by a hook or handler, passed to `post_process`
    pub handler_error: Option<String>,
    pub post_process_errors: Vec<String>,
    /// Failures applying queued store mutations
    pub store_errors: Vec<String>,
}

impl DispatchReport {
    fn new(conversation_key: ConversationKey) -> Self {
        Self {
            conversation_key,
            transitions: Vec::new(),
            handlers_run: Vec::new(),
            consumed_next_step: false,
            handler_error: None,
            post_process_errors: Vec::new(),
            store_errors: Vec::new(),
        }
    }

    pub fn was_cancelled(&self) -> bool {
        self.transitions.contains(&DispatchState::Cancelled)
    }

    pub fn was_skipped(&self) -> bool {
        self.transitions.contains(&DispatchState::Skipped)
    }

    pub fn is_success(&self) -> bool {
        self.handler_error.is_none()
            && self.post_process_errors.is_empty()
            && self.store_errors.is_empty()
    }
}

/// Dispatch core: middleware chain, handlers and pending-handler stores
pub struct Dispatcher {
    middlewares: MiddlewareChain,
    handlers: Vec<HandlerSpec>,
    callbacks: CallbackRegistry,
    next_step_store: Arc<dyn HandlerStore>,
    reply_store: Arc<dyn HandlerStore>,
    state_storage: Option<Arc<dyn StateStorage>>,
    exception_handler: Option<Arc<dyn ExceptionHandler>>,
    max_concurrent_conversations: usize,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("middlewares", &self.middlewares)
            .field(
                "handlers",
                &self.handlers.iter().map(HandlerSpec::name).collect::<Vec<_>>(),
            )
            .field("callbacks", &self.callbacks)
            .field("next_step_store", &self.next_step_store.backend_name())
            .field("reply_store", &self.reply_store.backend_name())
            .field("state_storage", &self.state_storage.is_some())
            .field("max_concurrent_conversations", &self.max_concurrent_conversations)
            .finish()
    }
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn middlewares(&self) -> &MiddlewareChain {
        &self.middlewares
    }

    pub fn next_step_store(&self) -> &Arc<dyn HandlerStore> {
        &self.next_step_store
    }

    pub fn reply_store(&self) -> &Arc<dyn HandlerStore> {
        &self.reply_store
    }

    /// Dispatch one update; never fails, faults are reported instead
    pub async fn dispatch(&self, update: &Update) -> DispatchReport {
        let key = update.conversation_key.clone();
        let mut report = DispatchReport::new(key.clone());
        let current_state = self.load_state(&key).await;
        let mut context = DispatchContext::new(key).with_state(current_state);

        self.enter(&mut report, update, DispatchState::Pre);
        let pre = self.middlewares.run_pre(update, &mut context).await;

        let mut exception = pre.error;
        match pre.disposition {
            PreDisposition::Cancel => {
                self.enter(&mut report, update, DispatchState::Cancelled);
                self.enter(&mut report, update, DispatchState::Done);
                return report;
            }
            PreDisposition::Skip => self.enter(&mut report, update, DispatchState::Skipped),
            PreDisposition::Proceed => {
                self.enter(&mut report, update, DispatchState::Executing);
                if let Err(error) = self.execute(update, &mut context, &mut report).await {
                    exception = Some(error);
                }
            }
        }

        if let Some(error) = &exception {
            report.handler_error = Some(format!("{error:#}"));
            self.report_exception(update, error);
        }

        self.enter(&mut report, update, DispatchState::Post);
        let violations = self
            .middlewares
            .run_post(update, &mut context, &pre.completed, exception.as_ref())
            .await;
        report.post_process_errors = violations.iter().map(ToString::to_string).collect();

        self.apply_mutations(&context.take_mutations(), &mut report).await;

        self.enter(&mut report, update, DispatchState::Done);
        report
    }

    /// Dispatch many updates: sequential per conversation, concurrent across
    /// conversations (bounded by `max_concurrent_conversations`)
    ///
    /// Reports are grouped by conversation; order within a conversation
    /// follows the input order.
    pub async fn dispatch_batch(&self, updates: Vec<Update>) -> Vec<DispatchReport> {
        let mut order: Vec<ConversationKey> = Vec::new();
        let mut groups: HashMap<ConversationKey, Vec<Update>> = HashMap::new();
        for update in updates {
            let key = update.conversation_key.clone();
            groups
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .push(update);
        }

        let batches: Vec<Vec<Update>> = order
            .into_iter()
            .filter_map(|key| groups.remove(&key))
            .collect();

        let results: Vec<Vec<DispatchReport>> = stream::iter(batches)
            .map(|batch| async move {
                let mut reports = Vec::with_capacity(batch.len());
                for update in &batch {
                    reports.push(self.dispatch(update).await);
                }
                reports
            })
            .buffered(self.max_concurrent_conversations)
            .collect()
            .await;

        results.into_iter().flatten().collect()
    }

    /// Register a handler for the conversation's next update
    pub async fn register_next_step_handler(
        &self,
        key: &ConversationKey,
        handler: HandlerRecord,
    ) -> Result<()> {
        self.ensure_callback(&handler)?;
        self.next_step_store.register(key, handler).await
    }

    pub async fn clear_step_handlers(&self, key: &ConversationKey) -> Result<()> {
        self.next_step_store.clear(key).await
    }

    /// Register a handler for replies to `message_id`
    pub async fn register_for_reply(
        &self,
        message_id: &ConversationKey,
        handler: HandlerRecord,
    ) -> Result<()> {
        self.ensure_callback(&handler)?;
        self.reply_store.register(message_id, handler).await
    }

    pub async fn clear_reply_handlers(&self, message_id: &ConversationKey) -> Result<()> {
        self.reply_store.clear(message_id).await
    }

    pub async fn set_state(&self, key: &ConversationKey, state: &StateDescriptor) -> Result<()> {
        self.require_state_storage()?.set_state(key, state).await
    }

    pub async fn get_state(&self, key: &ConversationKey) -> Result<Option<String>> {
        self.require_state_storage()?.get_state(key).await
    }

    pub async fn delete_state(&self, key: &ConversationKey) -> Result<bool> {
        self.require_state_storage()?.delete_state(key).await
    }

    fn require_state_storage(&self) -> Result<&Arc<dyn StateStorage>> {
        self.state_storage
            .as_ref()
            .ok_or_else(|| DispatchError::configuration("No state storage configured"))
    }

    fn ensure_callback(&self, handler: &HandlerRecord) -> Result<()> {
        if self.callbacks.contains(&handler.callback) {
            Ok(())
        } else {
            Err(DispatchError::configuration(format!(
                "Unknown step callback '{}'",
                handler.callback
            )))
        }
    }

    fn enter(&self, report: &mut DispatchReport, update: &Update, state: DispatchState) {
        debug_assert!(report
            .transitions
            .last()
            .map_or(state == DispatchState::Pre, |last| last.can_transition_to(state)));
        report.transitions.push(state);
        log_dispatch_operation(
            &state.to_string(),
            update.kind.as_str(),
            &report.conversation_key.to_string(),
            None,
        );
    }

    async fn load_state(&self, key: &ConversationKey) -> Option<String> {
        let storage = self.state_storage.as_ref()?;
        match storage.get_state(key).await {
            Ok(state) => state,
            Err(error) => {
                warn!(conversation_key = %key, error = %error, "Failed to load conversation state");
                None
            }
        }
    }

    async fn execute(
        &self,
        update: &Update,
        context: &mut DispatchContext,
        report: &mut DispatchReport,
    ) -> HandlerResult<()> {
        let key = &update.conversation_key;
        if let Some(pending) = self.next_step_store.get(key).await? {
            report.consumed_next_step = true;
            debug!(conversation_key = %key, count = pending.len(), "Running next-step handlers");
            return self.run_records(update, context, &pending, report).await;
        }

        if let Some(reply_to) = &update.reply_to {
            if let Some(pending) = self.reply_store.get(reply_to).await? {
                debug!(reply_to = %reply_to, count = pending.len(), "Running reply handlers");
                self.run_records(update, context, &pending, report).await?;
            }
        }

        for spec in &self.handlers {
            if !spec.matches(update, context) {
                continue;
            }
            let outcome = run_handler(spec.handler().as_ref(), update, context).await?;
            report.handlers_run.push(spec.name().to_string());
            if outcome != Some(ControlSignal::ContinueHandling) {
                break;
            }
        }

        Ok(())
    }

    /// Run every stored record; the first error wins, later ones are logged
    async fn run_records(
        &self,
        update: &Update,
        context: &mut DispatchContext,
        records: &[HandlerRecord],
        report: &mut DispatchReport,
    ) -> HandlerResult<()> {
        let mut first_error: Option<HandlerError> = None;

        for record in records {
            let result = match self.callbacks.get(&record.callback) {
                Some(callback) => run_step(callback.as_ref(), update, context, record).await,
                None => Err(anyhow::anyhow!("Unknown step callback '{}'", record.callback)),
            };

            match result {
                Ok(()) => report.handlers_run.push(record.callback.clone()),
                Err(error) if first_error.is_none() => first_error = Some(error),
                Err(error) => log_error(
                    "dispatcher",
                    "step_callback",
                    &error.to_string(),
                    Some(&record.callback),
                ),
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn report_exception(&self, update: &Update, error: &HandlerError) {
        let handled = self
            .exception_handler
            .as_ref()
            .is_some_and(|handler| handler.handle(update, error));

        if !handled {
            log_error(
                "dispatcher",
                "handle_update",
                &format!("{error:#}"),
                Some(&update.conversation_key.to_string()),
            );
        }
    }

    async fn apply_mutations(&self, mutations: &[StoreMutation], report: &mut DispatchReport) {
        let key = report.conversation_key.clone();

        for mutation in mutations {
            let result = match mutation {
                StoreMutation::RegisterNextStep(handler) => {
                    self.register_next_step_handler(&key, handler.clone()).await
                }
                StoreMutation::ClearNextStep => self.clear_step_handlers(&key).await,
                StoreMutation::RegisterReply {
                    message_id,
                    handler,
                } => self.register_for_reply(message_id, handler.clone()).await,
                StoreMutation::ClearReply(message_id) => {
                    self.clear_reply_handlers(message_id).await
                }
                StoreMutation::SetState(state) => self.set_state(&key, state).await,
                StoreMutation::ClearState => self.delete_state(&key).await.map(|_| ()),
                StoreMutation::SetData { field, value } => match self.require_state_storage() {
                    Ok(storage) => storage.set_data(&key, field, value.clone()).await,
                    Err(error) => Err(error),
                },
            };

            if let Err(error) = result {
                log_error(
                    "dispatcher",
                    "apply_mutation",
                    &error.to_string(),
                    Some(&key.to_string()),
                );
                report.store_errors.push(error.to_string());
            }
        }
    }
}

async fn run_handler(
    handler: &dyn Handler,
    update: &Update,
    context: &mut DispatchContext,
) -> HandlerResult<Option<ControlSignal>> {
    guarded(handler.handle(update, context)).await
}

async fn run_step(
    callback: &dyn StepCallback,
    update: &Update,
    context: &mut DispatchContext,
    record: &HandlerRecord,
) -> HandlerResult<()> {
    guarded(callback.call(update, context, &record.args, &record.kwargs)).await
}

/// Collects middlewares, handlers and stores before the dispatcher is frozen
pub struct DispatcherBuilder {
    middlewares: MiddlewareChain,
    handlers: Vec<HandlerSpec>,
    callbacks: Vec<(String, Arc<dyn StepCallback>)>,
    next_step_store: Option<Arc<dyn HandlerStore>>,
    reply_store: Option<Arc<dyn HandlerStore>>,
    state_storage: Option<Arc<dyn StateStorage>>,
    exception_handler: Option<Arc<dyn ExceptionHandler>>,
    max_concurrent_conversations: usize,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            middlewares: MiddlewareChain::new(),
            handlers: Vec::new(),
            callbacks: Vec::new(),
            next_step_store: None,
            reply_store: None,
            state_storage: None,
            exception_handler: None,
            max_concurrent_conversations: DispatcherConfig::default().max_concurrent_conversations,
        }
    }

    /// Start from configuration, building the configured handler stores
    pub async fn from_config(config: &DispatcherConfig) -> Result<Self> {
        config.validate()?;
        let next_step_store = build_handler_store(config.next_step_backend, &config.redis).await?;
        let reply_store = build_handler_store(config.reply_backend, &config.redis).await?;

        Ok(Self::new()
            .next_step_store(next_step_store)
            .reply_store(reply_store)
            .max_concurrent_conversations(config.max_concurrent_conversations))
    }

    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn shared_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn update_sensitive_middleware(mut self, middleware: UpdateSensitiveMiddleware) -> Self {
        self.middlewares.push_update_sensitive(middleware);
        self
    }

    /// Add a handler; earlier registrations have higher priority
    pub fn handler(mut self, spec: HandlerSpec) -> Self {
        self.handlers.push(spec);
        self
    }

    pub fn step_callback(
        mut self,
        name: impl Into<String>,
        callback: impl StepCallback + 'static,
    ) -> Self {
        self.callbacks.push((name.into(), Arc::new(callback)));
        self
    }

    pub fn next_step_store(mut self, store: Arc<dyn HandlerStore>) -> Self {
        self.next_step_store = Some(store);
        self
    }

    pub fn reply_store(mut self, store: Arc<dyn HandlerStore>) -> Self {
        self.reply_store = Some(store);
        self
    }

    pub fn state_storage(mut self, storage: Arc<dyn StateStorage>) -> Self {
        self.state_storage = Some(storage);
        self
    }

    pub fn exception_handler(mut self, handler: impl ExceptionHandler + 'static) -> Self {
        self.exception_handler = Some(Arc::new(handler));
        self
    }

    pub fn max_concurrent_conversations(mut self, limit: usize) -> Self {
        self.max_concurrent_conversations = limit;
        self
    }

    pub fn build(self) -> Result<Dispatcher> {
        if self.max_concurrent_conversations == 0 {
            return Err(DispatchError::configuration(
                "max_concurrent_conversations must be at least 1",
            ));
        }

        let mut callbacks = CallbackRegistry::new();
        for (name, callback) in self.callbacks {
            callbacks.register(name, callback)?;
        }

        let dispatcher = Dispatcher {
            middlewares: self.middlewares,
            handlers: self.handlers,
            callbacks,
            next_step_store: self
                .next_step_store
                .unwrap_or_else(|| Arc::new(MemoryHandlerStore::new())),
            reply_store: self
                .reply_store
                .unwrap_or_else(|| Arc::new(MemoryHandlerStore::new())),
            state_storage: self.state_storage,
            exception_handler: self.exception_handler,
            max_concurrent_conversations: self.max_concurrent_conversations,
        };

        info!(
            middlewares = dispatcher.middlewares.len(),
            handlers = dispatcher.handlers.len(),
            callbacks = dispatcher.callbacks.len(),
            next_step_store = dispatcher.next_step_store.backend_name(),
            reply_store = dispatcher.reply_store.backend_name(),
            "Dispatcher built"
        );
        Ok(dispatcher)
    }
}
