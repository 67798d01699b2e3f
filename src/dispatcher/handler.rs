//! Update handlers and the filters deciding which updates reach them

use super::context::DispatchContext;
use crate::error::HandlerResult;
use crate::middleware::ControlSignal;
use crate::state::StateDescriptor;
use crate::types::{Update, UpdateKind};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Handles an update that matched its [`HandlerSpec`]
///
/// Returning `Some(ControlSignal::ContinueHandling)` lets the next matching
/// handler run as well; anything else stops at this handler.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(
        &self,
        update: &Update,
        context: &mut DispatchContext,
    ) -> HandlerResult<Option<ControlSignal>>;
}

pub struct FnHandler<F>(F);

/// Wrap a synchronous closure as a [`Handler`]
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Update, &mut DispatchContext) -> HandlerResult<Option<ControlSignal>> + Send + Sync,
{
    FnHandler(f)
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&Update, &mut DispatchContext) -> HandlerResult<Option<ControlSignal>> + Send + Sync,
{
    async fn handle(
        &self,
        update: &Update,
        context: &mut DispatchContext,
    ) -> HandlerResult<Option<ControlSignal>> {
        (self.0)(update, context)
    }
}

/// Callback re-created from a stored [`HandlerRecord`](crate::store::HandlerRecord)
#[async_trait]
pub trait StepCallback: Send + Sync {
    async fn call(
        &self,
        update: &Update,
        context: &mut DispatchContext,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> HandlerResult<()>;
}

pub struct FnStepCallback<F>(F);

/// Wrap a synchronous closure as a [`StepCallback`]
pub fn step_fn<F>(f: F) -> FnStepCallback<F>
where
    F: Fn(&Update, &mut DispatchContext, &[Value], &Map<String, Value>) -> HandlerResult<()>
        + Send
        + Sync,
{
    FnStepCallback(f)
}

#[async_trait]
impl<F> StepCallback for FnStepCallback<F>
where
    F: Fn(&Update, &mut DispatchContext, &[Value], &Map<String, Value>) -> HandlerResult<()>
        + Send
        + Sync,
{
    async fn call(
        &self,
        update: &Update,
        context: &mut DispatchContext,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> HandlerResult<()> {
        (self.0)(update, context, args, kwargs)
    }
}

type Predicate = Arc<dyn Fn(&Update) -> bool + Send + Sync>;

/// A registered handler together with its matching rules
///
/// All configured filters must pass: update kind, current conversation
/// state, command and custom predicate.
#[derive(Clone)]
pub struct HandlerSpec {
    name: String,
    kinds: HashSet<UpdateKind>,
    state: Option<StateDescriptor>,
    commands: Vec<String>,
    predicate: Option<Predicate>,
    handler: Arc<dyn Handler>,
}

impl HandlerSpec {
    pub fn new(name: impl Into<String>, handler: impl Handler + 'static) -> Self {
        Self {
            name: name.into(),
            kinds: HashSet::new(),
            state: None,
            commands: Vec::new(),
            predicate: None,
            handler: Arc::new(handler),
        }
    }

    /// Restrict to these update kinds (default: every kind)
    pub fn kinds<I, K>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<UpdateKind>,
    {
        self.kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Only match while the conversation is in `state`
    pub fn state(mut self, state: &StateDescriptor) -> Self {
        self.state = Some(state.clone());
        self
    }

    /// Only match text starting with `/command` (bot mentions allowed)
    pub fn commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands = commands.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, predicate: impl Fn(&Update) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn matches(&self, update: &Update, context: &DispatchContext) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&update.kind) {
            return false;
        }
        if let Some(state) = &self.state {
            if !context.is_in(state) {
                return false;
            }
        }
        if !self.commands.is_empty() {
            let Some(command) = update.text().and_then(extract_command) else {
                return false;
            };
            if !self.commands.iter().any(|c| c == command) {
                return false;
            }
        }
        self.predicate.as_ref().map_or(true, |predicate| predicate(update))
    }
}

impl fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSpec")
            .field("name", &self.name)
            .field("kinds", &self.kinds)
            .field("state", &self.state)
            .field("commands", &self.commands)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// `"/start@my_bot payload"` -> `"start"`
fn extract_command(text: &str) -> Option<&str> {
    let word = text.strip_prefix('/')?.split_whitespace().next()?;
    let command = word.split('@').next().unwrap_or(word);
    (!command.is_empty()).then_some(command)
}
