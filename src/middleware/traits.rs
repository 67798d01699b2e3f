//! Middleware trait and closure adapter

use super::signal::ControlSignal;
use crate::dispatcher::DispatchContext;
use crate::error::{HandlerError, HandlerResult};
use crate::types::Update;
use async_trait::async_trait;

/// A pre/post hook pair run around handler execution
///
/// `pre_process` may return a [`ControlSignal`]; only `SkipHandler` and
/// `CancelUpdate` have an effect there. `post_process` receives the error
/// raised while handling the update, if any. An error returned from
/// `post_process` is logged and never aborts the remaining middlewares.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn pre_process(
        &self,
        update: &Update,
        context: &mut DispatchContext,
    ) -> HandlerResult<Option<ControlSignal>>;

    async fn post_process(
        &self,
        update: &Update,
        context: &mut DispatchContext,
        exception: Option<&HandlerError>,
    ) -> HandlerResult<()>;

    fn name(&self) -> &str {
        "unnamed_middleware"
    }
}

/// Middleware built from a pair of synchronous closures
pub struct FnHooks<P, Q> {
    name: String,
    pre: P,
    post: Q,
}

/// Build a [`Middleware`] from `pre` and `post` closures
pub fn hooks_fn<P, Q>(name: impl Into<String>, pre: P, post: Q) -> FnHooks<P, Q>
where
    P: Fn(&Update, &mut DispatchContext) -> HandlerResult<Option<ControlSignal>> + Send + Sync,
    Q: Fn(&Update, &mut DispatchContext, Option<&HandlerError>) -> HandlerResult<()> + Send + Sync,
{
    FnHooks {
        name: name.into(),
        pre,
        post,
    }
}

#[async_trait]
impl<P, Q> Middleware for FnHooks<P, Q>
where
    P: Fn(&Update, &mut DispatchContext) -> HandlerResult<Option<ControlSignal>> + Send + Sync,
    Q: Fn(&Update, &mut DispatchContext, Option<&HandlerError>) -> HandlerResult<()> + Send + Sync,
{
    async fn pre_process(
        &self,
        update: &Update,
        context: &mut DispatchContext,
    ) -> HandlerResult<Option<ControlSignal>> {
        (self.pre)(update, context)
    }

    async fn post_process(
        &self,
        update: &Update,
        context: &mut DispatchContext,
        exception: Option<&HandlerError>,
    ) -> HandlerResult<()> {
        (self.post)(update, context, exception)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
