use crate::error::HandlerError;
use crate::types::Update;

/// Observer for errors raised while handling updates
///
/// Return `true` when the error was dealt with; unhandled errors are logged
/// by the dispatcher. Either way the error still reaches `post_process`.
pub trait ExceptionHandler: Send + Sync {
    fn handle(&self, update: &Update, error: &HandlerError) -> bool;
}

impl<F> ExceptionHandler for F
where
    F: Fn(&Update, &HandlerError) -> bool + Send + Sync,
{
    fn handle(&self, update: &Update, error: &HandlerError) -> bool {
        self(update, error)
    }
}
