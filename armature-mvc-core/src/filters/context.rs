// Per-stage filter contexts and continuations

use super::FilterMetadata;
use crate::context::Arguments;
use crate::invoker::ActionInvoker;
use crate::results::ActionResult;
use crate::{ActionContext, Error};
use std::fmt;
use std::sync::Arc;

/// Passed to authorization filters.
pub struct AuthorizationFilterContext<'a> {
    pub action_context: &'a mut ActionContext,
    /// Every filter in the pipeline, in execution order
    pub filters: &'a [Arc<dyn FilterMetadata>],
}

impl AuthorizationFilterContext<'_> {
    /// Whether any filter marks the action as open to anonymous callers.
    pub fn allows_anonymous(&self) -> bool {
        self.filters.iter().any(|f| f.allows_anonymous())
    }
}

/// Passed to resource filters before the rest of the pipeline runs.
pub struct ResourceExecutingContext<'a> {
    pub action_context: &'a mut ActionContext,
    pub filters: &'a [Arc<dyn FilterMetadata>],
}

/// How the inner pipeline finished, as seen by a resource filter.
#[derive(Default)]
pub struct ResourceExecutedContext {
    /// An executing hook short-circuited
    pub canceled: bool,
    pub exception: Option<Error>,
    /// Set to keep `exception` from propagating
    pub exception_handled: bool,
    /// The result that ran, or a replacement when handling an exception
    pub result: Option<Box<dyn ActionResult>>,
    short_circuit: bool,
}

impl ResourceExecutedContext {
    pub fn completed(result: Option<Box<dyn ActionResult>>) -> Self {
        Self {
            result,
            ..Default::default()
        }
    }

    pub fn failed(error: Error) -> Self {
        Self {
            exception: Some(error),
            ..Default::default()
        }
    }

    /// Returned by an async resource filter that answers the request itself.
    pub fn short_circuited(result: impl ActionResult + 'static) -> Self {
        Self::short_circuited_boxed(Box::new(result))
    }

    pub fn short_circuited_boxed(result: Box<dyn ActionResult>) -> Self {
        Self {
            canceled: true,
            result: Some(result),
            short_circuit: true,
            ..Default::default()
        }
    }

    pub(crate) fn is_short_circuit(&self) -> bool {
        self.short_circuit
    }

    pub(crate) fn take_short_circuit(&mut self) -> Option<Box<dyn ActionResult>> {
        if self.short_circuit {
            self.short_circuit = false;
            self.result.take()
        } else {
            None
        }
    }

    /// An exception is present and nobody handled it.
    pub fn has_unhandled_exception(&self) -> bool {
        self.exception.is_some() && !self.exception_handled
    }
}

impl fmt::Debug for ResourceExecutedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceExecutedContext")
            .field("canceled", &self.canceled)
            .field("exception", &self.exception)
            .field("exception_handled", &self.exception_handled)
            .field("result", &self.result.as_ref().map(|r| r.name().to_string()))
            .finish()
    }
}

/// Continuation handed to async resource filters.
pub struct ResourceNext<'n> {
    pub(crate) invoker: &'n ActionInvoker,
    pub(crate) index: usize,
}

impl ResourceNext<'_> {
    /// Run the remaining resource filters and everything inside them.
    pub async fn run(self, context: &mut ResourceExecutingContext<'_>) -> ResourceExecutedContext {
        self.invoker.invoke_resource(self.index, context).await
    }
}

/// Passed to action filters; arguments may be changed before the action runs.
pub struct ActionExecutingContext<'a> {
    pub action_context: &'a mut ActionContext,
    pub arguments: Arguments,
    pub filters: &'a [Arc<dyn FilterMetadata>],
}

/// How the action (and inner action filters) finished.
#[derive(Default)]
pub struct ActionExecutedContext {
    pub canceled: bool,
    pub exception: Option<Error>,
    pub exception_handled: bool,
    pub result: Option<Box<dyn ActionResult>>,
    short_circuit: bool,
}

impl ActionExecutedContext {
    pub fn completed(result: Box<dyn ActionResult>) -> Self {
        Self {
            result: Some(result),
            ..Default::default()
        }
    }

    pub fn failed(error: Error) -> Self {
        Self {
            exception: Some(error),
            ..Default::default()
        }
    }

    /// Returned by an async action filter that skips the action.
    pub fn short_circuited(result: impl ActionResult + 'static) -> Self {
        Self::short_circuited_boxed(Box::new(result))
    }

    pub fn short_circuited_boxed(result: Box<dyn ActionResult>) -> Self {
        Self {
            canceled: true,
            result: Some(result),
            short_circuit: true,
            ..Default::default()
        }
    }

    pub(crate) fn is_short_circuit(&self) -> bool {
        self.short_circuit
    }

    pub fn has_unhandled_exception(&self) -> bool {
        self.exception.is_some() && !self.exception_handled
    }
}

impl fmt::Debug for ActionExecutedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionExecutedContext")
            .field("canceled", &self.canceled)
            .field("exception", &self.exception)
            .field("exception_handled", &self.exception_handled)
            .field("result", &self.result.as_ref().map(|r| r.name().to_string()))
            .finish()
    }
}

/// Continuation handed to async action filters.
pub struct ActionNext<'n> {
    pub(crate) invoker: &'n ActionInvoker,
    pub(crate) index: usize,
}

impl ActionNext<'_> {
    pub async fn run(self, context: &mut ActionExecutingContext<'_>) -> ActionExecutedContext {
        self.invoker.invoke_action(self.index, context).await
    }
}

/// Passed to exception filters while an error is unhandled.
pub struct ExceptionContext<'a> {
    pub action_context: &'a mut ActionContext,
    /// Clearing this also counts as handling it
    pub exception: Option<Error>,
    pub exception_handled: bool,
    /// Executed in place of the action's result once handled
    pub result: Option<Box<dyn ActionResult>>,
}

impl ExceptionContext<'_> {
    pub fn is_handled(&self) -> bool {
        self.exception_handled || self.exception.is_none()
    }

    /// Mark handled and substitute `result`.
    pub fn handle_with(&mut self, result: impl ActionResult + 'static) {
        self.result = Some(Box::new(result));
        self.exception_handled = true;
    }
}

/// Passed to result filters before the result executes.
pub struct ResultExecutingContext<'a> {
    pub action_context: &'a mut ActionContext,
    /// May be replaced or adjusted before execution
    pub result: Box<dyn ActionResult>,
    pub filters: &'a [Arc<dyn FilterMetadata>],
}

/// How result execution (and inner result filters) finished.
#[derive(Debug, Default)]
pub struct ResultExecutedContext {
    pub canceled: bool,
    pub exception: Option<Error>,
    pub exception_handled: bool,
}

impl ResultExecutedContext {
    pub fn completed() -> Self {
        Self::default()
    }

    pub fn failed(error: Error) -> Self {
        Self {
            exception: Some(error),
            ..Default::default()
        }
    }

    pub fn canceled() -> Self {
        Self {
            canceled: true,
            ..Default::default()
        }
    }

    pub fn has_unhandled_exception(&self) -> bool {
        self.exception.is_some() && !self.exception_handled
    }
}

/// Continuation handed to async result filters.
pub struct ResultNext<'n> {
    pub(crate) invoker: &'n ActionInvoker,
    pub(crate) filters: &'n [Arc<dyn FilterMetadata>],
    pub(crate) index: usize,
}

impl ResultNext<'_> {
    pub async fn run(self, context: &mut ResultExecutingContext<'_>) -> ResultExecutedContext {
        self.invoker
            .invoke_result(self.filters, self.index, context)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::StatusCodeResult;

    #[test]
    fn test_resource_short_circuit_flag() {
        let mut executed = ResourceExecutedContext::short_circuited(StatusCodeResult::not_found());
        assert!(executed.canceled);
        assert!(executed.is_short_circuit());

        let result = executed.take_short_circuit().unwrap();
        assert_eq!(result.name(), "StatusCodeResult");
        assert!(!executed.is_short_circuit());
        assert!(executed.take_short_circuit().is_none());
    }

    #[test]
    fn test_unhandled_exception() {
        let mut executed = ActionExecutedContext::failed(Error::action("boom"));
        assert!(executed.has_unhandled_exception());
        executed.exception_handled = true;
        assert!(!executed.has_unhandled_exception());

        let completed = ResultExecutedContext::completed();
        assert!(!completed.has_unhandled_exception());
        assert!(ResultExecutedContext::canceled().canceled);
    }
}
