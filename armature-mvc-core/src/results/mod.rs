//! Action results.
//!
//! An action returns a description of the response; executing the result
//! writes it. Results that need negotiation or file I/O hand the work to an
//! [`ActionResultExecutor`] registered in [`ActionServices`](crate::ActionServices),
//! so the executor can be swapped without touching the result types.
//!
//! ```
//! use armature_mvc_core::results::{ActionOutput, ObjectResult, StatusCodeResult};
//! use http::StatusCode;
//!
//! let created = ObjectResult::created("/orders/7", serde_json::json!({"id": 7}));
//! assert_eq!(created.status, Some(StatusCode::CREATED));
//!
//! let output = ActionOutput::result(StatusCodeResult::new(StatusCode::NO_CONTENT));
//! assert!(matches!(output, ActionOutput::Result(_)));
//! ```

mod authentication;
mod file;
mod object;
mod problem;
mod redirect;
mod status;

pub use authentication::{ChallengeResult, ForbidResult, SignInResult, SignOutResult};
pub use file::{FileResult, FileResultExecutor, FileSource};
pub use object::{LocationSource, ObjectResult, ObjectResultExecutor};
pub use problem::{ProblemDetails, ValidationProblemDetails};
pub use redirect::{
    LocalRedirectResult, RedirectResult, RedirectToActionResult, RedirectToRouteResult,
    redirect_status,
};
pub use status::{ContentResult, EmptyResult, StatusCodeResult};

use crate::{ActionContext, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Outcome of an action, executed against the response.
#[async_trait]
pub trait ActionResult: Send + Sync {
    async fn execute(&self, context: &mut ActionContext) -> Result<()>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn as_object_result(&self) -> Option<&ObjectResult> {
        None
    }

    fn as_object_result_mut(&mut self) -> Option<&mut ObjectResult> {
        None
    }
}

impl fmt::Debug for dyn ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type-specific executor for results whose behaviour is pluggable.
#[async_trait]
pub trait ActionResultExecutor<R: ?Sized + Sync>: Send + Sync {
    async fn execute(&self, context: &mut ActionContext, result: &R) -> Result<()>;
}

/// What an action method returns.
pub enum ActionOutput {
    /// A ready-made result
    Result(Box<dyn ActionResult>),
    /// A value to negotiate and format with the default status
    Value(Value),
    /// Nothing; the response is left as is
    Empty,
}

impl ActionOutput {
    pub fn result(result: impl ActionResult + 'static) -> Self {
        ActionOutput::Result(Box::new(result))
    }

    /// Serialize `value` into an object result.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(ActionOutput::Value(serde_json::to_value(value)?))
    }

    pub fn into_result(self) -> Box<dyn ActionResult> {
        match self {
            ActionOutput::Result(result) => result,
            ActionOutput::Value(value) => Box::new(ObjectResult::new(value)),
            ActionOutput::Empty => Box::new(EmptyResult),
        }
    }
}

impl From<Value> for ActionOutput {
    fn from(value: Value) -> Self {
        ActionOutput::Value(value)
    }
}

impl From<Box<dyn ActionResult>> for ActionOutput {
    fn from(result: Box<dyn ActionResult>) -> Self {
        ActionOutput::Result(result)
    }
}

impl fmt::Debug for ActionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutput::Result(result) => write!(f, "Result({})", result.name()),
            ActionOutput::Value(value) => write!(f, "Value({})", value),
            ActionOutput::Empty => f.write_str("Empty"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_conversion() {
        assert_eq!(ActionOutput::Empty.into_result().name(), "EmptyResult");

        let value = ActionOutput::json(&vec![1, 2, 3]).unwrap().into_result();
        let object = value.as_object_result().unwrap();
        assert_eq!(object.value, serde_json::json!([1, 2, 3]));
        assert_eq!(object.status, None);

        let boxed: Box<dyn ActionResult> = Box::new(StatusCodeResult::new(http::StatusCode::GONE));
        let output = ActionOutput::from(boxed);
        assert_eq!(output.into_result().name(), "StatusCodeResult");
    }
}
