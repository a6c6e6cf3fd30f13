// Problem details for unhandled errors

use crate::filters::{ExceptionContext, ExceptionFilter, FilterMetadata};
use crate::results::{ObjectResult, ProblemDetails};
use crate::{Error, Result};

/// Turns pipeline errors into RFC 7807 problem responses.
///
/// In production mode 5xx details are replaced by a generic message so
/// internals don't leak. `RequestAborted` is never handled; nobody is left
/// to read the response.
#[derive(Debug, Clone)]
pub struct ProblemDetailsExceptionFilter {
    production_mode: bool,
    handles: Option<Vec<&'static str>>,
}

impl ProblemDetailsExceptionFilter {
    pub const GENERIC_DETAIL: &'static str = "An internal server error occurred";

    pub fn new() -> Self {
        Self {
            production_mode: true,
            handles: None,
        }
    }

    pub fn production_mode(mut self, production: bool) -> Self {
        self.production_mode = production;
        self
    }

    /// Restrict handling to these [`Error::kind`] names.
    pub fn handles(mut self, kinds: &[&'static str]) -> Self {
        self.handles = Some(kinds.to_vec());
        self
    }

    fn can_handle(&self, error: &Error) -> bool {
        if matches!(error, Error::RequestAborted) {
            return false;
        }
        match &self.handles {
            Some(kinds) => kinds.contains(&error.kind()),
            None => true,
        }
    }

    fn details(&self, error: &Error, instance: &str, trace_identifier: &str) -> ProblemDetails {
        let detail = if self.production_mode && error.is_server_error() {
            Self::GENERIC_DETAIL.to_string()
        } else {
            error.to_string()
        };

        ProblemDetails::for_status(error.status_code())
            .with_detail(detail)
            .with_instance(instance)
            .with_extension("traceId", trace_identifier)
            .with_extension("errorType", error.kind())
    }
}

impl Default for ProblemDetailsExceptionFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExceptionFilter for ProblemDetailsExceptionFilter {
    fn on_exception(&self, context: &mut ExceptionContext<'_>) -> Result<()> {
        let Some(error) = context.exception.as_ref().filter(|e| self.can_handle(e)) else {
            return Ok(());
        };

        let action_context = &*context.action_context;
        let details = self.details(error, &action_context.request.path, &action_context.trace_identifier);
        context.handle_with(ObjectResult::problem(details));
        Ok(())
    }
}

impl FilterMetadata for ProblemDetailsExceptionFilter {
    fn name(&self) -> &str {
        "ProblemDetailsExceptionFilter"
    }

    fn as_exception_filter(&self) -> Option<&dyn ExceptionFilter> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::builtin::test_support::context;
    use crate::results::ActionResult;
    use crate::HttpRequest;
    use http::StatusCode;

    async fn handle(filter: &ProblemDetailsExceptionFilter, error: Error) -> Option<(StatusCode, serde_json::Value)> {
        let mut ctx = context(HttpRequest::get("/orders/7"));
        let mut exception = ExceptionContext {
            action_context: &mut ctx,
            exception: Some(error),
            exception_handled: false,
            result: None,
        };
        filter.on_exception(&mut exception).unwrap();
        if !exception.is_handled() {
            return None;
        }
        let result = exception.result.take()?;
        result.execute(&mut ctx).await.unwrap();
        Some((ctx.response.status, ctx.response.body_json().unwrap()))
    }

    #[tokio::test]
    async fn test_client_error_detail_kept() {
        let filter = ProblemDetailsExceptionFilter::new();
        let (status, body) = handle(&filter, Error::NotFound("order 7".into())).await.unwrap();

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
        assert_eq!(body["detail"], "Not Found: order 7");
        assert_eq!(body["instance"], "/orders/7");
        assert_eq!(body["errorType"], "NotFound");
        assert!(body["traceId"].is_string());
    }

    #[tokio::test]
    async fn test_server_error_hidden_in_production() {
        let filter = ProblemDetailsExceptionFilter::new();
        let (status, body) = handle(&filter, Error::Internal("db password wrong".into())).await.unwrap();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], ProblemDetailsExceptionFilter::GENERIC_DETAIL);

        let filter = ProblemDetailsExceptionFilter::new().production_mode(false);
        let (_, body) = handle(&filter, Error::Internal("db password wrong".into())).await.unwrap();
        assert!(body["detail"].as_str().unwrap().contains("db password wrong"));
    }

    #[tokio::test]
    async fn test_handles_restricts_kinds() {
        let filter = ProblemDetailsExceptionFilter::new().handles(&["Conflict"]);
        assert!(handle(&filter, Error::NotFound("x".into())).await.is_none());
        assert!(handle(&filter, Error::Conflict("x".into())).await.is_some());
    }

    #[tokio::test]
    async fn test_aborted_not_handled() {
        let filter = ProblemDetailsExceptionFilter::new();
        assert!(handle(&filter, Error::RequestAborted).await.is_none());
    }
}
